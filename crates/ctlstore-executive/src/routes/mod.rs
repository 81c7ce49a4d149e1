pub mod clear_rows;
pub mod cookie;
pub mod families;
pub mod limits;
pub mod mutations;
pub mod status;
pub mod tables;
pub mod writers;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::body_limit::enforce_body_limit;
use crate::state::AppState;

/// The Executive's full HTTP surface (spec.md 6), wrapped in the same
/// tracing/panic-catching middleware stack the rest of this codebase uses
/// for its axum services.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status::status))
        .route("/families/:family", post(families::create_family))
        .route("/families/:family/tables/:table", post(tables::create_table))
        .route("/families/:family/tables/:table", put(tables::add_fields))
        .route("/families/:family/tables/:table", delete(tables::drop_table))
        .route("/families/:family/mutations", post(mutations::mutate))
        .route("/schema/family/:family", get(families::family_schema))
        .route("/schema/table/:family/:table", get(tables::table_schema))
        .route("/cookie", get(cookie::get_cookie).post(cookie::set_cookie))
        .route("/writers/:writer", post(writers::register_writer))
        .route(
            "/limits/writers",
            get(limits::list_writer_rates).post(limits::set_global_rate),
        )
        .route(
            "/limits/writers/:writer",
            get(limits::get_writer_rate)
                .post(limits::set_writer_rate)
                .delete(limits::delete_writer_rate),
        )
        .route("/limits/tables", get(limits::list_table_sizes))
        .route(
            "/limits/tables/:family/:table",
            get(limits::get_table_size)
                .post(limits::set_table_size)
                .delete(limits::delete_table_size),
        )
        .route("/clear-rows/families/:family", delete(clear_rows::clear_family))
        .route(
            "/clear-rows/families/:family/tables/:table",
            delete(clear_rows::clear_table),
        )
        .layer(axum::middleware::from_fn(enforce_body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
