use std::sync::Arc;
use std::time::Instant;

use ctlstore_engine::Executive;

#[derive(Clone)]
pub struct AppState {
    pub executive: Arc<Executive>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(executive: Executive) -> Self {
        Self {
            executive: Arc::new(executive),
            started_at: Instant::now(),
        }
    }
}
