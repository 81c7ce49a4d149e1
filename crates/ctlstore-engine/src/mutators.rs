use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};

/// Cookies are opaque bytes, bounded per spec.md 4.2.
pub const MAX_COOKIE_LEN: usize = 1024;

/// The deterministic starting cookie assigned on first registration.
pub const INITIAL_COOKIE: &[u8] = &[];

pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn check_cookie_len(cookie: &[u8]) -> Result<()> {
    if cookie.len() > MAX_COOKIE_LEN {
        return Err(EngineError::BadRequest(format!(
            "cookie is {} bytes, exceeding the {MAX_COOKIE_LEN} byte cap",
            cookie.len()
        )));
    }
    Ok(())
}

/// Registers `writer` with `secret`.
///
/// If the writer already exists with the same secret hash, this is a no-op
/// success (idempotent registration). If it exists with a *different* hash,
/// returns [`EngineError::Conflict`].
pub fn register(conn: &Connection, writer: &str, secret: &str) -> Result<()> {
    let hash = hash_secret(secret);
    let existing: Option<String> = conn
        .query_row("SELECT secret_hash FROM mutators WHERE writer = ?1", params![writer], |r| r.get(0))
        .optional()?;

    match existing {
        Some(existing_hash) if existing_hash == hash => Ok(()),
        Some(_) => Err(EngineError::Conflict(format!(
            "writer {writer:?} is already registered with a different secret"
        ))),
        None => {
            conn.execute(
                "INSERT INTO mutators(writer, secret_hash, cookie, clock) VALUES (?1, ?2, ?3, 0)",
                params![writer, hash, INITIAL_COOKIE],
            )?;
            Ok(())
        }
    }
}

pub fn exists(conn: &Connection, writer: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM mutators WHERE writer = ?1", params![writer], |r| r.get(0))
        .optional()?;
    Ok(found.is_some())
}

/// Returns the writer's cookie if `secret` matches. A wrong secret and a
/// missing writer are indistinguishable to the caller (spec.md 4.2: "never
/// leaks existence for wrong secret").
pub fn get(conn: &Connection, writer: &str, secret: &str) -> Result<Option<Vec<u8>>> {
    let hash = hash_secret(secret);
    let cookie: Option<Vec<u8>> = conn
        .query_row(
            "SELECT cookie FROM mutators WHERE writer = ?1 AND secret_hash = ?2",
            params![writer, hash],
            |r| r.get(0),
        )
        .optional()?;
    Ok(cookie)
}

/// Check-and-set update of a writer's cookie.
///
/// `if_cookie`, when `Some`, requires the stored cookie to equal it;
/// `None` means an unconditional overwrite. Either way the single UPDATE
/// also increments `clock`. Zero rows affected is disambiguated via a
/// follow-up `Get`: an unknown writer/secret yields [`EngineError::NotFound`],
/// a known writer whose cookie didn't match yields
/// [`EngineError::CookieConflict`].
pub fn update(
    conn: &Connection,
    writer: &str,
    secret: &str,
    new_cookie: &[u8],
    if_cookie: Option<&[u8]>,
) -> Result<()> {
    check_cookie_len(new_cookie)?;
    let hash = hash_secret(secret);

    let affected = match if_cookie {
        Some(expected) => conn.execute(
            "UPDATE mutators SET cookie = ?1, clock = clock + 1
             WHERE writer = ?2 AND secret_hash = ?3 AND cookie = ?4",
            params![new_cookie, writer, hash, expected],
        )?,
        None => conn.execute(
            "UPDATE mutators SET cookie = ?1, clock = clock + 1 WHERE writer = ?2 AND secret_hash = ?3",
            params![new_cookie, writer, hash],
        )?,
    };

    if affected == 1 {
        return Ok(());
    }

    match get(conn, writer, secret)? {
        Some(_) => Err(EngineError::CookieConflict),
        None => Err(EngineError::NotFound(format!("writer {writer:?} not found"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE mutators (writer TEXT PRIMARY KEY, secret_hash TEXT NOT NULL, cookie BLOB NOT NULL, clock INTEGER NOT NULL DEFAULT 0);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn register_is_idempotent_for_same_secret() {
        let conn = db();
        register(&conn, "w1", "sekret-xyz").unwrap();
        register(&conn, "w1", "sekret-xyz").unwrap();
        assert!(exists(&conn, "w1").unwrap());
    }

    #[test]
    fn register_conflicts_on_different_secret() {
        let conn = db();
        register(&conn, "w1", "sekret-xyz").unwrap();
        let err = register(&conn, "w1", "different").unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[test]
    fn get_hides_existence_for_wrong_secret() {
        let conn = db();
        register(&conn, "w1", "sekret-xyz").unwrap();
        assert_eq!(get(&conn, "w1", "wrong").unwrap(), None);
        assert_eq!(get(&conn, "nope", "wrong").unwrap(), None);
    }

    #[test]
    fn cas_update_succeeds_once_then_conflicts() {
        let conn = db();
        register(&conn, "w1", "s").unwrap();
        update(&conn, "w1", "s", b"new", Some(INITIAL_COOKIE)).unwrap();
        let err = update(&conn, "w1", "s", b"new2", Some(INITIAL_COOKIE)).unwrap_err();
        assert!(matches!(err, EngineError::CookieConflict));
        // Second update with the now-current cookie succeeds.
        update(&conn, "w1", "s", b"new2", Some(b"new")).unwrap();
        assert_eq!(get(&conn, "w1", "s").unwrap().unwrap(), b"new2");
    }

    #[test]
    fn update_on_unknown_writer_is_not_found() {
        let conn = db();
        let err = update(&conn, "ghost", "s", b"x", None).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn cookie_too_long_is_rejected() {
        let conn = db();
        register(&conn, "w1", "s").unwrap();
        let huge = vec![0u8; MAX_COOKIE_LEN + 1];
        let err = update(&conn, "w1", "s", &huge, None).unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
    }
}
