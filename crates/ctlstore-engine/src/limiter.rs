use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{EngineError, Result};

/// Retention window for `writer_usage` rows (spec.md 4.4 Housekeeping).
pub const USAGE_RETENTION: Duration = Duration::from_secs(24 * 3600);

/// Default rate-limit enforcement period, used when a writer has no
/// per-writer override.
pub const DEFAULT_PERIOD_SECS: i64 = 60;

/// Sentinel `writer_name` row in `max_writer_rates` holding the global
/// default rate (spec.md 3: "A global default plus per-writer overrides").
/// Not a valid [`ctlstore_types::WriterName`], so it can never collide with
/// a real writer.
const GLOBAL_RATE_KEY: &str = "*";

#[derive(Debug, Clone, Copy)]
pub struct SizeLimit {
    pub warn_size_bytes: i64,
    pub max_size_bytes: i64,
}

/// Caches the two configured-limit maps so the hot path never queries the
/// limits tables directly; refreshed wholesale by a background tick
/// (spec.md 5: "swap the entire cached map").
#[derive(Debug, Clone, Default)]
pub struct LimiterCache {
    pub writer_rates: HashMap<String, i64>,
    pub table_sizes: HashMap<(String, String), SizeLimit>,
    pub global_rate_per_minute: i64,
}

impl LimiterCache {
    pub fn rate_for(&self, writer: &str) -> i64 {
        self.writer_rates.get(writer).copied().unwrap_or(self.global_rate_per_minute)
    }

    pub fn size_limit_for(&self, family: &str, table: &str) -> Option<SizeLimit> {
        self.table_sizes.get(&(family.to_string(), table.to_string())).copied()
    }

    /// Reloads both maps from the authority DB's limits tables.
    pub fn refresh(&mut self, conn: &Connection) -> Result<()> {
        let mut rates = HashMap::new();
        {
            let mut stmt = conn.prepare("SELECT writer_name, max_rows_per_minute FROM max_writer_rates")?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
            let mut global = self.global_rate_per_minute;
            for row in rows {
                let (writer, rate) = row?;
                if writer == GLOBAL_RATE_KEY {
                    global = rate;
                } else {
                    rates.insert(writer, rate);
                }
            }
            self.global_rate_per_minute = global;
        }

        let mut sizes = HashMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT family_name, table_name, warn_size_bytes, max_size_bytes FROM max_table_sizes")?;
            let rows = stmt.query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    SizeLimit {
                        warn_size_bytes: r.get(2)?,
                        max_size_bytes: r.get(3)?,
                    },
                ))
            })?;
            for row in rows {
                let (family, table, limit) = row?;
                sizes.insert((family, table), limit);
            }
        }

        self.writer_rates = rates;
        self.table_sizes = sizes;
        Ok(())
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn bucket_for(period_secs: i64, now: i64) -> i64 {
    if period_secs <= 0 {
        return now;
    }
    (now / period_secs) * period_secs
}

/// Checks and records rate usage for `writer` making `request_count` writes
/// this call. Fails with `RateLimitExceeded` without recording usage if the
/// proposed total would exceed the writer's quota.
pub fn check_and_record_rate(conn: &Connection, cache: &LimiterCache, writer: &str, request_count: i64) -> Result<()> {
    let period = DEFAULT_PERIOD_SECS;
    let bucket = bucket_for(period, now_unix());
    let limit = cache.rate_for(writer);

    let current: i64 = conn
        .query_row(
            "SELECT amount FROM writer_usage WHERE bucket = ?1 AND writer_name = ?2",
            params![bucket, writer],
            |r| r.get(0),
        )
        .optional()?
        .unwrap_or(0);

    let proposed = current + request_count;
    if proposed > limit {
        return Err(EngineError::RateLimitExceeded { writer: writer.to_string() });
    }

    conn.execute(
        "INSERT INTO writer_usage(bucket, writer_name, amount) VALUES (?1, ?2, ?3)
         ON CONFLICT(bucket, writer_name) DO UPDATE SET amount = excluded.amount",
        params![bucket, writer, proposed],
    )?;
    Ok(())
}

/// Checks configured size limits for every `(family, table)` pair touched in
/// a batch. Per spec.md 4.4: if *any* table in the batch is oversized, the
/// whole batch is rejected — so this validates all pairs before returning.
///
/// An unknown table (no cached size row yet) is always allowed; this
/// implementation treats "no size oracle" the same way, satisfying the
/// replica-only inert-sizer case.
pub fn check_sizes(
    cache: &LimiterCache,
    touched: impl IntoIterator<Item = (String, String)>,
    current_sizes: impl Fn(&str, &str) -> Result<Option<i64>>,
) -> Result<()> {
    for (family, table) in touched {
        let Some(limit) = cache.size_limit_for(&family, &table) else {
            continue;
        };
        let Some(size) = current_sizes(&family, &table)? else {
            continue;
        };
        if size > limit.max_size_bytes {
            return Err(EngineError::InsufficientStorage { family, table });
        }
    }
    Ok(())
}

/// Deletes `writer_usage` rows older than the retention window (spec.md 4.4
/// Housekeeping), run on a 1-hour tick by the caller.
pub fn gc_usage(conn: &Connection) -> Result<usize> {
    let cutoff = now_unix() - USAGE_RETENTION.as_secs() as i64;
    let n = conn.execute("DELETE FROM writer_usage WHERE bucket < ?1", params![cutoff])?;
    Ok(n)
}

fn upsert_writer_rate(conn: &Connection, key: &str, amount_per_minute: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO max_writer_rates(writer_name, max_rows_per_minute) VALUES (?1, ?2)
         ON CONFLICT(writer_name) DO UPDATE SET max_rows_per_minute = excluded.max_rows_per_minute",
        params![key, amount_per_minute],
    )?;
    Ok(())
}

/// Sets the global default rate limit (`/limits/writers` with no writer).
pub fn set_global_rate(conn: &Connection, amount_per_minute: i64) -> Result<()> {
    upsert_writer_rate(conn, GLOBAL_RATE_KEY, amount_per_minute)
}

pub fn set_writer_rate(conn: &Connection, writer: &str, amount_per_minute: i64) -> Result<()> {
    upsert_writer_rate(conn, writer, amount_per_minute)
}

pub fn get_writer_rate(conn: &Connection, writer: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT max_rows_per_minute FROM max_writer_rates WHERE writer_name = ?1",
            params![writer],
            |r| r.get(0),
        )
        .optional()?)
}

/// Returns `true` if a row was removed.
pub fn delete_writer_rate(conn: &Connection, writer: &str) -> Result<bool> {
    let n = conn.execute("DELETE FROM max_writer_rates WHERE writer_name = ?1", params![writer])?;
    Ok(n > 0)
}

pub fn list_writer_rates(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare("SELECT writer_name, max_rows_per_minute FROM max_writer_rates WHERE writer_name != ?1")?;
    let rows = stmt.query_map(params![GLOBAL_RATE_KEY], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Sets a per-table size limit; rejects `warn > max` (spec.md 7 BadRequest
/// "warn > max").
pub fn set_table_size(conn: &Connection, family: &str, table: &str, limit: SizeLimit) -> Result<()> {
    if limit.warn_size_bytes > limit.max_size_bytes {
        return Err(EngineError::BadRequest(
            "warn_size_bytes must not exceed max_size_bytes".to_owned(),
        ));
    }
    conn.execute(
        "INSERT INTO max_table_sizes(family_name, table_name, warn_size_bytes, max_size_bytes)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(family_name, table_name) DO UPDATE SET
           warn_size_bytes = excluded.warn_size_bytes, max_size_bytes = excluded.max_size_bytes",
        params![family, table, limit.warn_size_bytes, limit.max_size_bytes],
    )?;
    Ok(())
}

pub fn get_table_size(conn: &Connection, family: &str, table: &str) -> Result<Option<SizeLimit>> {
    Ok(conn
        .query_row(
            "SELECT warn_size_bytes, max_size_bytes FROM max_table_sizes WHERE family_name = ?1 AND table_name = ?2",
            params![family, table],
            |r| {
                Ok(SizeLimit {
                    warn_size_bytes: r.get(0)?,
                    max_size_bytes: r.get(1)?,
                })
            },
        )
        .optional()?)
}

/// Returns `true` if a row was removed.
pub fn delete_table_size(conn: &Connection, family: &str, table: &str) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM max_table_sizes WHERE family_name = ?1 AND table_name = ?2",
        params![family, table],
    )?;
    Ok(n > 0)
}

pub fn list_table_sizes(conn: &Connection) -> Result<Vec<(String, String, SizeLimit)>> {
    let mut stmt = conn.prepare("SELECT family_name, table_name, warn_size_bytes, max_size_bytes FROM max_table_sizes")?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            SizeLimit {
                warn_size_bytes: r.get(2)?,
                max_size_bytes: r.get(3)?,
            },
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE writer_usage (bucket INTEGER NOT NULL, writer_name TEXT NOT NULL, amount INTEGER NOT NULL, PRIMARY KEY (bucket, writer_name));
             CREATE TABLE max_writer_rates (writer_name TEXT PRIMARY KEY, max_rows_per_minute INTEGER NOT NULL);
             CREATE TABLE max_table_sizes (family_name TEXT NOT NULL, table_name TEXT NOT NULL, warn_size_bytes INTEGER NOT NULL, max_size_bytes INTEGER NOT NULL, PRIMARY KEY (family_name, table_name));",
        )
        .unwrap();
        conn
    }

    #[test]
    fn rate_limiter_allows_up_to_quota_then_rejects() {
        let conn = db();
        let mut cache = LimiterCache {
            global_rate_per_minute: 2,
            ..Default::default()
        };
        cache.refresh(&conn).unwrap();

        check_and_record_rate(&conn, &cache, "w1", 1).unwrap();
        check_and_record_rate(&conn, &cache, "w1", 1).unwrap();
        let err = check_and_record_rate(&conn, &cache, "w1", 1).unwrap_err();
        assert!(matches!(err, EngineError::RateLimitExceeded { .. }));
    }

    #[test]
    fn per_writer_override_beats_global() {
        let conn = db();
        conn.execute("INSERT INTO max_writer_rates VALUES ('special', 10)", []).unwrap();
        let mut cache = LimiterCache {
            global_rate_per_minute: 1,
            ..Default::default()
        };
        cache.refresh(&conn).unwrap();

        for _ in 0..5 {
            check_and_record_rate(&conn, &cache, "special", 1).unwrap();
        }
    }

    #[test]
    fn size_check_rejects_whole_batch_if_any_table_oversized() {
        let cache = LimiterCache {
            table_sizes: HashMap::from([(
                ("f".to_string(), "big".to_string()),
                SizeLimit { warn_size_bytes: 500, max_size_bytes: 1000 },
            )]),
            ..Default::default()
        };
        let touched = vec![("f".to_string(), "small".to_string()), ("f".to_string(), "big".to_string())];
        let err = check_sizes(&cache, touched, |family, table| {
            if family == "f" && table == "big" {
                Ok(Some(2000))
            } else {
                Ok(Some(10))
            }
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientStorage { .. }));
    }

    #[test]
    fn unknown_table_is_always_allowed() {
        let cache = LimiterCache::default();
        check_sizes(&cache, vec![("f".to_string(), "t".to_string())], |_, _| Ok(Some(i64::MAX))).unwrap();
    }

    #[test]
    fn global_rate_round_trips_through_the_sentinel_row() {
        let conn = db();
        set_global_rate(&conn, 42).unwrap();
        set_writer_rate(&conn, "w1", 7).unwrap();

        let mut cache = LimiterCache::default();
        cache.refresh(&conn).unwrap();
        assert_eq!(cache.global_rate_per_minute, 42);
        assert_eq!(cache.rate_for("w1"), 7);
        assert_eq!(cache.rate_for("unknown-writer"), 42);

        let writers = list_writer_rates(&conn).unwrap();
        assert_eq!(writers, vec![("w1".to_string(), 7)]);
    }

    #[test]
    fn table_size_limit_rejects_warn_greater_than_max() {
        let conn = db();
        let err = set_table_size(&conn, "f", "t", SizeLimit { warn_size_bytes: 100, max_size_bytes: 50 }).unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
    }

    #[test]
    fn table_size_limit_set_get_delete_round_trip() {
        let conn = db();
        set_table_size(&conn, "f", "t", SizeLimit { warn_size_bytes: 50, max_size_bytes: 100 }).unwrap();
        assert_eq!(get_table_size(&conn, "f", "t").unwrap().unwrap().max_size_bytes, 100);
        assert!(delete_table_size(&conn, "f", "t").unwrap());
        assert!(get_table_size(&conn, "f", "t").unwrap().is_none());
    }

    #[test]
    fn gc_removes_only_stale_buckets() {
        let conn = db();
        let now = now_unix();
        conn.execute(
            "INSERT INTO writer_usage VALUES (?1, 'w1', 1), (?2, 'w1', 1)",
            params![now, now - USAGE_RETENTION.as_secs() as i64 - 3600],
        )
        .unwrap();
        let removed = gc_usage(&conn).unwrap();
        assert_eq!(removed, 1);
        let remaining: i64 = conn.query_row("SELECT COUNT(*) FROM writer_usage", [], |r| r.get(0)).unwrap();
        assert_eq!(remaining, 1);
    }
}
