//! SQLite sample store.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const SAMPLE_COLUMNS: &str = "id, monitor_name, monitor_type, monitor_url, monitor_hostname, monitor_port, \
     cert_days_remaining, cert_is_valid, response_time_ms, status, fetched_at";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Thread-safe, append-only store of metric samples.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and apply migrations.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let mut conn = self.conn()?;
        let report = embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| DbError::Migration(e.to_string()))?;

        for migration in report.applied_migrations() {
            tracing::info!("Applied migration {}", migration);
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Insert one fetch cycle's samples in a single transaction.
    ///
    /// Either every sample is stored or none is.
    pub fn add_samples(&self, samples: &[MetricSample]) -> Result<(), DbError> {
        if samples.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO metric_samples (monitor_name, monitor_type, monitor_url, monitor_hostname, monitor_port, \
                 cert_days_remaining, cert_is_valid, response_time_ms, status, fetched_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for s in samples {
                stmt.execute(params![
                    s.monitor_name,
                    s.monitor_type,
                    s.monitor_url,
                    s.monitor_hostname,
                    s.monitor_port,
                    s.cert_days_remaining,
                    s.cert_is_valid,
                    s.response_time_ms,
                    s.status.map(MonitorStatus::code),
                    format_db_time(s.fetched_at),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Get samples matching `filter`, ordered by monitor URL, then fetch time, then id.
    pub fn get_samples(&self, filter: &SampleFilter) -> Result<Vec<MetricSample>, DbError> {
        let mut clauses = Vec::new();
        let mut args = Vec::new();

        if let Some(since) = filter.since {
            args.push(format_db_time(since));
            clauses.push(format!("fetched_at >= ?{}", args.len()));
        }
        if let Some(until) = filter.until {
            args.push(format_db_time(until));
            clauses.push(format!("fetched_at <= ?{}", args.len()));
        }
        if let Some(url) = &filter.monitor_url {
            args.push(url.clone());
            clauses.push(format!("monitor_url = ?{}", args.len()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM metric_samples {where_sql} ORDER BY monitor_url ASC, fetched_at ASC, id ASC"
        ))?;

        let samples = stmt
            .query_map(params_from_iter(args.iter()), sample_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        tracing::debug!("Loaded {} samples", samples.len());
        Ok(samples)
    }

    /// Get the most recent sample of every monitor URL.
    ///
    /// Ties on `fetched_at` go to the highest row id.
    pub fn latest_per_monitor(&self) -> Result<Vec<MetricSample>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM metric_samples m
             WHERE m.id = (
                 SELECT s.id FROM metric_samples s
                 WHERE s.monitor_url = m.monitor_url
                 ORDER BY s.fetched_at DESC, s.id DESC LIMIT 1
             )
             ORDER BY m.monitor_name ASC, m.monitor_url ASC"
        ))?;

        let samples = stmt
            .query_map([], sample_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(samples)
    }

    /// Total number of stored samples.
    pub fn count_samples(&self) -> Result<i64, DbError> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM metric_samples", [], |r| r.get(0))?)
    }
}

fn sample_from_row(row: &Row<'_>) -> SqlResult<MetricSample> {
    let time_str: String = row.get(10)?;
    let status: Option<i64> = row.get(9)?;
    Ok(MetricSample {
        id: row.get(0)?,
        monitor_name: row.get(1)?,
        monitor_type: row.get(2)?,
        monitor_url: row.get(3)?,
        monitor_hostname: row.get(4)?,
        monitor_port: row.get(5)?,
        cert_days_remaining: row.get(6)?,
        cert_is_valid: row.get(7)?,
        response_time_ms: row.get(8)?,
        status: status.map(MonitorStatus::from),
        fetched_at: parse_db_time(&time_str).unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    })
}

fn format_db_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::NamedTempFile;

    fn sample(url: &str, name: &str, status: i64, at: DateTime<Utc>) -> MetricSample {
        MetricSample {
            monitor_name: name.to_string(),
            monitor_url: url.to_string(),
            status: Some(MonitorStatus::from(status)),
            response_time_ms: Some(120),
            fetched_at: at,
            ..Default::default()
        }
    }

    fn open() -> (NamedTempFile, Store) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_samples_round_trip_in_order() {
        let (_tmp, store) = open();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let mut odd = sample("https://b", "B", 9, t0);
        odd.cert_is_valid = Some(false);
        odd.cert_days_remaining = Some(12);
        odd.monitor_port = Some("443".to_string());
        store
            .add_samples(&[
                sample("https://a", "A", 1, t0 + Duration::minutes(1)),
                odd,
                sample("https://a", "A", 0, t0),
            ])
            .unwrap();

        let all = store.get_samples(&SampleFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].monitor_url, "https://a");
        assert_eq!(all[0].fetched_at, t0);
        assert_eq!(all[1].fetched_at, t0 + Duration::minutes(1));
        assert_eq!(all[2].status, Some(MonitorStatus::Unknown(9)));
        assert_eq!(all[2].cert_is_valid, Some(false));
        assert_eq!(all[2].cert_days_remaining, Some(12));
        assert_eq!(all[2].monitor_port.as_deref(), Some("443"));
        assert!(all[2].id > 0);
    }

    #[test]
    fn test_get_samples_filters() {
        let (_tmp, store) = open();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let samples: Vec<_> = (0..5)
            .map(|i| sample("https://a", "A", 1, t0 + Duration::minutes(i)))
            .chain(std::iter::once(sample("https://b", "B", 1, t0)))
            .collect();
        store.add_samples(&samples).unwrap();

        let window = SampleFilter::between(t0 + Duration::minutes(1), t0 + Duration::minutes(3));
        assert_eq!(store.get_samples(&window).unwrap().len(), 3);

        let only_b = SampleFilter::default().for_monitor("https://b");
        let rows = store.get_samples(&only_b).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].monitor_name, "B");
    }

    #[test]
    fn test_latest_per_monitor_breaks_ties_by_id() {
        let (_tmp, store) = open();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let t1 = t0 + Duration::minutes(1);
        store
            .add_samples(&[
                sample("https://a", "A", 1, t0),
                sample("https://a", "A old", 0, t1),
                sample("https://a", "A new", 2, t1),
                sample("https://b", "B", 1, t0),
            ])
            .unwrap();

        let latest = store.latest_per_monitor().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].monitor_name, "A new");
        assert_eq!(latest[0].status, Some(MonitorStatus::Pending));
        assert_eq!(latest[1].monitor_name, "B");
        assert_eq!(store.count_samples().unwrap(), 4);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let (_tmp, store) = open();
        store.add_samples(&[]).unwrap();
        assert_eq!(store.count_samples().unwrap(), 0);
        assert!(store.latest_per_monitor().unwrap().is_empty());
    }

    #[test]
    fn test_batch_rolls_back_on_failed_insert() {
        let (_tmp, store) = open();
        store
            .conn()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_bad BEFORE INSERT ON metric_samples
                 WHEN NEW.monitor_url = 'bad'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let result = store.add_samples(&[
            sample("https://a", "A", 1, t0),
            sample("bad", "Bad", 1, t0),
        ]);

        assert!(matches!(result, Err(DbError::Sqlite(_))));
        assert_eq!(store.count_samples().unwrap(), 0);

        store.add_samples(&[sample("https://a", "A", 1, t0)]).unwrap();
        assert_eq!(store.count_samples().unwrap(), 1);
    }

    #[test]
    fn test_reopen_keeps_history() {
        let tmp = NamedTempFile::new().unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        {
            let store = Store::new(tmp.path()).unwrap();
            store.add_samples(&[sample("https://a", "A", 1, t0)]).unwrap();
        }
        let store = Store::new(tmp.path()).unwrap();
        assert_eq!(store.count_samples().unwrap(), 1);
    }

    #[test]
    fn test_parse_db_time_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_db_time("2024-01-02 03:04:05"), Some(expected));
        assert_eq!(parse_db_time("2024-01-02 03:04:05.000000000"), Some(expected));
        assert_eq!(parse_db_time("2024-01-02T03:04:05Z"), Some(expected));
        assert_eq!(parse_db_time("garbage"), None);
    }
}
