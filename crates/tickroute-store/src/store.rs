//! `DuckDB` access for the endpoint configuration table.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use duckdb::{params, Connection, Row};

use crate::error::StoreError;
use crate::models::EndpointRow;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS endpoint_configs (
    endpoint_name        TEXT PRIMARY KEY,
    source_name          TEXT NOT NULL,
    data_category        TEXT NOT NULL,
    target_db            TEXT,
    priority             INTEGER NOT NULL DEFAULT 100,
    quality_score        INTEGER NOT NULL DEFAULT 0,
    status               TEXT NOT NULL DEFAULT 'active',
    health_status        TEXT NOT NULL DEFAULT 'healthy',
    success_rate         DOUBLE NOT NULL DEFAULT 1.0,
    avg_response_time_ms DOUBLE NOT NULL DEFAULT 0.0,
    consecutive_failures INTEGER NOT NULL DEFAULT 0,
    total_calls          BIGINT NOT NULL DEFAULT 0,
    total_successes      BIGINT NOT NULL DEFAULT 0,
    last_success_time    TEXT,
    parameters           TEXT NOT NULL DEFAULT '{}',
    description          TEXT NOT NULL DEFAULT '',
    test_parameters      TEXT NOT NULL DEFAULT '{}',
    source_config        TEXT NOT NULL DEFAULT '{}',
    quality_rules        TEXT NOT NULL DEFAULT '{}',
    update_schedule      TEXT,
    business_scene       TEXT,
    tags                 TEXT NOT NULL DEFAULT '[]',
    version              TEXT
);
";

const SELECT_COLUMNS: &str = "endpoint_name, source_name, data_category, target_db, \
     priority, quality_score, status, health_status, success_rate, \
     avg_response_time_ms, consecutive_failures, total_calls, total_successes, \
     last_success_time, parameters, description, test_parameters, source_config, \
     quality_rules, update_schedule, business_scene, tags, version";

/// Read-mostly store over the `endpoint_configs` table.
///
/// The connection is serialized behind a mutex; registry loads are rare
/// (startup and explicit reload) so contention is not a concern.
pub struct ConfigStore {
    db_path: PathBuf,
    conn: Mutex<Connection>,
}

impl ConfigStore {
    /// Open (creating if needed) the store at `path` and ensure the schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let db_path = path.into();
        let conn = Connection::open(db_path.as_path())
            .map_err(|error| StoreError::Connection(error.to_string()))?;
        let store = Self {
            db_path,
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open an in-memory store. Used by tests and fixtures.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|error| StoreError::Connection(error.to_string()))?;
        let store = Self {
            db_path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        self.db_path.as_path()
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        conn.execute_batch(SCHEMA)
            .map_err(|error| StoreError::Schema(error.to_string()))
    }

    /// Load all rows with `status = 'active'`, ordered by priority.
    pub fn load_active(&self) -> Result<Vec<EndpointRow>, StoreError> {
        let conn = self.lock_conn();
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM endpoint_configs \
             WHERE status = ? ORDER BY priority ASC, endpoint_name ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params!["active"], row_to_endpoint)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Insert or replace one endpoint row. Used by fixtures, tests, and
    /// operator tooling; the routing layer itself never writes.
    pub fn upsert(&self, row: &EndpointRow) -> Result<(), StoreError> {
        let conn = self.lock_conn();
        conn.execute(
            "INSERT OR REPLACE INTO endpoint_configs (endpoint_name, source_name, \
             data_category, target_db, priority, quality_score, status, health_status, \
             success_rate, avg_response_time_ms, consecutive_failures, total_calls, \
             total_successes, last_success_time, parameters, description, \
             test_parameters, source_config, quality_rules, update_schedule, \
             business_scene, tags, version) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                row.endpoint_name,
                row.source_name,
                row.data_category,
                row.target_db,
                i64::from(row.priority),
                i64::from(row.quality_score),
                row.status,
                row.health_status,
                row.success_rate,
                row.avg_response_time_ms,
                i64::from(row.consecutive_failures),
                to_i64(row.total_calls)?,
                to_i64(row.total_successes)?,
                row.last_success_time,
                row.parameters.to_string(),
                row.description,
                row.test_parameters.to_string(),
                row.source_config.to_string(),
                row.quality_rules.to_string(),
                row.update_schedule,
                row.business_scene,
                serde_json::to_string(&row.tags)
                    .map_err(|error| StoreError::InvalidRow(error.to_string()))?,
                row.version,
            ],
        )?;
        Ok(())
    }

    /// Row count across all statuses.
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.lock_conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM endpoint_configs", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn lock_conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .expect("config store connection mutex poisoned")
    }
}

fn row_to_endpoint(row: &Row<'_>) -> duckdb::Result<EndpointRow> {
    Ok(EndpointRow {
        endpoint_name: row.get(0)?,
        source_name: row.get(1)?,
        data_category: row.get(2)?,
        target_db: row.get(3)?,
        priority: clamp_u32(row.get::<_, i64>(4)?),
        quality_score: clamp_u8(row.get::<_, i64>(5)?),
        status: row.get(6)?,
        health_status: row.get(7)?,
        success_rate: row.get(8)?,
        avg_response_time_ms: row.get(9)?,
        consecutive_failures: clamp_u32(row.get::<_, i64>(10)?),
        total_calls: clamp_u64(row.get::<_, i64>(11)?),
        total_successes: clamp_u64(row.get::<_, i64>(12)?),
        last_success_time: row.get(13)?,
        parameters: parse_json(row.get::<_, String>(14)?),
        description: row.get(15)?,
        test_parameters: parse_json(row.get::<_, String>(16)?),
        source_config: parse_json(row.get::<_, String>(17)?),
        quality_rules: parse_json(row.get::<_, String>(18)?),
        update_schedule: row.get(19)?,
        business_scene: row.get(20)?,
        tags: parse_tags(row.get::<_, String>(21)?),
        version: row.get(22)?,
    })
}

fn parse_json(raw: String) -> serde_json::Value {
    serde_json::from_str(&raw)
        .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
}

fn parse_tags(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn clamp_u8(value: i64) -> u8 {
    u8::try_from(value.clamp(0, i64::from(u8::MAX))).unwrap_or(u8::MAX)
}

fn clamp_u64(value: i64) -> u64 {
    u64::try_from(value.max(0)).unwrap_or(0)
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidRow(format!("counter {value} exceeds BIGINT range")))
}
