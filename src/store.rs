//! SQLite store for scenario runs
//!
//! One session per harness invocation, one row per scenario and one row per
//! recorded result. Uses WAL mode so a run can be inspected while it writes.

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use thiserror::Error;

use crate::harness::runner::ScenarioReport;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode json: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Scenario row as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSummary {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub verdict: String,
    pub duration_secs: f64,
    pub error: Option<String>,
}

/// Result row as read back from the store
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub severity: String,
    pub success: bool,
    pub message: String,
    pub recorded_at: String,
}

pub struct ResultStore {
    conn: Connection,
}

impl ResultStore {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                label TEXT NOT NULL,
                settings_json TEXT
            );

            CREATE TABLE IF NOT EXISTS scenarios (
                id INTEGER PRIMARY KEY,
                session_id TEXT REFERENCES sessions(id),
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                verdict TEXT NOT NULL,
                duration_secs REAL NOT NULL,
                phases_json TEXT NOT NULL,
                error TEXT
            );

            CREATE TABLE IF NOT EXISTS results (
                id INTEGER PRIMARY KEY,
                scenario_id INTEGER REFERENCES scenarios(id),
                seq INTEGER NOT NULL,
                severity TEXT NOT NULL,
                success INTEGER NOT NULL,
                description TEXT NOT NULL,
                message TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_scenarios_session ON scenarios(session_id);
            CREATE INDEX IF NOT EXISTS idx_scenarios_verdict ON scenarios(verdict);
            CREATE INDEX IF NOT EXISTS idx_results_scenario ON results(scenario_id, seq);
            "#,
        )?;
        Ok(())
    }

    /// Create a new session and return its ID
    pub fn create_session(&self, label: &str, settings_json: Option<&str>) -> StoreResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO sessions (id, created_at, label, settings_json) VALUES (?1, ?2, ?3, ?4)",
            params![id, created_at, label, settings_json],
        )?;

        Ok(id)
    }

    /// Insert a finished scenario with all its results and return the scenario ID
    pub fn record_scenario(
        &mut self,
        session_id: &str,
        category: &str,
        report: &ScenarioReport,
    ) -> StoreResult<i64> {
        let phases_json = serde_json::to_string(&report.phases)?;
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"INSERT INTO scenarios
               (session_id, name, category, verdict, duration_secs, phases_json, error)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                session_id,
                report.name,
                category,
                report.verdict.to_string(),
                report.duration.as_secs_f64(),
                phases_json,
                report.error,
            ],
        )?;
        let scenario_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO results
                   (scenario_id, seq, severity, success, description, message, recorded_at)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            )?;
            for (seq, result) in report.results.iter().enumerate() {
                stmt.execute(params![
                    scenario_id,
                    seq as i64,
                    result.severity.as_str(),
                    result.success,
                    result.description,
                    result.message,
                    result.recorded_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(scenario_id)
    }

    pub fn session_count(&self) -> StoreResult<u64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
    }

    pub fn scenarios(&self, session_id: &str) -> StoreResult<Vec<ScenarioSummary>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT id, name, category, verdict, duration_secs, error
               FROM scenarios WHERE session_id = ?1 ORDER BY id"#,
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(ScenarioSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
                verdict: row.get(3)?,
                duration_secs: row.get(4)?,
                error: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn results(&self, scenario_id: i64) -> StoreResult<Vec<ResultRecord>> {
        let mut stmt = self.conn.prepare(
            r#"SELECT severity, success, message, recorded_at
               FROM results WHERE scenario_id = ?1 ORDER BY seq"#,
        )?;
        let rows = stmt.query_map(params![scenario_id], |row| {
            Ok(ResultRecord {
                severity: row.get(0)?,
                success: row.get(1)?,
                message: row.get(2)?,
                recorded_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recent failing run of a scenario, if any
    pub fn last_failure(&self, name: &str) -> StoreResult<Option<ScenarioSummary>> {
        Ok(self
            .conn
            .query_row(
                r#"SELECT id, name, category, verdict, duration_secs, error
                   FROM scenarios WHERE name = ?1 AND verdict = 'FAIL'
                   ORDER BY id DESC LIMIT 1"#,
                params![name],
                |row| {
                    Ok(ScenarioSummary {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        category: row.get(2)?,
                        verdict: row.get(3)?,
                        duration_secs: row.get(4)?,
                        error: row.get(5)?,
                    })
                },
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::report::ResultSink;
    use crate::harness::runner::{Phase, Verdict};
    use std::time::Duration;

    fn report(name: &str, pass: bool) -> ScenarioReport {
        let mut sink = ResultSink::new();
        sink.info("starting");
        sink.result(("Instances placed", "Instances missing"), pass);
        ScenarioReport {
            name: name.to_string(),
            verdict: if pass { Verdict::Pass } else { Verdict::Fail },
            results: sink.into_records(),
            phases: vec![Phase::Init, Phase::Setup, Phase::Running, Phase::Teardown, Phase::Done],
            duration: Duration::from_millis(250),
            error: None,
        }
    }

    #[test]
    fn test_record_and_read_back() {
        let mut store = ResultStore::open_in_memory().unwrap();
        let session = store.create_session("unit", Some("{}")).unwrap();
        assert_eq!(store.session_count().unwrap(), 1);

        let id = store.record_scenario(&session, "vegetation", &report("spawn", true)).unwrap();
        store.record_scenario(&session, "vegetation", &report("filter", false)).unwrap();

        let scenarios = store.scenarios(&session).unwrap();
        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[0].name, "spawn");
        assert_eq!(scenarios[0].verdict, "PASS");
        assert_eq!(scenarios[1].verdict, "FAIL");
        assert!((scenarios[0].duration_secs - 0.25).abs() < 1e-9);

        let results = store.results(id).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].severity, "INFO");
        assert_eq!(results[1].message, "Instances placed");
        assert!(results[1].success);
    }

    #[test]
    fn test_last_failure() {
        let mut store = ResultStore::open_in_memory().unwrap();
        let session = store.create_session("unit", None).unwrap();
        assert_eq!(store.last_failure("filter").unwrap(), None);

        store.record_scenario(&session, "vegetation", &report("filter", false)).unwrap();
        let second = store.record_scenario(&session, "vegetation", &report("filter", false)).unwrap();
        store.record_scenario(&session, "vegetation", &report("filter", true)).unwrap();

        let failure = store.last_failure("filter").unwrap().unwrap();
        assert_eq!(failure.id, second);
    }
}
