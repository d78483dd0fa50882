use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Return code recorded when the harness could not obtain a real exit status.
pub const SENTINEL_RC: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRecord {
    /// 1-based row position in the corpus.
    pub id: u64,
    pub raw_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedScript {
    pub id: u64,
    pub code: String,
    pub path: PathBuf,
}

/// Terminal state of a single item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Tool ran to completion; the exit code may still be non-zero.
    Completed,
    TimedOut,
    SpawnErrored,
    /// Never started because the batch deadline passed first.
    NotStarted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub id: u64,
    pub return_code: i32,
    pub outcome: Outcome,
    pub log_path: PathBuf,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_sha256: Option<String>,
}

impl ExecutionResult {
    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Completed && self.return_code == 0
    }

    /// Bare file name of the log, as written into the report.
    pub fn log_file_name(&self) -> String {
        self.log_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.log_path.to_string_lossy().to_string())
    }
}

/// Flattened report view. Column names match the historical `output_logs` sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportRow {
    pub index: u64,
    pub return_code: i32,
    pub log_file: String,
}

impl From<&ExecutionResult> for ReportRow {
    fn from(r: &ExecutionResult) -> Self {
        Self {
            index: r.id,
            return_code: r.return_code,
            log_file: r.log_file_name(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    pub tool_failed: usize,
    pub timed_out: usize,
    pub spawn_errored: usize,
    pub not_started: usize,
}

impl Tally {
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        let mut t = Tally::default();
        for r in results {
            if r.passed() {
                t.passed += 1;
                continue;
            }
            match r.outcome {
                Outcome::Completed => t.tool_failed += 1,
                Outcome::TimedOut => t.timed_out += 1,
                Outcome::SpawnErrored => t.spawn_errored += 1,
                Outcome::NotStarted => t.not_started += 1,
            }
        }
        t
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub input: PathBuf,
    pub column: String,
    pub total: usize,
    #[serde(flatten)]
    pub tally: Tally,
    pub results: Vec<ExecutionResult>,
}
