use crate::model::{ExecutionResult, ReportRow, RunSummary, Tally};
use std::path::{Path, PathBuf};

pub mod console;
pub mod junit;

/// Everything a finished batch produced, results in corpus order.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
    pub input: PathBuf,
    pub column: String,
    pub report_path: PathBuf,
    pub results: Vec<ExecutionResult>,
}

impl RunArtifacts {
    pub fn tally(&self) -> Tally {
        Tally::from_results(&self.results)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            started_at: self.started_at,
            finished_at: self.finished_at,
            input: self.input.clone(),
            column: self.column.clone(),
            total: self.results.len(),
            tally: self.tally(),
            results: self.results.clone(),
        }
    }
}

/// Writes the `index,return_code,log_file` report, one row per result in ascending id
/// order. The file is written next to its destination and renamed into place, so a
/// reader (or a crash) never observes a half-written report.
pub fn write_report(results: &[ExecutionResult], out: &Path) -> anyhow::Result<()> {
    let mut rows: Vec<ReportRow> = results.iter().map(ReportRow::from).collect();
    rows.sort_by_key(|r| r.index);

    let tmp = tmp_path(out);
    {
        let mut w = csv::WriterBuilder::new().has_headers(false).from_path(&tmp)?;
        w.write_record(["index", "return_code", "log_file"])?;
        for row in &rows {
            w.serialize(row)?;
        }
        w.flush()?;
    }
    std::fs::rename(&tmp, out)?;
    Ok(())
}

pub fn read_report(path: &Path) -> anyhow::Result<Vec<ReportRow>> {
    let mut r = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for row in r.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

pub fn write_json_summary(artifacts: &RunArtifacts, out: &Path) -> anyhow::Result<()> {
    let tmp = tmp_path(out);
    std::fs::write(&tmp, serde_json::to_string_pretty(&artifacts.summary())?)?;
    std::fs::rename(&tmp, out)?;
    Ok(())
}

fn tmp_path(out: &Path) -> PathBuf {
    let mut name = out
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "report".into());
    name.push(".tmp");
    out.with_file_name(name)
}
