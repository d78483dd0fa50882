use crate::model::{ExecutionResult, Outcome};
use std::path::Path;

pub fn write_junit(suite: &str, results: &[ExecutionResult], out: &Path) -> anyhow::Result<()> {
    let failures = results
        .iter()
        .filter(|r| r.outcome == Outcome::Completed && r.return_code != 0)
        .count();
    let errors = results
        .iter()
        .filter(|r| matches!(r.outcome, Outcome::TimedOut | Outcome::SpawnErrored))
        .count();
    let skipped = results
        .iter()
        .filter(|r| r.outcome == Outcome::NotStarted)
        .count();

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<testsuite name="{}" tests="{}" failures="{}" errors="{}" skipped="{}">"#,
        escape(suite),
        results.len(),
        failures,
        errors,
        skipped
    ));
    xml.push('\n');

    for r in results {
        xml.push_str(&format!(
            r#"  <testcase name="script_{}" time="{:.3}">"#,
            r.id,
            r.duration_ms as f64 / 1000.0
        ));
        let log = escape(&r.log_file_name());
        match r.outcome {
            Outcome::Completed if r.return_code == 0 => {}
            Outcome::Completed => xml.push_str(&format!(
                r#"<failure message="exit code {}">{}</failure>"#,
                r.return_code, log
            )),
            Outcome::TimedOut => {
                xml.push_str(&format!(r#"<error message="timed out">{}</error>"#, log))
            }
            Outcome::SpawnErrored => xml.push_str(&format!(
                r#"<error message="harness error">{}</error>"#,
                log
            )),
            Outcome::NotStarted => {
                xml.push_str(r#"<skipped message="batch deadline exceeded"/>"#)
            }
        }
        xml.push_str("</testcase>\n");
    }

    xml.push_str("</testsuite>\n");
    std::fs::write(out, xml)?;
    Ok(())
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
