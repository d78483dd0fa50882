use crate::model::{ExecutionResult, Outcome, Tally};

pub fn print_summary(results: &[ExecutionResult], verbose: bool) {
    eprintln!("\nEvaluated {} scripts", results.len());

    for r in results {
        let duration = format!("({:.1}s)", r.duration_ms as f64 / 1000.0);
        let label = format!("#{}", r.id);
        if r.passed() {
            if verbose {
                eprintln!("✅ {:<8} rc=0  {}", label, duration);
            }
            continue;
        }
        match r.outcome {
            Outcome::Completed => {
                eprintln!(
                    "❌ {:<8} rc={}  {}  {}",
                    label,
                    r.return_code,
                    duration,
                    r.log_file_name()
                );
            }
            Outcome::TimedOut => {
                eprintln!("⏱️  {:<8} TIMEOUT {}  {}", label, duration, r.log_file_name());
            }
            Outcome::SpawnErrored => {
                eprintln!("💥 {:<8} ERROR  {}", label, r.log_file_name());
            }
            Outcome::NotStarted => {
                eprintln!("⏭️  {:<8} NOT STARTED (batch deadline)", label);
            }
        }
    }

    let t = Tally::from_results(results);
    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!("{}", summary_line(&t));
}

pub fn summary_line(t: &Tally) -> String {
    format!(
        "Summary: {} passed, {} failed, {} timed out, {} error, {} not started",
        t.passed, t.tool_failed, t.timed_out, t.spawn_errored, t.not_started
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_lists_every_bucket() {
        let t = Tally {
            passed: 2,
            tool_failed: 1,
            timed_out: 1,
            spawn_errored: 3,
            not_started: 0,
        };
        assert_eq!(
            summary_line(&t),
            "Summary: 2 passed, 1 failed, 1 timed out, 3 error, 0 not started"
        );
    }
}
