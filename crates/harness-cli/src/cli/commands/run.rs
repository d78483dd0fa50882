use super::{build_config, exit_codes};
use crate::cli::args::RunArgs;
use harness_core::config::RunConfig;
use harness_core::engine::Runner;
use harness_core::errors::ConfigError;
use harness_core::report::{self, console, junit};
use std::path::Path;
use std::time::Duration;

pub async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let cfg = run_config(&args)?;
    let corpus = harness_core::corpus::load(&cfg)?;
    let runner = Runner::new(cfg)?;

    let artifacts = runner.run_batch(&corpus).await?;

    // report is already written; extra outputs only warn
    let cfg = runner.config();
    if let Some(path) = &cfg.json_out {
        if let Err(e) = report::write_json_summary(&artifacts, path) {
            extra_output_failed("json", path, &e);
        }
    }
    if let Some(path) = &cfg.junit_out {
        if let Err(e) = junit::write_junit(&corpus.column, &artifacts.results, path) {
            extra_output_failed("junit", path, &e);
        }
    }

    console::print_summary(&artifacts.results, args.verbose);
    eprintln!("report: {}", artifacts.report_path.display());

    // item failures are data in the report, not a harness failure
    Ok(exit_codes::OK)
}

fn extra_output_failed(kind: &str, path: &Path, e: &anyhow::Error) {
    tracing::error!(
        event = "extra_output_failed",
        kind,
        path = %path.display(),
        error = %e
    );
    eprintln!("warning: failed to write {} output {}: {}", kind, path.display(), e);
}

fn run_config(args: &RunArgs) -> Result<RunConfig, ConfigError> {
    let mut cfg = build_config(&args.corpus)?;

    if let Some(secs) = args.timeout {
        cfg.timeout = Duration::from_secs(secs);
    }
    if let Some(n) = args.concurrency {
        cfg.concurrency = n;
    }
    if let Some(program) = &args.tool {
        cfg.tool.program = program.clone();
        cfg.tool.args = args.tool_args.clone();
    } else if !args.tool_args.is_empty() {
        cfg.tool.args = args.tool_args.clone();
    }
    if let Some(v) = &args.report_name {
        cfg.report_name = v.clone();
    }
    if let Some(secs) = args.batch_timeout {
        cfg.batch_timeout = Some(Duration::from_secs(secs));
    }
    if let Some(n) = args.flush_every {
        cfg.flush_every = n;
    }
    if let Some(n) = args.spawn_retries {
        cfg.spawn_retries = n;
    }
    if let Some(ms) = args.retry_backoff_ms {
        cfg.retry_backoff = Duration::from_millis(ms);
    }
    if let Some(ms) = args.kill_grace_ms {
        cfg.kill_grace = Duration::from_millis(ms);
    }
    if args.json.is_some() {
        cfg.json_out = args.json.clone();
    }
    if args.junit.is_some() {
        cfg.junit_out = args.junit.clone();
    }

    cfg.validate()?;
    Ok(cfg)
}
