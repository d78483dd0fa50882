use super::{build_config, exit_codes};
use crate::cli::args::PrepareArgs;
use harness_core::engine::Runner;

pub async fn run(args: PrepareArgs) -> anyhow::Result<i32> {
    let cfg = build_config(&args.corpus)?;
    let corpus = harness_core::corpus::load(&cfg)?;
    let runner = Runner::new(cfg)?;

    let scripts = runner.prepare_all(&corpus).await?;
    tracing::info!(
        event = "scripts_prepared",
        count = scripts.len(),
        out_dir = %runner.config().out_dir.display()
    );
    eprintln!(
        "prepared {} scripts in {}",
        scripts.len(),
        runner.config().out_dir.display()
    );
    Ok(exit_codes::OK)
}
