use super::args::*;
use harness_core::config::{delimiter_byte, load_file_config, write_sample_config, RunConfig};
use harness_core::errors::ConfigError;

pub mod prepare;
pub mod run;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let res = match cli.cmd {
        Command::Run(args) => run::run(args).await,
        Command::Prepare(args) => prepare::run(args).await,
        Command::Init(args) => cmd_init(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    };

    match res {
        Err(e) if e.downcast_ref::<ConfigError>().is_some() => {
            eprintln!("config error: {e}");
            Ok(exit_codes::CONFIG_ERROR)
        }
        other => other,
    }
}

fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    if args.config.exists() {
        eprintln!("note: {} already exists", args.config.display());
        return Ok(exit_codes::OK);
    }
    if let Some(parent) = args.config.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_sample_config(&args.config)?;
    eprintln!("created {}", args.config.display());
    Ok(exit_codes::OK)
}

/// Defaults, then the run file, then whatever was given on the command line.
pub(crate) fn build_config(corpus: &CorpusArgs) -> Result<RunConfig, ConfigError> {
    let mut cfg = RunConfig::default();

    if let Some(path) = &corpus.config {
        load_file_config(path)?.apply_to(&mut cfg)?;
    }

    if let Some(v) = &corpus.input {
        cfg.input = v.clone();
    }
    if corpus.column.is_some() {
        cfg.column = corpus.column.clone();
    }
    if let Some(d) = corpus.delimiter {
        cfg.delimiter = Some(delimiter_byte(d)?);
    }
    if corpus.limit.is_some() {
        cfg.limit = corpus.limit;
    }
    if let Some(v) = &corpus.out_dir {
        cfg.out_dir = v.clone();
    }
    if let Some(v) = &corpus.script_ext {
        cfg.script_ext = v.clone();
    }
    Ok(cfg)
}
