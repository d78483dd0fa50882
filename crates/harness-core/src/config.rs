use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod path_resolver;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const SCRIPT_PLACEHOLDER: &str = "{script}";
pub const DEFAULT_REPORT_NAME: &str = "output_logs.csv";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// External tool invocation: `<program> <args...>` with `{script}` replaced by the
/// materialized script path. When no argument carries the placeholder the path is
/// appended as the last argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ToolSpec {
    fn default() -> Self {
        Self {
            program: "openroad".into(),
            args: vec!["-python".into(), "-exit".into(), SCRIPT_PLACEHOLDER.into()],
        }
    }
}

impl ToolSpec {
    pub fn argv(&self, script: &Path) -> Vec<OsString> {
        let script_str = script.to_string_lossy();
        let mut substituted = false;
        let mut out: Vec<OsString> = self
            .args
            .iter()
            .map(|a| {
                if a == SCRIPT_PLACEHOLDER {
                    substituted = true;
                    script.as_os_str().to_os_string()
                } else if a.contains(SCRIPT_PLACEHOLDER) {
                    substituted = true;
                    OsString::from(a.replace(SCRIPT_PLACEHOLDER, &script_str))
                } else {
                    OsString::from(a)
                }
            })
            .collect();
        if !substituted {
            out.push(script.as_os_str().to_os_string());
        }
        out
    }
}

/// Everything a run needs, built once and passed down to every component.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    /// Source column; `None` selects the first column.
    pub column: Option<String>,
    pub delimiter: Option<u8>,
    pub limit: Option<usize>,
    pub out_dir: PathBuf,
    pub report_name: String,
    pub script_ext: String,
    pub tool: ToolSpec,
    pub timeout: Duration,
    pub kill_grace: Duration,
    pub concurrency: usize,
    pub batch_timeout: Option<Duration>,
    /// Rewrite the partial report every N recorded items; 0 writes only at the end.
    pub flush_every: usize,
    pub spawn_retries: u32,
    pub retry_backoff: Duration,
    pub rewrites: BTreeMap<String, String>,
    pub json_out: Option<PathBuf>,
    pub junit_out: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            column: None,
            delimiter: None,
            limit: None,
            out_dir: PathBuf::from("results"),
            report_name: DEFAULT_REPORT_NAME.into(),
            script_ext: "py".into(),
            tool: ToolSpec::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            kill_grace: Duration::from_secs(5),
            concurrency: default_concurrency(),
            batch_timeout: None,
            flush_every: 0,
            spawn_retries: 0,
            retry_backoff: Duration::from_millis(500),
            rewrites: BTreeMap::new(),
            json_out: None,
            junit_out: None,
        }
    }
}

pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl RunConfig {
    pub fn report_path(&self) -> PathBuf {
        self.out_dir.join(&self.report_name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.as_os_str().is_empty() {
            return Err(ConfigError("no input corpus given (--input)".into()));
        }
        if self.tool.program.trim().is_empty() {
            return Err(ConfigError("tool program must not be empty".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError("concurrency must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError("timeout must be greater than zero".into()));
        }
        if self.script_ext.is_empty()
            || self.script_ext.contains(['/', '\\', '.'])
        {
            return Err(ConfigError(format!(
                "invalid script extension '{}'",
                self.script_ext
            )));
        }
        if self.report_name.is_empty() || self.report_name.contains(['/', '\\']) {
            return Err(ConfigError(format!(
                "invalid report file name '{}'",
                self.report_name
            )));
        }
        Ok(())
    }
}

/// On-disk run file. Every field is optional; unset fields keep the current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_ext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_grace_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flush_every: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rewrites: BTreeMap<String, String>,
}

impl FileConfig {
    pub fn apply_to(self, cfg: &mut RunConfig) -> Result<(), ConfigError> {
        if let Some(v) = self.input {
            cfg.input = v;
        }
        if self.column.is_some() {
            cfg.column = self.column;
        }
        if let Some(d) = self.delimiter {
            cfg.delimiter = Some(delimiter_byte(d)?);
        }
        if self.limit.is_some() {
            cfg.limit = self.limit;
        }
        if let Some(v) = self.out_dir {
            cfg.out_dir = v;
        }
        if let Some(v) = self.report_name {
            cfg.report_name = v;
        }
        if let Some(v) = self.script_ext {
            cfg.script_ext = v;
        }
        if let Some(v) = self.tool {
            cfg.tool = v;
        }
        if let Some(v) = self.timeout_seconds {
            cfg.timeout = Duration::from_secs(v);
        }
        if let Some(v) = self.kill_grace_ms {
            cfg.kill_grace = Duration::from_millis(v);
        }
        if let Some(v) = self.concurrency {
            cfg.concurrency = v;
        }
        if let Some(v) = self.batch_timeout_seconds {
            cfg.batch_timeout = Some(Duration::from_secs(v));
        }
        if let Some(v) = self.flush_every {
            cfg.flush_every = v;
        }
        if let Some(v) = self.spawn_retries {
            cfg.spawn_retries = v;
        }
        if let Some(v) = self.retry_backoff_ms {
            cfg.retry_backoff = Duration::from_millis(v);
        }
        cfg.rewrites.extend(self.rewrites);
        Ok(())
    }
}

pub fn delimiter_byte(c: char) -> Result<u8, ConfigError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ConfigError(format!("delimiter must be a single ASCII character, got '{c}'")))
    }
}

pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);
    let mut cfg: FileConfig = serde_ignored::deserialize(deserializer, |p| {
        ignored_keys.insert(p.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML {}: {}", path.display(), e)))?;

    if !ignored_keys.is_empty() {
        tracing::warn!(
            event = "config_unknown_keys",
            file = %path.display(),
            keys = ?ignored_keys,
            "ignored unknown config fields"
        );
    }

    if cfg.version != 0 && cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }

    let r = path_resolver::PathResolver::new(path);
    r.resolve_opt(&mut cfg.input);
    r.resolve_opt(&mut cfg.out_dir);

    Ok(cfg)
}

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(
        path,
        r#"version: 1
input: RAG_non-thinking-v3.csv
column: response
out_dir: results
# limit: 10
timeout_seconds: 300
concurrency: 4
tool:
  program: openroad
  args: ["-python", "-exit", "{script}"]
script_ext: py
rewrites:
  design_dir: ../Design
  verilog_file: 1_synth.v
  design_top_module_name: gcd
"#,
    )
    .map_err(|e| ConfigError(format!("failed to write sample config: {}", e)))?;
    Ok(())
}
