use crate::errors::HarnessError;
use crate::model::SanitizedScript;
use std::path::PathBuf;
use tokio::sync::OnceCell;

/// Owns the run's output directory and the per-item script/log file names in it.
///
/// The written scripts are the audit trail: they hold the exact bytes handed to the tool.
#[derive(Debug)]
pub struct ScriptMaterializer {
    out_dir: PathBuf,
    ext: String,
    dir_ready: OnceCell<()>,
}

impl ScriptMaterializer {
    pub fn new(out_dir: impl Into<PathBuf>, ext: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            ext: ext.into(),
            dir_ready: OnceCell::new(),
        }
    }

    pub fn script_path(&self, id: u64) -> PathBuf {
        self.out_dir.join(format!("script_{}.{}", id, self.ext))
    }

    pub fn log_path(&self, id: u64) -> PathBuf {
        self.out_dir.join(format!("log_{}.txt", id))
    }

    /// Creates the output directory on first use. Concurrent callers wait on the same
    /// creation; a failed attempt is retried by the next caller.
    pub async fn ensure_dir(&self) -> Result<(), HarnessError> {
        self.dir_ready
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.out_dir)
                    .await
                    .map_err(|source| HarnessError::Io {
                        context: "failed to create output directory",
                        path: self.out_dir.clone(),
                        source,
                    })
            })
            .await
            .map(|_| ())
    }

    pub async fn materialize(&self, id: u64, code: &str) -> Result<SanitizedScript, HarnessError> {
        self.ensure_dir().await?;
        let path = self.script_path(id);
        tokio::fs::write(&path, code.as_bytes())
            .await
            .map_err(|source| HarnessError::Io {
                context: "failed to write script",
                path: path.clone(),
                source,
            })?;
        Ok(SanitizedScript {
            id,
            code: code.to_string(),
            path,
        })
    }

    pub async fn write_log(&self, id: u64, body: &str) -> Result<PathBuf, HarnessError> {
        self.ensure_dir().await?;
        let path = self.log_path(id);
        tokio::fs::write(&path, body.as_bytes())
            .await
            .map_err(|source| HarnessError::Io {
                context: "failed to write log",
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}
