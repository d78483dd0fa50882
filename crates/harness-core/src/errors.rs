use std::path::PathBuf;
use std::time::Duration;

/// Fatal, pre-execution failure. Nothing has run when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ConfigError(pub String);

/// Item-level failure. Always folded into an `ExecutionResult` with the `-1` sentinel,
/// never propagated past the item boundary.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("timed out after {} seconds", format_secs(.0))]
    Timeout(Duration),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context} ({}): {source}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("batch deadline exceeded before item started")]
    BatchDeadline,
}

impl HarnessError {
    /// Spawn errors that may clear up on their own (fs contention, EAGAIN).
    /// A missing binary or a permission problem will not.
    pub fn is_transient(&self) -> bool {
        match self {
            HarnessError::Spawn { source, .. } => !matches!(
                source.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ),
            _ => false,
        }
    }

    /// Text written to the item's log file in place of tool output.
    pub fn log_body(&self) -> String {
        format!("Exception: {}", self)
    }
}

fn format_secs(d: &Duration) -> String {
    if d.subsec_millis() == 0 {
        d.as_secs().to_string()
    } else {
        format!("{:.3}", d.as_secs_f64())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectorError {
    #[error("result for item {0} was already recorded")]
    Duplicate(u64),
}
