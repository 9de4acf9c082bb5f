use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a walk.
///
/// Missing or unparsable dependencies are not errors: they end up as offline nodes
/// or skipped arcs reported through [`crate::report::Reporter`].
#[derive(Debug, Error)]
pub enum WalkError {
    /// The root asset could not be opened as a stage.
    #[error("cannot open stage {}: {source:#}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WalkError {
    pub fn open(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        WalkError::Open {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_error_mentions_path_and_cause() {
        let err = WalkError::open("/show/missing.usda", anyhow::anyhow!("No such file"));
        let message = err.to_string();
        assert!(message.contains("/show/missing.usda"));
        assert!(message.contains("No such file"));
    }
}
