//! Wrappers around the external chemistry tools.

pub mod chemspot;
pub mod opsin;
pub mod osra;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::exec::{self, ExecError};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("{tool}: unparseable output: {detail}")]
    Parse { tool: &'static str, detail: String },
    #[error("chemspot ran out of heap; raise the memory limit")]
    OutOfMemory,
}

impl ToolError {
    pub(crate) fn parse(tool: &'static str, detail: impl Into<String>) -> Self {
        Self::Parse {
            tool,
            detail: detail.into(),
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Common surface of the wrapped binaries.
#[async_trait]
pub trait ExternalTool {
    fn name(&self) -> &'static str;

    /// Configured binary path, if the caller overrode the default.
    fn binary_path(&self) -> Option<&Path>;

    /// Resolve the binary before any work starts. Missing binaries are a
    /// configuration error and abort the whole run.
    fn preflight(&self) -> ToolResult<PathBuf> {
        match self.binary_path() {
            Some(path) if path.exists() => Ok(path.to_path_buf()),
            Some(path) => Err(ExecError::NotFound(path.display().to_string()).into()),
            None => Ok(exec::resolve_binary(self.name())?),
        }
    }

    /// Tool version string, for diagnostics.
    async fn version(&self) -> ToolResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe(Option<PathBuf>);

    #[async_trait]
    impl ExternalTool for Probe {
        fn name(&self) -> &'static str {
            "sh"
        }

        fn binary_path(&self) -> Option<&Path> {
            self.0.as_deref()
        }

        async fn version(&self) -> ToolResult<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn preflight_resolves_from_path() {
        assert!(Probe(None).preflight().is_ok());
    }

    #[test]
    fn preflight_rejects_missing_override() {
        let err = Probe(Some(PathBuf::from("/nonexistent/sh")))
            .preflight()
            .unwrap_err();
        assert!(matches!(err, ToolError::Exec(ExecError::NotFound(_))));
    }
}
