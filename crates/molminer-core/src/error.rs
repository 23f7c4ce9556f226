use thiserror::Error;

use crate::annotate::AnnotateError;
use crate::document::DocumentError;
use crate::exec::ExecError;
use crate::report::ReportError;
use crate::tools::ToolError;

/// Error of a whole extraction run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Annotate(#[from] AnnotateError),
}

pub type Result<T> = std::result::Result<T, Error>;
