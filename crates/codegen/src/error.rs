//! Backend error types.

use std::fmt;

/// Error type for the code generation stage.
///
/// The backend is total on well-formed low-level NIR; every variant here
/// is fatal for its shard and fails the whole stage. `Format` exists so
/// IR emission can propagate `write!` failures with `?`.
#[derive(Debug)]
pub enum CodeGenError {
    /// A definition, type, value or op outside the supported low-level
    /// subset reached the emitter.
    Unsupported(String),
    /// A referenced global is not present in the definition map.
    MissingSymbol(String),
    /// A formatting error while writing IR text.
    Format(std::fmt::Error),
    /// A working-directory write failure.
    Io(std::io::Error),
}

impl CodeGenError {
    /// Unsupported-construct error carrying the offending entity's
    /// textual form.
    pub fn unsupported(entity: &impl fmt::Debug) -> CodeGenError {
        CodeGenError::Unsupported(format!("{:?}", entity))
    }
}

impl fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeGenError::Unsupported(s) => write!(f, "unsupported construct: {}", s),
            CodeGenError::MissingSymbol(s) => write!(f, "symbol not found in program: {}", s),
            CodeGenError::Format(e) => write!(f, "IR generation error: {}", e),
            CodeGenError::Io(e) => write!(f, "workdir write error: {}", e),
        }
    }
}

impl std::error::Error for CodeGenError {}

impl From<std::fmt::Error> for CodeGenError {
    fn from(e: std::fmt::Error) -> Self {
        CodeGenError::Format(e)
    }
}

impl From<std::io::Error> for CodeGenError {
    fn from(e: std::io::Error) -> Self {
        CodeGenError::Io(e)
    }
}
