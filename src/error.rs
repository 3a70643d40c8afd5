use std::fmt;

/// Taxonomy of evaluation failures produced by the interpreter.
///
/// `IOError` (spec: `FSeek` beyond EOF) is deliberately not a variant here:
/// it surfaces in-band as the host function's `-1` return value, never as
/// an error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    Syntax { token: String, line: u32 },
    Declaration(String),
    Type(String),
    Argument(String),
    Index(String),
    Internal(String),
}

impl VmError {
    pub fn declaration(msg: impl Into<String>) -> Self {
        VmError::Declaration(msg.into())
    }

    pub fn ty(msg: impl Into<String>) -> Self {
        VmError::Type(msg.into())
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        VmError::Argument(msg.into())
    }

    pub fn index(msg: impl Into<String>) -> Self {
        VmError::Index(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        VmError::Internal(msg.into())
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::Syntax { token, line } => {
                write!(f, "Syntax error near '{token}' at line {line}")
            }
            VmError::Declaration(msg) => write!(f, "{msg}"),
            VmError::Type(msg) => write!(f, "{msg}"),
            VmError::Argument(msg) => write!(f, "{msg}"),
            VmError::Index(msg) => write!(f, "{msg}"),
            VmError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for VmError {}

pub type Result<T> = std::result::Result<T, VmError>;
