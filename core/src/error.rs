use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CapsuleError>;

#[derive(Debug, Error)]
pub enum CapsuleError {
    #[error("invalid capsule name `{name}`")]
    InvalidName { name: String },

    #[error("invalid capsule `{name}`")]
    CapsuleNotFound { name: String },

    #[error("capsule `{name}` already exists")]
    CapsuleExists { name: String },

    #[error("`{name}` is not in the trust list")]
    NotTrusted { name: String },

    #[error("invalid command `{command}`")]
    InvalidCommand { command: String },

    #[error("invalid export file `{}`", path.display())]
    InvalidExport { path: PathBuf },

    /// The file is absent. Callers that can proceed without it (missing
    /// defaults, missing trust list) match on this variant explicitly.
    #[error("no such file `{}`", path.display())]
    NotFound { path: PathBuf },

    #[error("malformed document `{}`: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode `{}`: {source}", path.display())]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// A delegated child process failed. The child already reported the
    /// failure on its own stderr; our process exits with the same status
    /// and prints nothing further.
    #[error("{program} exited with status {status}")]
    Delegated { program: String, status: i32 },
}

impl CapsuleError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CapsuleError::Io {
            path: path.into(),
            source,
        }
    }
}
