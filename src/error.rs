use std::path::PathBuf;

/// Error taxonomy for the bus core (§7 of the design).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("corrupt queue state: {0}")]
    Corrupt(&'static str),

    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("service type not registered: {0}")]
    UnknownServiceType(String),

    #[error("service configuration invalid: {0:?}")]
    Validation(Vec<String>),

    #[error("operation cancelled")]
    Cancelled,

    #[error("programming error: {0}")]
    Programming(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
