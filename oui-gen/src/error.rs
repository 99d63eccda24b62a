use thiserror::Error;

/// Errors that can occur while reading or compiling a vendor index.
#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("vendor index must be a JSON object mapping prefixes to names")]
    NotAnObject,
}
