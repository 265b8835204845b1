use thiserror::Error;

/// Core error type for loading sources.
///
/// Problems inside a well-formed document are diagnostics, not errors; this
/// covers failures to obtain or decode a document at all.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// The source JSON Schema could not be compiled.
    #[error("schema error: {0}")]
    Schema(String),
}

/// Convenience alias for results returned by schemalink crates.
pub type Result<T> = std::result::Result<T, Error>;
