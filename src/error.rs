use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt asset header: {0}")]
    CorruptHeader(String),

    #[error("Corrupt content cache: {0}")]
    CacheCorrupt(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AssetError>;

/// Builds the error reported when a lock was poisoned by a panicking thread.
pub(crate) fn lock_poisoned_error(what: &str) -> AssetError {
    AssetError::Internal(format!("{what} lock poisoned"))
}

/// Canonicalizes a path, returning the original if canonicalization fails.
pub fn canonicalize_existing_path(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}
