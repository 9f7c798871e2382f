use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),
}

impl CoreError {
    /// Transient network or server failure the user can retry
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CoreError::Sync(e) if e.is_recoverable())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
