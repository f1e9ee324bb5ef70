use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by a record store driver
///
/// The dedup engine never propagates these to the transport: a failed
/// set-if-absent degrades to executing without dedup, and a failed cleanup is
/// logged and swallowed. The variants exist so drivers can report precisely
/// and so logs and metrics can tell outages from data problems.
#[derive(Error, Debug)]
pub enum StoreError {
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Error code for metrics labels and programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            #[cfg(feature = "redis")]
            StoreError::Redis(_) => "REDIS_ERROR",
            #[cfg(feature = "database")]
            StoreError::Database(_) => "DATABASE_ERROR",
            StoreError::Unavailable(_) => "STORE_UNAVAILABLE",
            StoreError::Config(_) => "CONFIG_ERROR",
            StoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True when the store could not be reached at all (as opposed to
    /// rejecting or failing a single command)
    pub fn is_connectivity(&self) -> bool {
        match self {
            #[cfg(feature = "redis")]
            StoreError::Redis(e) => {
                e.is_io_error()
                    || e.is_connection_refusal()
                    || e.is_connection_dropped()
                    || e.is_timeout()
            }
            #[cfg(feature = "database")]
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            StoreError::Unavailable(_) => true,
            StoreError::Config(_) | StoreError::Internal(_) => false,
        }
    }
}
