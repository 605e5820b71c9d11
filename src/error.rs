use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("License code not recognized")]
    InvalidCode,

    #[error("License is already activated")]
    AlreadyActivated,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("License has not been activated")]
    NotActivated,

    #[error("Device limit reached ({registered}/{limit}). Deactivate a device first.")]
    DeviceLimitExceeded { registered: i64, limit: i64 },

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session is bound to a different device")]
    DeviceMismatch,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Canonical kind string for the transport layer to map onto wire
    /// responses. Stable across releases; messages are not.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidCode => "invalid_code",
            AppError::AlreadyActivated => "already_activated",
            AppError::UsernameTaken => "username_taken",
            AppError::WeakPassword { .. } => "weak_password",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::NotActivated => "not_activated",
            AppError::DeviceLimitExceeded { .. } => "device_limit_exceeded",
            AppError::SessionNotFound => "session_not_found",
            AppError::SessionExpired => "session_expired",
            AppError::DeviceMismatch => "device_mismatch",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Only `StorageUnavailable` may be retried by the caller; every other
    /// kind is terminal for the request that produced it.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StorageUnavailable(_))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        // Busy/locked means another writer holds the database; surface it as
        // the one transient kind so callers know a retry can succeed.
        if let rusqlite::Error::SqliteFailure(failure, _) = &e
            && matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            )
        {
            return AppError::StorageUnavailable(e.to_string());
        }
        AppError::Database(e)
    }
}

impl From<r2d2::Error> for AppError {
    fn from(e: r2d2::Error) -> Self {
        // Pool checkout has a bounded timeout; failing it is transient.
        tracing::error!("Pool error: {}", e);
        AppError::StorageUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
