use thiserror::Error;
use tracing::{error, warn};

/// The closed error-kind taxonomy from spec §7, used for user-facing formatting and for the
/// testable properties in §8 (e.g. matching on `CircuitBroken` without caring about payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionMissing,
    NotTrusted,
    ElementNotFound,
    AmbiguousMatch,
    UnsupportedCapability,
    BridgeUnavailable,
    Timeout,
    DialogBlocking,
    CircuitBroken,
    AdapterFailed,
}

/// Domain errors for the perception-action core.
#[derive(Error, Debug)]
pub enum NexusError {
    #[error("accessibility permission not granted")]
    PermissionMissing,

    #[error("accessibility is not trusted; perception degraded to window list + screenshot")]
    NotTrusted,

    #[error("element not found for query {query:?} in app {app:?}")]
    ElementNotFound {
        query: String,
        app: Option<String>,
        suggestions: Vec<String>,
    },

    #[error("ambiguous match: {count} candidates for {query:?}")]
    AmbiguousMatch { query: String, count: usize },

    #[error("capability unavailable: {0}")]
    UnsupportedCapability(String),

    #[error("browser debug bridge unavailable on port {port}")]
    BridgeUnavailable { port: u16 },

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("unsafe system dialog blocking action: {classification}")]
    DialogBlocking { classification: String },

    #[error("circuit broken: {count} consecutive failures in {app} with no intervening success")]
    CircuitBroken {
        app: String,
        count: usize,
        recent: Vec<String>,
    },

    #[error("adapter call failed: {0}")]
    AdapterFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("(de)serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl NexusError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionMissing => ErrorKind::PermissionMissing,
            Self::NotTrusted => ErrorKind::NotTrusted,
            Self::ElementNotFound { .. } => ErrorKind::ElementNotFound,
            Self::AmbiguousMatch { .. } => ErrorKind::AmbiguousMatch,
            Self::UnsupportedCapability(_) => ErrorKind::UnsupportedCapability,
            Self::BridgeUnavailable { .. } => ErrorKind::BridgeUnavailable,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::DialogBlocking { .. } => ErrorKind::DialogBlocking,
            Self::CircuitBroken { .. } => ErrorKind::CircuitBroken,
            Self::AdapterFailed(_) | Self::Io(_) | Self::Json(_) | Self::Store(_) => {
                ErrorKind::AdapterFailed
            }
        }
    }

    /// Whether a GUI handler that returned this error should be retried once after
    /// reactivating the named app (spec §4.5 "wrong-app retry").
    pub fn is_element_not_found(&self) -> bool {
        matches!(self, Self::ElementNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, NexusError>;

/// Extension trait for error logging with caller location tracking.
/// Use when the operation is recoverable and user doesn't need to know.
///
/// Includes file/line information using `#[track_caller]` for better debugging.
/// Follows the Zed error handling pattern.
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}

/// Log an error from a background-thread operation. Use for fire-and-forget patterns in the
/// observer/event-tap loops, where the hook pipeline contract forbids propagating.
pub fn log_async_err<T, E: std::fmt::Debug>(
    result: std::result::Result<T, E>,
    operation: &str,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            error!(
                error = ?err,
                operation = operation,
                "Async operation failed"
            );
            None
        }
    }
}

/// Panic in debug mode, log error in release mode.
///
/// Use for "impossible" states that should crash during development
/// but gracefully degrade in production. This follows the Zed pattern
/// for handling invariant violations.
#[macro_export]
macro_rules! debug_panic {
    ( $($fmt_arg:tt)* ) => {
        if cfg!(debug_assertions) {
            panic!( $($fmt_arg)* );
        } else {
            tracing::error!("IMPOSSIBLE STATE: {}", format_args!($($fmt_arg)*));
        }
    };
}
