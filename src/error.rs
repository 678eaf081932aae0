use std::time::Duration;

/// Errors that can occur when supervising a UCI engine.
///
/// Errors are organized by category:
/// - Configuration errors: detected at `build()` time
/// - Spawn errors: failed to start the engine process
/// - IO errors: communication failures with the subprocess
/// - Lifecycle errors: crashes, cancellation, shutdown
/// - Runtime errors: timeouts and engine-reported failures
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    // -------------------------------------------------------------------------
    // Configuration errors (detected at build() time)
    // -------------------------------------------------------------------------
    /// Invalid configuration provided to builder.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -------------------------------------------------------------------------
    // Spawn errors
    // -------------------------------------------------------------------------
    /// Engine binary not found.
    #[error("engine binary not found (searched: {searched})")]
    EngineNotFound { searched: String },

    /// Failed to spawn the engine subprocess.
    #[error("failed to spawn engine process: {0}")]
    Spawn(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // IO errors
    // -------------------------------------------------------------------------
    /// Writing a command to the engine stdin failed.
    ///
    /// A write failure means the pipe is broken, so the supervisor treats
    /// the process as crashed.
    #[error("failed to write to engine: {0}")]
    Write(#[source] std::io::Error),

    /// IO error communicating with the engine subprocess.
    #[error("IO error: {0}")]
    Io(#[source] std::io::Error),

    // -------------------------------------------------------------------------
    // Lifecycle errors
    // -------------------------------------------------------------------------
    /// The engine stream closed or a write failed while the request was queued.
    #[error("engine crashed: {reason}")]
    EngineCrashed { reason: String },

    /// The request was discarded by an explicit `cancel()`.
    #[error("request cancelled")]
    Cancelled,

    /// The request was still pending when the engine was stopped.
    #[error("engine stopped")]
    Stopped,

    /// No live engine process exists to receive the command.
    #[error("engine is not running")]
    NotRunning,

    /// Automatic restarts are exhausted; the supervisor stays down until
    /// it is started again explicitly.
    #[error("engine crashed {attempts} times in a row, giving up")]
    MaxRestartsExceeded { attempts: u32 },

    /// The supervisor task is gone (every handle was dropped or the runtime
    /// is shutting down).
    #[error("engine supervisor has shut down")]
    SupervisorGone,

    // -------------------------------------------------------------------------
    // Runtime errors
    // -------------------------------------------------------------------------
    /// No matching response arrived within the budget.
    #[error("engine did not respond within {0:?}")]
    Timeout(Duration),

    /// The engine answered a command with an error report.
    #[error("engine rejected command: {message}")]
    EngineRejected { message: String },
}

/// A specialized Result type for libuci operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an IO error.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io(source)
    }

    /// Create a crash error with the given reason.
    pub fn crashed(reason: impl Into<String>) -> Self {
        Self::EngineCrashed {
            reason: reason.into(),
        }
    }

    /// Check if the failed operation may succeed when issued again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_)
                | Error::EngineCrashed { .. }
                | Error::Write(_)
                | Error::Cancelled
        )
    }

    /// Check if this error means the supervisor gave up on the engine.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::MaxRestartsExceeded { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
