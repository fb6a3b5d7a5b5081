use thiserror::Error;

/// Errors raised synchronously by `TaskDispatcher::submit` or delivered
/// asynchronously inside a `TaskEvent::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The id already maps to a task that is Pending or Running.
    #[error("task '{0}' is already pending or running")]
    Busy(String),
    /// The work closure returned an error (or panicked) on its worker thread.
    #[error("task '{task_id}' failed: {message}")]
    Execution { task_id: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyError {
    /// The canonical combination is already bound.
    #[error("hotkey '{combo}' is already bound by handler '{handler_id}'")]
    Conflict { combo: String, handler_id: String },
    /// The combination string failed validation.
    #[error("invalid hotkey '{combo}': {reason}")]
    Invalid { combo: String, reason: String },
}

/// Start/stop sequencing violations. The relaxed `start`/`stop` entry points
/// swallow these as no-ops; `try_start`/`try_stop` surface them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerStateError {
    #[error("timer is already running")]
    AlreadyRunning,
    #[error("timer is not running")]
    NotRunning,
}
