use super::types::{BackendType, Direction, State};

/// Errors returned by context operations
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ContextError {
    /// The operation is refused while connecting or connected
    #[error("operation not allowed while the context is {0}")]
    Busy(State),

    /// The operation requires a ready context
    #[error("context is {0}, not ready")]
    NotReady(State),

    /// No backend module is registered, or every candidate failed
    #[error("no usable sound backend available")]
    NoBackendAvailable,

    /// The pinned backend type has no registered module
    #[error("backend {0} is not available")]
    BackendUnavailable(BackendType),

    /// The pinned backend was tried and failed
    #[error("backend {0} failed to open")]
    BackendFailed(String),

    /// A stream of the wrong direction was passed
    #[error("stream '{stream}' is not an {expected} stream")]
    WrongDirection {
        /// Name of the offending stream
        stream: String,
        /// Direction the operation requires
        expected: Direction,
    },

    /// The stream is not part of the active backend's graph
    #[error("stream '{0}' does not belong to the active backend")]
    UnknownStream(String),

    /// The active backend does not support the operation
    #[error("backend does not support {0}")]
    Unsupported(&'static str),

    /// The active backend refused the operation
    #[error("backend rejected {0}")]
    Rejected(&'static str),
}

/// Errors returned by stream control operations
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// The control lacks the capability flag for the operation
    #[error("control '{control}' does not support {operation}")]
    Unsupported {
        /// Control name
        control: String,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// The backend refused to apply the change
    #[error("backend rejected {operation} on control '{control}'")]
    Rejected {
        /// Control name
        control: String,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// A value outside the accepted range was passed
    #[error("value {value} is outside {min}..={max}")]
    OutOfRange {
        /// Rejected value
        value: f64,
        /// Lowest accepted value
        min: f64,
        /// Highest accepted value
        max: f64,
    },

    /// The channel index does not exist
    #[error("control '{control}' has no channel {channel}")]
    InvalidChannel {
        /// Control name
        control: String,
        /// Requested channel index
        channel: usize,
    },

    /// The target stream already holds a control with the same name
    #[error("stream '{stream}' already has a control named '{control}'")]
    NameTaken {
        /// Control name
        control: String,
        /// Target stream
        stream: String,
    },
}

/// Errors returned by switch operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SwitchError {
    /// The switch is read-only
    #[error("switch '{0}' cannot be changed")]
    ReadOnly(String),

    /// The option is not one of the switch's own options
    #[error("option '{option}' does not belong to switch '{switch}'")]
    ForeignOption {
        /// Switch name
        switch: String,
        /// Option name
        option: String,
    },

    /// No option with the given name exists
    #[error("switch '{switch}' has no option '{option}'")]
    UnknownOption {
        /// Switch name
        switch: String,
        /// Option name
        option: String,
    },

    /// The switch is not a toggle
    #[error("switch '{0}' is not a toggle")]
    NotToggle(String),

    /// The backend refused the change
    #[error("backend rejected option '{option}' on switch '{switch}'")]
    Rejected {
        /// Switch name
        switch: String,
        /// Option name
        option: String,
    },
}

/// Errors raised while instantiating a backend module
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// A library or service the backend needs is missing
    #[error("backend {backend} unavailable: {reason}")]
    Unavailable {
        /// Backend name
        backend: String,
        /// Why it is unavailable
        reason: String,
    },

    /// The backend could not be constructed
    #[error("failed to initialize backend {backend}: {reason}")]
    InitializationFailed {
        /// Backend name
        backend: String,
        /// Failure details
        reason: String,
    },
}
