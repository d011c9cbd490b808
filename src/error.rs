//! Error types for GatiBridge

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// GatiBridge error types
///
/// Every variant is fatal to the current session attempt. The only recovery
/// path is the supervisor's one-shot local fallback.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Goal message text could not be decoded
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Controller state precondition broken before a send
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Trajectory generator reported an error
    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    /// Peripheral did not produce the expected token within the poll budget
    #[error("Handshake timeout: no '{token}' after {polls} polls")]
    HandshakeTimeout {
        /// Token that was being awaited
        token: &'static str,
        /// Number of reads performed
        polls: u32,
    },

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error (peripheral or network)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport used after it was released
    #[error("Link closed")]
    LinkClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures on the peripheral or network boundary
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Serial(_) | Error::LinkClosed)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
