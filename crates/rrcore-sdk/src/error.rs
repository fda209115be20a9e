use std::fmt;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for SDK operations.
#[derive(Debug)]
pub enum Error {
    /// Propagated from the Recorder or Player.
    Core(rrcore_types::CoreError),
    /// Raised by a `Hook` implementation's live call, not the ledger.
    Hook(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Core(err) => write!(f, "{}", err),
            Error::Hook(err) => write!(f, "hook failed: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Core(err) => Some(err),
            Error::Hook(err) => Some(err.as_ref()),
        }
    }
}

impl From<rrcore_types::CoreError> for Error {
    fn from(err: rrcore_types::CoreError) -> Self {
        Error::Core(err)
    }
}
