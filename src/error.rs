//! Crate error types

use crate::registry::RegistryError;

/// Error type for server-level operations
#[derive(Debug, Clone)]
pub enum Error {
    /// A registry operation failed
    Registry(RegistryError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Registry(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Registry(e) => Some(e),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

/// Convenience result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
