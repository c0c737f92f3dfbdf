//! Registry error types
//!
//! Every fault the registry can hit on the wire, as one uniform enum
//! carrying a message and, where the platform provides one, the OS
//! error code. None of these terminate the server.

/// Error type for connection registry operations
#[derive(Debug, Clone)]
pub enum RegistryError {
    /// Binding or listening on the server socket failed
    Bind { message: String, code: Option<i32> },
    /// Accepting an incoming connection failed
    Accept { message: String, code: Option<i32> },
    /// An operation referenced an identifier that is not live
    UnknownConnection(u64),
    /// Writing to a connection failed before the full byte count was accepted
    Send {
        id: u64,
        message: String,
        code: Option<i32>,
    },
    /// Reading from a connection failed
    Receive {
        id: u64,
        message: String,
        code: Option<i32>,
    },
    /// Streaming a file to a connection failed
    File { id: u64, message: String },
}

impl RegistryError {
    pub(crate) fn bind(e: &std::io::Error) -> Self {
        RegistryError::Bind {
            message: e.to_string(),
            code: e.raw_os_error(),
        }
    }

    pub(crate) fn accept(e: &std::io::Error) -> Self {
        RegistryError::Accept {
            message: e.to_string(),
            code: e.raw_os_error(),
        }
    }

    pub(crate) fn send(id: u64, e: &std::io::Error) -> Self {
        RegistryError::Send {
            id,
            message: e.to_string(),
            code: e.raw_os_error(),
        }
    }

    pub(crate) fn receive(id: u64, e: &std::io::Error) -> Self {
        RegistryError::Receive {
            id,
            message: e.to_string(),
            code: e.raw_os_error(),
        }
    }

    pub(crate) fn file(id: u64, e: &std::io::Error) -> Self {
        RegistryError::File {
            id,
            message: e.to_string(),
        }
    }

    /// Platform error code carried by the underlying fault, if any
    pub fn code(&self) -> Option<i32> {
        match self {
            RegistryError::Bind { code, .. }
            | RegistryError::Accept { code, .. }
            | RegistryError::Send { code, .. }
            | RegistryError::Receive { code, .. } => *code,
            RegistryError::UnknownConnection(_) | RegistryError::File { .. } => None,
        }
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Bind { message, .. } => write!(f, "bind failed: {}", message),
            RegistryError::Accept { message, .. } => write!(f, "accept failed: {}", message),
            RegistryError::UnknownConnection(id) => write!(f, "unknown connection id: {}", id),
            RegistryError::Send { id, message, .. } => {
                write!(f, "send to connection {} failed: {}", id, message)
            }
            RegistryError::Receive { id, message, .. } => {
                write!(f, "receive on connection {} failed: {}", id, message)
            }
            RegistryError::File { id, message } => {
                write!(f, "file transfer to connection {} failed: {}", id, message)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
