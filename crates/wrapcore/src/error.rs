//! # Errors
//!
//! One error type spans resolution, loading and invocation so that a failure
//! deep inside a nested invoke surfaces with its original category.

use crate::uri::Uri;

/// Fieldless category of an `Error`, stable across the FFI boundary.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUri,
    UriNotFound,
    CircularRedirect,
    ReentrantInvoke,
    Load,
    ModuleExecution,
    Config,
    Codec,
}

#[derive(Debug)]
pub enum Error {
    /// Input could not be parsed as a Uri.
    InvalidUri { input: String, reason: String },
    /// No resolver matched, or the hop limit was exceeded.
    UriNotFound { uri: Uri, history: Vec<Uri> },
    /// A redirect led back to a Uri already visited during this resolution.
    CircularRedirect { uri: Uri, history: Vec<Uri> },
    /// A module tried to invoke a Uri that is already executing in its call stack.
    ReentrantInvoke { uri: Uri, stack: Vec<Uri> },
    /// A matched package failed to produce a wrapper. `uri` is filled in by the load cache.
    Load { uri: Option<Uri>, message: String },
    /// The wrapper itself failed. `uri` and `method` are filled in by the client.
    ModuleExecution {
        uri: Option<Uri>,
        method: Option<String>,
        message: String,
    },
    /// Builder state cannot be frozen into a config.
    Config(String),
    /// Msgpack encoding or decoding failed.
    Codec(wrappack::Error),
}

impl Error {
    /// Failure raised from inside a module, before the client attributes it.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::ModuleExecution {
            uri: None,
            method: None,
            message: message.into(),
        }
    }

    /// Failure to turn module bytes into a wrapper, before a Uri is known.
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            uri: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUri { .. } => ErrorKind::InvalidUri,
            Self::UriNotFound { .. } => ErrorKind::UriNotFound,
            Self::CircularRedirect { .. } => ErrorKind::CircularRedirect,
            Self::ReentrantInvoke { .. } => ErrorKind::ReentrantInvoke,
            Self::Load { .. } => ErrorKind::Load,
            Self::ModuleExecution { .. } => ErrorKind::ModuleExecution,
            Self::Config(_) => ErrorKind::Config,
            Self::Codec(_) => ErrorKind::Codec,
        }
    }

    /// True for both redirect cycles and reentrant invokes.
    pub fn is_cycle(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CircularRedirect | ErrorKind::ReentrantInvoke
        )
    }
}

fn join(uris: &[Uri]) -> String {
    uris.iter()
        .map(Uri::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUri { input, reason } => {
                write!(f, "Invalid uri {:?}: {}", input, reason)
            }
            Self::UriNotFound { uri, history } if history.len() > 1 => {
                write!(f, "Uri not found: {} (via {})", uri, join(history))
            }
            Self::UriNotFound { uri, .. } => write!(f, "Uri not found: {}", uri),
            Self::CircularRedirect { uri, history } => {
                write!(f, "Circular redirect at {}: {}", uri, join(history))
            }
            Self::ReentrantInvoke { uri, stack } => {
                write!(f, "Reentrant invoke of {} from {}", uri, join(stack))
            }
            Self::Load {
                uri: Some(uri),
                message,
            } => write!(f, "Failed to load {}: {}", uri, message),
            Self::Load { message, .. } => write!(f, "Failed to load module: {}", message),
            Self::ModuleExecution {
                uri: Some(uri),
                method: Some(method),
                message,
            } => write!(f, "Module execution failed for {}.{}: {}", uri, method, message),
            Self::ModuleExecution { message, .. } => {
                write!(f, "Module execution failed: {}", message)
            }
            Self::Config(message) => write!(f, "Config error: {}", message),
            Self::Codec(e) => write!(f, "Codec error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wrappack::Error> for Error {
    fn from(e: wrappack::Error) -> Self {
        Self::Codec(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
