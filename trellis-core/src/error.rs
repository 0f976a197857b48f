// Error types for the Trellis runtime

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Registration method called outside the initial container state,
    /// or the container was booted twice.
    #[error("illegal container state: {0}")]
    IllegalState(String),

    #[error("service name already registered: {0}")]
    DuplicateName(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("circular dependency detected: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// A resolved dependency did not have the type the consumer asked for.
    #[error("dependency {index} of {target} is not a {expected}")]
    DependencyType {
        target: String,
        index: usize,
        expected: &'static str,
    },

    #[error("unknown delegate {name}; known delegates are: {}", .known.join(", "))]
    UnknownDelegate { name: String, known: Vec<String> },

    #[error("delegate argument error: {0}")]
    DelegateArg(String),

    /// A service name resolved fine but the value is not usable as
    /// middleware in the dispatch pipeline.
    #[error("service is not registered as middleware: {0}")]
    InvalidMiddleware(String),

    #[error("logic error: {0}")]
    Logic(String),

    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// Error raised by handler or middleware logic.
    #[error("handler error: {0}")]
    Handler(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the HTTP status code a transport should map this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => 404,
            Error::Deserialization(_) => 400,
            _ => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code())
    }
}
