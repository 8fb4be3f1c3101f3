//! Error types for outbound requests
//!
//! Every variant is a validation failure: it is raised before any network
//! attempt is made. Network and HTTP failures are reported through
//! [`Response`](super::Response) once the retry budget is spent.

use thiserror::Error;

use super::request::Method;

/// Result type alias for outbound request operations
pub type FetchResult<T> = Result<T, FetchError>;

/// Reasons a request is rejected before transmission
#[derive(Debug, Error)]
pub enum FetchError {
    /// The service name is not part of the registry
    #[error("invalid service: {0}")]
    UnknownService(String),

    /// The path is empty or whitespace only
    #[error("invalid url: empty path")]
    EmptyPath,

    /// The method name is not recognized
    #[error("invalid method: {0:?} not recognized")]
    UnknownMethod(String),

    /// A body was supplied for a read-only method
    #[error("invalid method: {0} cannot have a request body")]
    BodyNotAllowed(Method),

    /// The body could not be serialized to JSON
    #[error("invalid body: failed to marshal JSON: {0}")]
    Body(#[from] serde_json::Error),

    /// A header name or value is not valid HTTP
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}
