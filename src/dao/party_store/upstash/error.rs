//! Error types shared by the Upstash storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`UpstashDaoError`] failures.
pub type UpstashResult<T> = Result<T, UpstashDaoError>;

/// Failures that can occur while talking to Upstash Redis over REST.
#[derive(Debug, Error)]
pub enum UpstashDaoError {
    /// Required environment variable is missing.
    #[error("missing Upstash environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Upstash client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The command could not be sent.
    #[error("failed to send Upstash command `{command}`")]
    RequestSend {
        command: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// Upstash answered with a non-success HTTP status.
    #[error("unexpected Upstash response status {status} for `{command}`")]
    RequestStatus {
        command: &'static str,
        status: StatusCode,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode Upstash response for `{command}`")]
    DecodeResponse {
        command: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// Redis rejected the command.
    #[error("Upstash command `{command}` failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },
    /// The command result did not have the expected shape.
    #[error("unexpected result shape for Upstash command `{command}`")]
    UnexpectedResult { command: &'static str },
    /// A stored value could not be encoded or decoded.
    #[error("failed to (de)serialize Upstash value for `{key}`")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<UpstashDaoError> for StorageError {
    fn from(err: UpstashDaoError) -> Self {
        match err {
            UpstashDaoError::Codec { key, source } => StorageError::codec(key, source),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
