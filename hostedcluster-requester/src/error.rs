use kube::core::admission::SerializePatchError;
use thiserror::Error;

/// Errors that can occur while admitting a HostedCluster
#[derive(Error, Debug)]
pub enum Error {
    /// The mutated object could not be re-encoded
    #[error("SerializationError: {0}")]
    SerializationError(#[source] serde_json::Error),

    /// The admitted object is not a valid HostedCluster
    #[error("DecodeError: {0}")]
    DecodeError(#[source] serde_json::Error),

    /// The computed patch could not be attached to the response
    #[error("PatchError: {0}")]
    PatchError(#[from] SerializePatchError),

    /// Error while starting the webhook server
    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    /// The serving certificate or key is unusable
    #[error("TlsError: {0}")]
    Tls(String),

    /// A listener could not be bound
    #[error("Server Error: {0}")]
    Server(#[from] warp::Error),
}

/// Result type for webhook operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
