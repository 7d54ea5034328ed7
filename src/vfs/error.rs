use super::VfsPath;
use crate::{auth::AuthError, profile::ProfileError, transport::TransportError};

#[derive(Debug, thiserror::Error, thiserror_ext::ContextInto)]
#[non_exhaustive]
pub enum Error {
    #[error("no provider found for path {0}")]
    NoProviderFound(VfsPath),
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
    #[error("transport error during {from}")]
    TransportError { source: TransportError, from: String },
    #[error("authentication error")]
    AuthError(#[from] AuthError),
    #[error("profile error")]
    ProfileError(#[from] ProfileError),
    #[error("\"{0}\" is not connected")]
    NotConnected(String),
    #[error("not found: {0}")]
    NotFound(VfsPath),
    #[error("already exists: {0}")]
    AlreadyExists(VfsPath),
    #[error("cannot move {0} into itself")]
    MoveIntoSelf(VfsPath),
    #[error("invalid name {0:?}")]
    InvalidName(String),
    #[error("unexpected response to {from}")]
    MalformedResponse {
        source: serde_json::Error,
        from: String,
    },
}
