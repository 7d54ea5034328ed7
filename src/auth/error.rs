use crate::transport::TransportError;

#[derive(thiserror::Error, thiserror_ext::ContextInto, Debug)]
#[non_exhaustive]
pub enum AuthError {
    #[error("login rejected for {username:?} on {profile}")]
    Rejected { username: String, profile: String },
    #[error("login transport error: {from}")]
    TransportError { source: TransportError, from: String },
    #[error("malformed identity from {from}")]
    MalformedIdentity {
        source: serde_json::Error,
        from: String,
    },
}
