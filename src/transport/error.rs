#[derive(Debug, thiserror::Error, thiserror_ext::ContextInto)]
#[non_exhaustive]
pub enum TransportError {
    #[error("broker request failed: {from}")]
    RequestError { source: reqwest::Error, from: String },
    #[error("broker answered {status} to {operation}: {body}")]
    Status {
        status: u16,
        operation: String,
        body: String,
    },
    #[error("malformed broker response: {from}")]
    MalformedResponse {
        source: serde_json::Error,
        from: String,
    },
    #[error("invalid broker URL {url:?}")]
    InvalidEndpoint { source: url::ParseError, url: String },
}
