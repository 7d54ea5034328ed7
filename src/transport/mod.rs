//! Request/response plumbing to the broker that fronts every remote server.
//!
//! A remote server is never spoken to directly. Each call names a service and
//! an operation and carries a JSON argument object; the broker answers with a
//! JSON result. [`Transport`] is the seam: [`HttpBroker`] is the real thing,
//! tests substitute an in-process fake.

mod config;
mod error;
mod http;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

pub use config::Config;
pub use error::*;
pub use http::HttpBroker;

/// Path appended to a profile's broker base URL.
pub const REQUEST_PATH: &str = "/api/broker/submitRequest";

#[async_trait]
pub trait Transport: Send + Sync {
    /// Submits `operation` on `service` at `endpoint` and returns the decoded
    /// result. A body-less success decodes to [`Value::Null`].
    async fn submit(
        &self,
        endpoint: &Url,
        service: &str,
        operation: &str,
        args: Value,
    ) -> Result<Value, TransportError>;
}

/// Builds the request endpoint for a configured broker base URL.
///
/// A missing scheme defaults to `http://` and one trailing slash is dropped
/// before [`REQUEST_PATH`] is appended.
pub fn broker_endpoint(base_url: &str) -> Result<Url, TransportError> {
    let mut full_url = base_url.trim().to_string();

    if !full_url.starts_with("http://") && !full_url.starts_with("https://") {
        full_url = format!("http://{full_url}");
    }

    if full_url.ends_with('/') {
        full_url.pop();
    }

    full_url.push_str(REQUEST_PATH);

    Url::parse(&full_url).into_invalid_endpoint(full_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_to_http() {
        let url = broker_endpoint("broker.example:8080").unwrap();
        assert_eq!(
            url.as_str(),
            "http://broker.example:8080/api/broker/submitRequest"
        );
    }

    #[test]
    fn endpoint_keeps_https_and_drops_trailing_slash() {
        let url = broker_endpoint("  https://broker.example/base/ ").unwrap();
        assert_eq!(
            url.as_str(),
            "https://broker.example/base/api/broker/submitRequest"
        );
    }

    #[test]
    fn endpoint_rejects_garbage() {
        assert!(matches!(
            broker_endpoint("http://[::1"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }
}
