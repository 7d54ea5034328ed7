use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{Level, event, instrument};
use url::Url;

use super::{
    Config,
    IntoMalformedResponse,
    IntoRequestError,
    Transport,
    TransportError,
};

/// A [`Transport`] that POSTs JSON envelopes to the broker over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBroker {
    client: reqwest::Client,
    log_messages: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BrokerRequest<'a> {
    service_name: &'a str,
    method_name: &'a str,
    args: &'a Value,
}

impl HttpBroker {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .into_request_error("failed to build HTTP client")?;

        Ok(Self {
            client,
            log_messages: config.log_messages,
        })
    }
}

#[async_trait]
impl Transport for HttpBroker {
    #[instrument(skip(self, args), err)]
    async fn submit(
        &self,
        endpoint: &Url,
        service: &str,
        operation: &str,
        args: Value,
    ) -> Result<Value, TransportError> {
        if self.log_messages {
            event!(Level::DEBUG, %args, "broker request");
        }

        let request = BrokerRequest {
            service_name: service,
            method_name: operation,
            args: &args,
        };

        let response = self
            .client
            .post(endpoint.clone())
            .json(&request)
            .send()
            .await
            .into_request_error(format!("{service}.{operation}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .into_request_error(format!("reading {service}.{operation} response"))?;

        if self.log_messages {
            event!(Level::DEBUG, status = status.as_u16(), body = %body, "broker response");
        }

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                operation: operation.to_string(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).into_malformed_response(format!("{service}.{operation}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{Json, http::StatusCode, routing::post};
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::transport::{REQUEST_PATH, broker_endpoint};

    /// Serves one canned answer at the request path and records what arrived.
    async fn broker(status: StatusCode, body: &'static str) -> (Url, Arc<Mutex<Option<Value>>>) {
        let seen = Arc::new(Mutex::new(None));
        let recorder = seen.clone();
        let app = axum::Router::new().route(
            REQUEST_PATH,
            post(move |Json(request): Json<Value>| async move {
                *recorder.lock() = Some(request);
                (status, body)
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (broker_endpoint(&address.to_string()).unwrap(), seen)
    }

    fn client() -> HttpBroker {
        HttpBroker::new(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn posts_the_envelope_and_decodes_the_result() {
        let (endpoint, seen) = broker(StatusCode::OK, r#"{"files":[]}"#).await;

        let result = client()
            .submit(&endpoint, "restFsService", "listFiles", json!({ "path": ["a"] }))
            .await
            .unwrap();

        assert_eq!(result, json!({ "files": [] }));
        assert_eq!(
            seen.lock().clone(),
            Some(json!({
                "serviceName": "restFsService",
                "methodName": "listFiles",
                "args": { "path": ["a"] },
            }))
        );
    }

    #[tokio::test]
    async fn empty_body_is_null() {
        let (endpoint, _) = broker(StatusCode::OK, "").await;

        let result = client()
            .submit(&endpoint, "restFsService", "saveFile", json!({}))
            .await
            .unwrap();

        assert_eq!(result, Value::Null);
    }

    #[tokio::test]
    async fn error_status_keeps_the_body() {
        let (endpoint, _) = broker(StatusCode::SERVICE_UNAVAILABLE, "down").await;

        assert!(matches!(
            client().submit(&endpoint, "restFsService", "listFiles", json!({})).await,
            Err(TransportError::Status { status: 503, operation, body })
                if operation == "listFiles" && body == "down"
        ));
    }

    #[tokio::test]
    async fn garbage_is_a_malformed_response() {
        let (endpoint, _) = broker(StatusCode::OK, "not json").await;

        assert!(matches!(
            client().submit(&endpoint, "restFsService", "listFiles", json!({})).await,
            Err(TransportError::MalformedResponse { .. })
        ));
    }
}
