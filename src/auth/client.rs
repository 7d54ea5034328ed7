use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{Level, event, instrument};

use super::{AuthError, IntoMalformedIdentity, IntoTransportError};
use crate::{
    profile::Profile,
    transport::{Transport, TransportError, broker_endpoint},
};

/// Broker service that answers login requests.
pub const AUTH_SERVICE: &str = "authService";

pub type Result<T> = std::result::Result<T, AuthError>;

/// Who a profile was logged into as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub username: String,
    /// Per-user scope passed along with note calls.
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, profile: &Profile, username: &str, password: &str) -> Result<Identity>;
}

/// Logs in through the profile's own broker.
#[derive(derive_more::Debug, Clone)]
pub struct AuthClient {
    #[debug(skip)]
    transport: Arc<dyn Transport>,
}

impl AuthClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Authenticator for AuthClient {
    #[instrument(skip(self, profile, password), fields(profile = %profile.name), err)]
    async fn login(&self, profile: &Profile, username: &str, password: &str) -> Result<Identity> {
        let endpoint = broker_endpoint(&profile.broker_url)
            .into_transport_error(format!("resolving broker for {}", profile.name))?;

        let rejected = || AuthError::Rejected {
            username: username.to_string(),
            profile: profile.name.clone(),
        };

        let response = match self
            .transport
            .submit(
                &endpoint,
                AUTH_SERVICE,
                "login",
                json!({ "username": username, "password": password }),
            )
            .await
        {
            Err(TransportError::Status {
                status: 401 | 403, ..
            }) => return Err(rejected()),
            response => response.into_transport_error(format!("login on {}", profile.name))?,
        };

        if response.is_null() {
            return Err(rejected());
        }

        let identity: Identity = serde_json::from_value(response)
            .into_malformed_identity(format!("login on {}", profile.name))?;

        event!(Level::INFO, username, alias = %identity.alias, "logged in");

        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBroker;

    #[tokio::test]
    async fn login_returns_identity() {
        let broker = Arc::new(FakeBroker::default());
        let client = AuthClient::new(broker.clone());
        let profile = Profile::new("1", "Server1", "broker.test");

        let identity = client.login(&profile, "alice", "secret").await.unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.alias, "alice-alias");
    }

    #[tokio::test]
    async fn bad_password_is_rejected() {
        let broker = Arc::new(FakeBroker::default());
        let client = AuthClient::new(broker);
        let profile = Profile::new("1", "Server1", "broker.test");

        assert!(matches!(
            client.login(&profile, "alice", "wrong").await,
            Err(AuthError::Rejected { username, .. }) if username == "alice"
        ));
    }

    #[tokio::test]
    async fn unreachable_broker_is_a_transport_error() {
        let broker = Arc::new(FakeBroker::default());
        broker.fail("broker.test", true);
        let client = AuthClient::new(broker);
        let profile = Profile::new("1", "Server1", "broker.test");

        assert!(matches!(
            client.login(&profile, "alice", "secret").await,
            Err(AuthError::TransportError { .. })
        ));
    }
}
