use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;

#[serde_inline_default]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename = "broker_config")]
pub struct Config {
    /// Upper bound on a single broker round trip. The default value is 30
    /// seconds.
    #[serde(
        default = "Config::default_timeout",
        skip_serializing_if = "Config::is_default_timeout",
        with = "humantime_serde"
    )]
    #[schemars(with = "String")]
    pub timeout: Duration,

    /// Log every broker request and response body at DEBUG level.
    #[serde_inline_default(false)]
    pub log_messages: bool,
}

impl Config {
    fn default_timeout() -> Duration {
        Duration::from_secs(30)
    }

    fn is_default_timeout(timeout: &Duration) -> bool {
        *timeout == Self::default_timeout()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: Self::default_timeout(),
            log_messages: false,
        }
    }
}
