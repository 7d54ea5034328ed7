use std::path::Path;

use anyhow::{Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_inline_default::serde_inline_default;
use url::Url;

use crate::{profile, profile::Profile, transport, vfs};

#[serde_inline_default]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionConfig {
    #[serde_inline_default("Local".to_string())]
    /// Name of the in-process store, shown as the first root under Home.
    pub name: String,

    #[serde(default)]
    /// Base URL for icons of Home, the session and profiles without an image
    /// URL of their own.
    pub default_image_url: Option<Url>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "Local".to_string(),
            default_image_url: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub broker: transport::Config,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Config {
    pub fn load() -> Result<Config> {
        Self::load_from("brokerfs.toml")
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("BROKERFS_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if vfs::validate_name(&self.session.name).is_err() {
            bail!("invalid session name {:?}", self.session.name);
        }
        profile::validate(&self.profiles, &self.session.name)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_without_a_file() {
        Jail::expect_with(|_| {
            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.session.name, "Local");
            assert_eq!(config.broker.timeout, Duration::from_secs(30));
            assert!(config.profiles.is_empty());
            Ok(())
        });
    }

    #[test]
    fn reads_file_and_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "brokerfs.toml",
                r#"
                [session]
                name = "Mine"

                [broker]
                timeout = "5s"

                [[profiles]]
                id = "1"
                name = "Server1"
                broker_url = "broker1.test"
                auto_connect = true
                "#,
            )?;
            jail.set_env("BROKERFS_BROKER__LOG_MESSAGES", "true");

            let config = Config::load().map_err(|e| e.to_string())?;

            assert_eq!(config.session.name, "Mine");
            assert_eq!(config.broker.timeout, Duration::from_secs(5));
            assert!(config.broker.log_messages);
            assert_eq!(config.profiles.len(), 1);
            assert!(config.profiles[0].auto_connect);
            Ok(())
        });
    }

    #[test]
    fn rejects_profile_named_like_the_session() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
                [[profiles]]
                id = "1"
                name = "Local"
                broker_url = "broker1.test"
                "#,
            )?;

            assert!(Config::load_from("custom.toml").is_err());
            Ok(())
        });
    }
}
