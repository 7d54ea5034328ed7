//! Mounting and unmounting remote profiles at runtime.

use std::sync::Arc;

use ahash::{HashMap, HashSet};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror_ext::AsReport;
use tracing::{Level, event, instrument};

use crate::{
    auth::{Authenticator, Identity},
    profile::{Profile, ProfileError},
    transport::Transport,
    vfs::{Error, Provider, RemoteProvider, Router},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountState {
    Unmounted,
    Connecting,
    Mounted,
}

/// Overall connectivity, as shown next to the profile list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// The outcome of one auto-mount attempt.
#[derive(Debug)]
pub struct MountOutcome {
    pub profile: Profile,
    pub result: Result<(), Error>,
}

/// A provider rebuilt for a renamed or re-pointed profile, not yet bound.
#[derive(Debug)]
pub struct Rekey {
    old_name: String,
    profile: Profile,
    provider: RemoteProvider,
}

#[derive(derive_more::Debug)]
pub struct MountManager {
    router: Arc<Router>,
    #[debug(skip)]
    transport: Arc<dyn Transport>,
    #[debug(skip)]
    authenticator: Arc<dyn Authenticator>,
    connecting: RwLock<HashSet<String>>,
    identities: RwLock<HashMap<String, Identity>>,
    status: RwLock<ConnectionStatus>,
}

impl MountManager {
    pub fn new(
        router: Arc<Router>,
        transport: Arc<dyn Transport>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            router,
            transport,
            authenticator,
            connecting: RwLock::new(HashSet::default()),
            identities: RwLock::new(HashMap::default()),
            status: RwLock::new(ConnectionStatus::Disconnected),
        }
    }

    pub fn state(&self, id: &str) -> MountState {
        if self.router.is_mounted(id) {
            MountState::Mounted
        } else if self.connecting.read().contains(id) {
            MountState::Connecting
        } else {
            MountState::Unmounted
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    pub fn identity(&self, id: &str) -> Option<Identity> {
        self.identities.read().get(id).cloned()
    }

    fn settle_status(&self) {
        let status = if self
            .router
            .profiles()
            .iter()
            .any(|profile| self.router.is_mounted(&profile.id))
        {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };

        *self.status.write() = status;
    }

    fn provider_for(&self, profile: &Profile) -> Result<RemoteProvider, Error> {
        let alias = self
            .identities
            .read()
            .get(&profile.id)
            .map(|identity| identity.alias.clone());

        RemoteProvider::new(profile.clone(), self.transport.clone(), alias)
    }

    /// Binds a remote provider for `profile` once it has answered a folder
    /// tree request. Mounting a mounted profile does nothing.
    #[instrument(skip_all, fields(profile = %profile.name), err)]
    pub async fn mount(&self, profile: &Profile, identity: Option<Identity>) -> Result<(), Error> {
        let profile = self
            .router
            .profile(&profile.id)
            .ok_or_else(|| ProfileError::UnknownProfile(profile.id.clone()))?;

        if self.router.is_mounted(&profile.id) {
            return Ok(());
        }

        let supplied_identity = identity.is_some();
        if let Some(identity) = identity {
            self.identities.write().insert(profile.id.clone(), identity);
        }

        self.connecting.write().insert(profile.id.clone());
        let probed = async {
            let provider = self.provider_for(&profile)?;
            provider.get_folder_tree().await?;
            Ok::<_, Error>(provider)
        }
        .await;
        self.connecting.write().remove(&profile.id);

        // The profile may have been renamed or removed while the probe ran.
        let result = probed.and_then(|provider| {
            let current = self
                .router
                .profile(&profile.id)
                .ok_or_else(|| ProfileError::UnknownProfile(profile.id.clone()))?;

            if self.router.is_mounted(&current.id) {
                return Ok(());
            }

            let provider = if current == profile {
                provider
            } else {
                self.provider_for(&current)?
            };
            self.router.bind(current, provider.into());
            event!(Level::INFO, "mounted");
            Ok(())
        });

        if result.is_err() && supplied_identity {
            self.identities.write().remove(&profile.id);
        }
        result
    }

    /// Logs in and mounts with the resulting identity.
    pub async fn login_and_mount(
        &self,
        profile: &Profile,
        username: &str,
        password: &str,
    ) -> Result<(), Error> {
        *self.status.write() = ConnectionStatus::Connecting;

        let result = match self.authenticator.login(profile, username, password).await {
            Ok(identity) => self.mount(profile, Some(identity)).await,
            Err(error) => Err(error.into()),
        };

        self.settle_status();
        result
    }

    /// Drops the binding and identity for the profile with `id`. Never fails,
    /// even if the profile was never mounted.
    pub fn unmount(&self, id: &str) {
        for binding in self.router.unbind_profile(id) {
            event!(Level::INFO, profile = %binding.profile.name, "unmounted");
        }

        self.identities.write().remove(id);
        self.settle_status();
    }

    /// Mounts every auto-connect profile concurrently. One failure does not
    /// affect the others; every outcome is returned.
    pub async fn auto_mount(&self) -> Vec<MountOutcome> {
        let profiles: Vec<Profile> = self
            .router
            .profiles()
            .into_iter()
            .filter(|profile| profile.auto_connect)
            .collect();

        if profiles.is_empty() {
            return Vec::new();
        }

        *self.status.write() = ConnectionStatus::Connecting;

        let results = join_all(profiles.iter().map(|profile| self.mount(profile, None))).await;

        let outcomes: Vec<MountOutcome> = profiles
            .into_iter()
            .zip(results)
            .map(|(profile, result)| {
                if let Err(error) = &result {
                    event!(
                        Level::WARN,
                        profile = %profile.name,
                        error = %error.as_report(),
                        "auto-mount failed"
                    );
                }
                MountOutcome { profile, result }
            })
            .collect();

        *self.status.write() = if outcomes.iter().any(|outcome| outcome.result.is_ok()) {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };

        outcomes
    }

    /// Builds the replacement provider for a mounted profile whose name or
    /// broker changed, without binding it. Unmounted profiles need none.
    pub fn prepare_rekey(&self, old_name: &str, profile: &Profile) -> Result<Option<Rekey>, Error> {
        if self.router.binding(old_name).is_none() {
            return Ok(None);
        }

        Ok(Some(Rekey {
            old_name: old_name.to_string(),
            profile: profile.clone(),
            provider: self.provider_for(profile)?,
        }))
    }

    /// Binds prepared providers, all in one step so that swapped names
    /// cannot clobber each other.
    pub fn apply_rekeys(&self, rekeys: Vec<Rekey>) {
        let changes = rekeys
            .into_iter()
            .map(|rekey| {
                event!(Level::INFO, old_name = %rekey.old_name, new_name = %rekey.profile.name, "re-keyed mount");
                (rekey.old_name, rekey.profile, rekey.provider.into())
            })
            .collect();

        self.router.rebind(changes);
    }

    /// Re-keys a mounted profile after a rename, rebuilding its provider so it
    /// carries the new profile. Unmounted profiles are left alone.
    pub fn rekey(&self, old_name: &str, profile: &Profile) -> Result<(), Error> {
        let prepared = self.prepare_rekey(old_name, profile)?;
        self.apply_rekeys(prepared.into_iter().collect());
        Ok(())
    }
}
