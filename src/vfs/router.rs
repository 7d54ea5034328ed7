use std::sync::Arc;

use ahash::HashMap;
use parking_lot::RwLock;
use tracing::{Level, event};
use url::Url;

use super::{
    Error,
    HomeProvider,
    ProfileRoot,
    ProviderInstance,
    SessionStore,
    StubProvider,
    VfsPath,
};
use crate::{
    icons::IconResolver,
    profile::{self, Profile, ProfileError},
};

/// A mounted profile: the provider answering for its root and the icon
/// resolver built alongside it.
#[derive(Debug, Clone)]
pub struct Binding {
    pub profile: Profile,
    pub provider: Arc<ProviderInstance>,
    pub icons: Arc<IconResolver>,
}

/// Maps root segments to providers.
///
/// Resolution is recomputed on every call from the current profile set and
/// bindings; only the provider instances themselves are kept.
#[derive(Debug)]
pub struct Router {
    session: SessionStore,
    session_provider: Arc<ProviderInstance>,
    default_image_url: Option<Url>,
    profiles: RwLock<Vec<Profile>>,
    bindings: RwLock<HashMap<String, Binding>>,
}

impl Router {
    pub fn new(
        session: SessionStore,
        profiles: Vec<Profile>,
        default_image_url: Option<Url>,
    ) -> Result<Self, ProfileError> {
        profile::validate(&profiles, session.name())?;

        Ok(Self {
            session_provider: Arc::new(session.clone().into()),
            session,
            default_image_url,
            profiles: RwLock::new(profiles),
            bindings: RwLock::new(HashMap::default()),
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn session_name(&self) -> &str {
        self.session.name()
    }

    /// The provider that owns `path`.
    pub fn resolve(&self, path: &VfsPath) -> Result<Arc<ProviderInstance>, Error> {
        let Some(root) = path.root() else {
            return Ok(Arc::new(self.home().into()));
        };

        if root == self.session.name() {
            return Ok(self.session_provider.clone());
        }

        if let Some(binding) = self.bindings.read().get(root) {
            return Ok(binding.provider.clone());
        }

        if self.profiles.read().iter().any(|profile| profile.name == root) {
            return Ok(Arc::new(StubProvider::new(root).into()));
        }

        Err(Error::NoProviderFound(path.clone()))
    }

    /// A Home provider reflecting the current profiles and mounts.
    pub fn home(&self) -> HomeProvider {
        let bindings = self.bindings.read();
        let roots = self
            .profiles
            .read()
            .iter()
            .map(|profile| ProfileRoot {
                id: profile.id.clone(),
                name: profile.name.clone(),
                connected: bindings.values().any(|binding| binding.profile.id == profile.id),
            })
            .collect();

        HomeProvider::new(self.session.clone(), roots)
    }

    fn binding_for(&self, profile: Profile, provider: ProviderInstance) -> Binding {
        let image_url = profile
            .image_url
            .clone()
            .or_else(|| self.default_image_url.clone());

        Binding {
            profile,
            provider: Arc::new(provider),
            icons: Arc::new(IconResolver::new(image_url)),
        }
    }

    /// Registers `provider` as the mount for `profile`, keyed by its name.
    pub fn bind(&self, profile: Profile, provider: ProviderInstance) {
        event!(Level::DEBUG, profile = %profile.name, "binding provider");
        let binding = self.binding_for(profile, provider);
        self.bindings
            .write()
            .insert(binding.profile.name.clone(), binding);
    }

    /// Drops every binding held by the profile with `id`.
    pub fn unbind_profile(&self, id: &str) -> Vec<Binding> {
        let mut bindings = self.bindings.write();

        let names: Vec<String> = bindings
            .iter()
            .filter(|(_, binding)| binding.profile.id == id)
            .map(|(name, _)| name.clone())
            .collect();

        names
            .iter()
            .filter_map(|name| bindings.remove(name))
            .collect()
    }

    /// Replaces the binding under each old name with a freshly built one for
    /// its profile. All old names are dropped before any new one is inserted.
    pub fn rebind(&self, changes: Vec<(String, Profile, ProviderInstance)>) {
        let (old_names, fresh): (Vec<_>, Vec<_>) = changes
            .into_iter()
            .map(|(old_name, profile, provider)| (old_name, self.binding_for(profile, provider)))
            .unzip();

        let mut bindings = self.bindings.write();
        for old_name in &old_names {
            bindings.remove(old_name);
        }
        for binding in fresh {
            bindings.insert(binding.profile.name.clone(), binding);
        }
    }

    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.bindings.read().get(name).cloned()
    }

    /// Names under which providers are currently bound.
    pub fn bound_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.bindings.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_mounted(&self, id: &str) -> bool {
        self.bindings
            .read()
            .values()
            .any(|binding| binding.profile.id == id)
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.profiles.read().clone()
    }

    pub fn profile(&self, id: &str) -> Option<Profile> {
        self.profiles
            .read()
            .iter()
            .find(|profile| profile.id == id)
            .cloned()
    }

    pub fn profile_named(&self, name: &str) -> Option<Profile> {
        self.profiles
            .read()
            .iter()
            .find(|profile| profile.name == name)
            .cloned()
    }

    /// Replaces the whole profile set. Bindings are left alone; callers
    /// unmount whatever no longer belongs.
    pub fn set_profiles(&self, profiles: Vec<Profile>) -> Result<(), ProfileError> {
        profile::validate(&profiles, self.session.name())?;
        *self.profiles.write() = profiles;
        Ok(())
    }

    /// Swaps in a new version of the profile with the same id and returns
    /// the previous one.
    pub fn replace_profile(&self, profile: Profile) -> Result<Profile, ProfileError> {
        let mut profiles = self.profiles.write();

        let index = profiles
            .iter()
            .position(|existing| existing.id == profile.id)
            .ok_or_else(|| ProfileError::UnknownProfile(profile.id.clone()))?;

        let mut updated = profiles.clone();
        let previous = std::mem::replace(&mut updated[index], profile);
        profile::validate(&updated, self.session.name())?;

        *profiles = updated;
        Ok(previous)
    }

    /// The icon resolver for whatever owns `path`.
    pub fn icons_for(&self, path: &VfsPath) -> Arc<IconResolver> {
        let default = || Arc::new(IconResolver::new(self.default_image_url.clone()));

        let Some(root) = path.root() else {
            return default();
        };

        if root == self.session.name() {
            return default();
        }

        if let Some(binding) = self.bindings.read().get(root) {
            return binding.icons.clone();
        }

        match self.profile_named(root) {
            Some(profile) => Arc::new(IconResolver::new(
                profile.image_url.or_else(|| self.default_image_url.clone()),
            )),
            None => Arc::new(IconResolver::default()),
        }
    }
}
