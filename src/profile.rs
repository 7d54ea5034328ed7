//! Server profiles: the configured set of broker-reachable servers.

use ahash::HashSet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::vfs::VfsPath;

/// One configured remote server.
///
/// The profile's `name` is the root segment it appears under in the virtual
/// tree, so it is unique, non-empty and free of path separators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Profile {
    /// Stable identifier. Survives renames.
    pub id: String,

    /// Display name and root segment.
    pub name: String,

    /// Base URL of the broker fronting this server. A missing scheme is
    /// treated as `http://`.
    pub broker_url: String,

    /// Base URL that folder icons are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Url>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_url: Option<Url>,

    /// Mount this profile at startup.
    #[serde(default)]
    pub auto_connect: bool,
}

impl Profile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, broker_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            broker_url: broker_url.into(),
            image_url: None,
            search_url: None,
            auto_connect: false,
        }
    }

    /// The profile's root path in the virtual tree.
    pub fn root(&self) -> VfsPath {
        VfsPath::home().child(self.name.clone())
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("duplicate profile id {0:?}")]
    DuplicateId(String),
    #[error("duplicate profile name {0:?}")]
    DuplicateName(String),
    #[error("invalid profile name {0:?}")]
    InvalidName(String),
    #[error("profile name {0:?} is taken by the session root")]
    SessionNameClash(String),
    #[error("unknown profile {0:?}")]
    UnknownProfile(String),
}

/// Checks that `profiles` can share one namespace with the session root.
pub fn validate(profiles: &[Profile], session_name: &str) -> Result<(), ProfileError> {
    let mut ids = HashSet::default();
    let mut names = HashSet::default();

    for profile in profiles {
        if crate::vfs::validate_name(&profile.name).is_err() {
            return Err(ProfileError::InvalidName(profile.name.clone()));
        }
        if profile.name == session_name {
            return Err(ProfileError::SessionNameClash(profile.name.clone()));
        }
        if !ids.insert(profile.id.as_str()) {
            return Err(ProfileError::DuplicateId(profile.id.clone()));
        }
        if !names.insert(profile.name.as_str()) {
            return Err(ProfileError::DuplicateName(profile.name.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_distinct_profiles() {
        let profiles = [
            Profile::new("1", "Server1", "broker1"),
            Profile::new("2", "Server2", "broker2"),
        ];
        assert!(validate(&profiles, "Local").is_ok());
    }

    #[test]
    fn rejects_collisions() {
        let dup_id = [Profile::new("1", "A", "b"), Profile::new("1", "B", "b")];
        assert!(matches!(validate(&dup_id, "Local"), Err(ProfileError::DuplicateId(id)) if id == "1"));

        let dup_name = [Profile::new("1", "A", "b"), Profile::new("2", "A", "b")];
        assert!(matches!(validate(&dup_name, "Local"), Err(ProfileError::DuplicateName(_))));

        let clash = [Profile::new("1", "Local", "b")];
        assert!(matches!(validate(&clash, "Local"), Err(ProfileError::SessionNameClash(_))));
    }

    #[test]
    fn rejects_unusable_names() {
        for name in ["", "a/b", ".."] {
            let profiles = [Profile::new("1", name, "b")];
            assert!(matches!(validate(&profiles, "Local"), Err(ProfileError::InvalidName(_))));
        }
    }
}
