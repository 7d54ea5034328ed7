use std::ops::Deref;

use async_trait::async_trait;
use trait_enum::trait_enum;

use super::{Error, HomeProvider, ItemRef, Node, RemoteProvider, SessionStore, StubProvider};

/// One result per item of a multi-item operation, in request order.
pub type Outcomes = Vec<Result<(), Error>>;

/// A backend that owns one root of the virtual tree.
///
/// Every path handed to a provider is relative to its own root: the router
/// strips the root segment before calling in. Mutating operations address an
/// entry by its parent folder and its name.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Lists one level of the folder at `path`. Folders come back with empty,
    /// unloaded children and `.magnet` sidecars are already folded into their
    /// folders.
    async fn get_contents(&self, path: &[String]) -> Result<Vec<Node>, Error>;

    /// The provider's root node with its immediate children loaded.
    async fn get_folder_tree(&self) -> Result<Node, Error>;

    async fn create_directory(&self, path: &[String], name: &str) -> Result<(), Error>;

    /// Removes the folder `name` and, if present, its `.magnet` sidecar.
    async fn remove_directory(&self, path: &[String], name: &str) -> Result<(), Error>;

    async fn create_file(&self, path: &[String], name: &str) -> Result<(), Error>;
    async fn delete_file(&self, path: &[String], name: &str) -> Result<(), Error>;

    /// Renames `old_name` to `new_name` inside `path`, carrying a `.magnet`
    /// sidecar along when one exists.
    async fn rename(&self, path: &[String], old_name: &str, new_name: &str) -> Result<(), Error>;

    /// Moves each item from `path` into `dest` independently.
    async fn move_items(&self, path: &[String], dest: &[String], items: &[ItemRef]) -> Outcomes;

    /// Copies each item from `path` into `dest` independently.
    async fn copy_items(&self, path: &[String], dest: &[String], items: &[ItemRef]) -> Outcomes;

    async fn upload_file(&self, path: &[String], name: &str, content: &str) -> Result<(), Error>;

    /// Merges an exported node tree into the folder at `dest`.
    async fn import_tree(&self, dest: &[String], tree: &Node) -> Result<(), Error>;

    async fn get_file_content(&self, path: &[String], name: &str) -> Result<String, Error>;
    async fn save_file_content(&self, path: &[String], name: &str, content: &str)
    -> Result<(), Error>;

    /// Advisory existence probe. Never fails: any error reads as `false`.
    async fn has_file(&self, path: &[String], name: &str) -> bool;

    /// Advisory existence probe. Never fails: any error reads as `false`.
    async fn has_folder(&self, path: &[String], name: &str) -> bool;

    /// Note storage, for providers that have it.
    fn notes(&self) -> Option<&dyn Notes> {
        None
    }
}

/// Per-folder markdown notes.
#[async_trait]
pub trait Notes: Send + Sync {
    async fn get_note(&self, path: &[String]) -> Result<Option<String>, Error>;
    async fn save_note(&self, path: &[String], content: &str) -> Result<(), Error>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Home,
    Session,
    Remote,
    Stub,
}

/// An opaque wrapper for one of the concrete [`Provider`]s.
#[repr(transparent)]
pub struct ProviderInstance {
    inner: ProviderInstanceInner,
}

impl ProviderInstance {
    pub fn kind(&self) -> ProviderKind {
        match &self.inner {
            ProviderInstanceInner::HomeProvider(_) => ProviderKind::Home,
            ProviderInstanceInner::SessionStore(_) => ProviderKind::Session,
            ProviderInstanceInner::RemoteProvider(_) => ProviderKind::Remote,
            ProviderInstanceInner::StubProvider(_) => ProviderKind::Stub,
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteProvider> {
        match &self.inner {
            ProviderInstanceInner::RemoteProvider(remote) => Some(remote),
            _ => None,
        }
    }

    /// Whether the notes pane has anything to talk to.
    pub fn has_note_support(&self) -> bool {
        self.notes().is_some()
    }
}

impl From<HomeProvider> for ProviderInstance {
    fn from(home: HomeProvider) -> Self {
        Self {
            inner: ProviderInstanceInner::HomeProvider(home),
        }
    }
}

impl From<SessionStore> for ProviderInstance {
    fn from(session: SessionStore) -> Self {
        Self {
            inner: ProviderInstanceInner::SessionStore(session),
        }
    }
}

impl From<RemoteProvider> for ProviderInstance {
    fn from(remote: RemoteProvider) -> Self {
        Self {
            inner: ProviderInstanceInner::RemoteProvider(remote),
        }
    }
}

impl From<StubProvider> for ProviderInstance {
    fn from(stub: StubProvider) -> Self {
        Self {
            inner: ProviderInstanceInner::StubProvider(stub),
        }
    }
}

impl Deref for ProviderInstance {
    type Target = dyn Provider;

    fn deref(&self) -> &Self::Target {
        self.inner.deref()
    }
}

impl std::fmt::Debug for ProviderInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ProviderInstance").field(&self.kind()).finish()
    }
}

trait_enum! {
    enum ProviderInstanceInner: Provider {
            HomeProvider,
            SessionStore,
            RemoteProvider,
            StubProvider
        }
}
