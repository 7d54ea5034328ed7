//! The UI-facing facade.
//!
//! A [`Workspace`] owns the router, the tree cache, the pane registry and the
//! mount manager, and sequences every mutation the same way: the provider call
//! first, then the pane rewrite, then a full reload of the tree. Nothing is
//! rewritten unless the provider reported success.

use std::sync::Arc;

use futures::{
    FutureExt,
    future::{BoxFuture, join_all},
};
use thiserror_ext::AsReport;
use tracing::{Level, event, instrument};
use url::Url;

use crate::{
    auth::{Authenticator, Identity},
    mount::{ConnectionStatus, MountManager, MountOutcome},
    panes::{PaneEntry, PaneId, PaneRegistry},
    profile::{Profile, ProfileError},
    transport::Transport,
    tree::TreeCache,
    vfs::{
        Error,
        ItemRef,
        Node,
        NodeKind,
        ProviderInstance,
        Router,
        SessionStore,
        VfsPath,
        magnet_sidecar,
    },
};

/// A failed workspace operation: what was attempted, where, and why.
#[derive(Debug, thiserror::Error)]
#[error("{op} failed at {path}")]
pub struct OpError {
    pub op: &'static str,
    pub path: VfsPath,
    #[source]
    pub source: Error,
}

impl OpError {
    fn new(op: &'static str, path: &VfsPath) -> impl FnOnce(Error) -> Self + use<> {
        let path = path.clone();
        move |source| Self { op, path, source }
    }
}

/// The result for one item of a multi-item operation.
#[derive(Debug)]
pub struct ItemOutcome {
    pub item: ItemRef,
    pub result: Result<(), OpError>,
}

/// Per-item outcomes of a multi-item operation plus the reload that followed.
#[derive(Debug)]
pub struct Batch {
    pub outcomes: Vec<ItemOutcome>,
    pub reload: Result<(), OpError>,
}

impl Batch {
    pub fn all_ok(&self) -> bool {
        self.reload.is_ok() && self.outcomes.iter().all(|outcome| outcome.result.is_ok())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &ItemRef> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .map(|outcome| &outcome.item)
    }
}

#[derive(Debug)]
pub struct Workspace {
    router: Arc<Router>,
    tree: TreeCache,
    panes: PaneRegistry,
    mounts: MountManager,
}

impl Workspace {
    pub fn new(
        session: SessionStore,
        profiles: Vec<Profile>,
        default_image_url: Option<Url>,
        transport: Arc<dyn Transport>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, ProfileError> {
        let router = Arc::new(Router::new(session, profiles, default_image_url)?);
        let tree = TreeCache::new();
        let panes = PaneRegistry::new();
        let mounts = MountManager::new(router.clone(), transport, authenticator);

        Ok(Self {
            router,
            tree,
            panes,
            mounts,
        })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn mounts(&self) -> &MountManager {
        &self.mounts
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.mounts.status()
    }

    /// The cached Home tree, if loaded.
    pub fn tree(&self) -> Option<Arc<Node>> {
        self.tree.root()
    }

    pub fn resolve_provider(&self, path: &VfsPath) -> Result<Arc<ProviderInstance>, OpError> {
        self.router
            .resolve(path)
            .map_err(OpError::new("resolve", path))
    }

    pub async fn reload_tree(&self) -> Result<Arc<Node>, OpError> {
        self.tree
            .reload(&self.router)
            .await
            .map_err(OpError::new("reload", &VfsPath::home()))
    }

    pub async fn expand_tree(&self, path: &VfsPath) -> Result<Arc<Node>, OpError> {
        self.tree
            .expand(&self.router, path)
            .await
            .map_err(OpError::new("expand", path))
    }

    async fn reload_after(&self) -> Result<(), OpError> {
        self.reload_tree().await.map(drop)
    }

    fn known_profile(&self, id: &str) -> Result<Profile, OpError> {
        self.router.profile(id).ok_or_else(|| OpError {
            op: "lookup",
            path: VfsPath::home(),
            source: ProfileError::UnknownProfile(id.to_string()).into(),
        })
    }

    pub async fn mount(&self, profile: &Profile, identity: Option<Identity>) -> Result<(), OpError> {
        self.mounts
            .mount(profile, identity)
            .await
            .map_err(OpError::new("mount", &profile.root()))?;
        self.reload_after().await
    }

    pub async fn login_and_mount(
        &self,
        profile: &Profile,
        username: &str,
        password: &str,
    ) -> Result<(), OpError> {
        self.mounts
            .login_and_mount(profile, username, password)
            .await
            .map_err(OpError::new("login", &profile.root()))?;
        self.reload_after().await
    }

    /// Unmounting itself cannot fail; only the reload that follows can.
    pub async fn unmount(&self, id: &str) -> Result<(), OpError> {
        self.mounts.unmount(id);
        self.reload_after().await
    }

    /// Mounts every auto-connect profile and reloads the tree. A failed reload
    /// is logged; the per-profile outcomes are returned either way.
    pub async fn auto_mount(&self) -> Vec<MountOutcome> {
        let outcomes = self.mounts.auto_mount().await;

        if let Err(error) = self.reload_after().await {
            event!(Level::WARN, error = %error.as_report(), "reload after auto-mount failed");
        }

        outcomes
    }

    /// Swaps in a new version of a known profile. A mounted profile gets a
    /// fresh provider; a renamed one drags every pane inside it along.
    ///
    /// The replacement provider is built before anything is committed, so a
    /// failure leaves the profile, its binding and the panes as they were.
    #[instrument(skip_all, fields(profile = %profile.id), err)]
    pub async fn update_profile(&self, profile: Profile) -> Result<(), OpError> {
        let previous = self.known_profile(&profile.id)?;

        let rekey = self
            .mounts
            .prepare_rekey(&previous.name, &profile)
            .map_err(OpError::new("update profile", &profile.root()))?;

        self.router
            .replace_profile(profile.clone())
            .map_err(|error| OpError::new("update profile", &profile.root())(error.into()))?;
        self.mounts.apply_rekeys(rekey.into_iter().collect());

        if previous.name != profile.name {
            self.panes
                .rewrite_after_rename(&previous.root(), &profile.root());
        }
        self.reload_after().await
    }

    pub async fn rename_profile(&self, id: &str, new_name: &str) -> Result<(), OpError> {
        let mut profile = self.known_profile(id)?;
        profile.name = new_name.to_string();
        self.update_profile(profile).await
    }

    /// Replaces the whole profile set. Profiles that disappear are unmounted
    /// and panes inside them go back to Home; profiles that persist under a
    /// new name or URL are handled like [`Self::update_profile`].
    #[instrument(skip_all, err)]
    pub async fn set_profiles(&self, profiles: Vec<Profile>) -> Result<(), OpError> {
        let previous = self.router.profiles();
        let successor = |old: &Profile| profiles.iter().find(|profile| profile.id == old.id);

        let mut rekeys = Vec::new();
        for old in &previous {
            if let Some(new) = successor(old).filter(|new| *new != old) {
                let prepared = self
                    .mounts
                    .prepare_rekey(&old.name, new)
                    .map_err(OpError::new("set profiles", &new.root()))?;
                rekeys.extend(prepared);
            }
        }

        self.router
            .set_profiles(profiles.clone())
            .map_err(|error| OpError::new("set profiles", &VfsPath::home())(error.into()))?;
        self.mounts.apply_rekeys(rekeys);

        for old in &previous {
            match successor(old) {
                None => self.mounts.unmount(&old.id),
                Some(new) if new.name != old.name => {
                    self.panes.rewrite_after_rename(&old.root(), &new.root());
                }
                Some(_) => {}
            }
        }

        let mut roots: Vec<&str> = profiles.iter().map(|profile| profile.name.as_str()).collect();
        roots.push(self.router.session_name());
        self.panes.retain_roots(&roots);

        self.reload_after().await
    }

    pub async fn remove_profile(&self, id: &str) -> Result<(), OpError> {
        self.known_profile(id)?;

        let profiles = self
            .router
            .profiles()
            .into_iter()
            .filter(|profile| profile.id != id)
            .collect();
        self.set_profiles(profiles).await
    }

    /// Renames `old_name` inside `dir`. Panes at or below the old path follow.
    #[instrument(skip(self), fields(dir = %dir), err)]
    pub async fn rename_pane_item(
        &self,
        dir: &VfsPath,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), OpError> {
        let old_path = dir.child(old_name);
        let provider = self.resolve_provider(dir)?;

        provider
            .rename(dir.relative(), old_name, new_name)
            .await
            .map_err(OpError::new("rename", &old_path))?;

        self.panes
            .rewrite_after_rename(&old_path, &dir.child(new_name));
        self.reload_after().await
    }

    /// Deletes each item in `dir` independently. Panes inside a deleted item
    /// land on `dir`.
    #[instrument(skip(self, items), fields(dir = %dir), err)]
    pub async fn delete_pane_items(&self, dir: &VfsPath, items: &[ItemRef]) -> Result<Batch, OpError> {
        let provider = self.resolve_provider(dir)?;

        let results = join_all(items.iter().map(|item| {
            let provider = &provider;
            async move {
                match item.kind {
                    NodeKind::Folder => provider.remove_directory(dir.relative(), &item.name).await,
                    NodeKind::File => provider.delete_file(dir.relative(), &item.name).await,
                }
            }
        }))
        .await;

        let outcomes = Self::outcomes("delete", dir, items, results);

        for item in outcomes.iter().filter(|o| o.result.is_ok()).map(|o| &o.item) {
            self.panes.rewrite_after_delete(&dir.child(item.name.clone()));
        }
        let reload = self.reload_after().await;

        Ok(Batch { outcomes, reload })
    }

    /// Moves each item from `source` to `dest` independently. Within one
    /// provider the provider moves them; across providers each item is copied
    /// and then deleted at the source. Panes inside a moved item follow it.
    #[instrument(skip(self, items), fields(source = %source, dest = %dest), err)]
    pub async fn move_pane_items(
        &self,
        source: &VfsPath,
        dest: &VfsPath,
        items: &[ItemRef],
    ) -> Result<Batch, OpError> {
        let from = self.resolve_provider(source)?;
        let to = self.resolve_provider(dest)?;

        let results = if source.root() == dest.root() {
            from.move_items(source.relative(), dest.relative(), items)
                .await
        } else {
            join_all(items.iter().map(|item| {
                let (from, to) = (&from, &to);
                async move {
                    transfer(from, source.relative(), to, dest.relative(), item).await?;
                    match item.kind {
                        NodeKind::Folder => from.remove_directory(source.relative(), &item.name).await,
                        NodeKind::File => from.delete_file(source.relative(), &item.name).await,
                    }
                }
            }))
            .await
        };

        let outcomes = Self::outcomes("move", source, items, results);

        for item in outcomes.iter().filter(|o| o.result.is_ok()).map(|o| &o.item) {
            self.panes.rewrite_after_rename(
                &source.child(item.name.clone()),
                &dest.child(item.name.clone()),
            );
        }
        let reload = self.reload_after().await;

        Ok(Batch { outcomes, reload })
    }

    /// Copies each item from `source` to `dest` independently.
    #[instrument(skip(self, items), fields(source = %source, dest = %dest), err)]
    pub async fn copy_pane_items(
        &self,
        source: &VfsPath,
        dest: &VfsPath,
        items: &[ItemRef],
    ) -> Result<Batch, OpError> {
        let from = self.resolve_provider(source)?;
        let to = self.resolve_provider(dest)?;

        let results = if source.root() == dest.root() {
            from.copy_items(source.relative(), dest.relative(), items)
                .await
        } else {
            join_all(
                items
                    .iter()
                    .map(|item| transfer(&from, source.relative(), &to, dest.relative(), item)),
            )
            .await
        };

        let outcomes = Self::outcomes("copy", source, items, results);
        let reload = self.reload_after().await;

        Ok(Batch { outcomes, reload })
    }

    fn outcomes(
        op: &'static str,
        dir: &VfsPath,
        items: &[ItemRef],
        results: Vec<Result<(), Error>>,
    ) -> Vec<ItemOutcome> {
        items
            .iter()
            .zip(results)
            .map(|(item, result)| ItemOutcome {
                item: item.clone(),
                result: result.map_err(OpError::new(op, &dir.child(item.name.clone()))),
            })
            .collect()
    }

    pub async fn create_folder(&self, dir: &VfsPath, name: &str) -> Result<(), OpError> {
        self.resolve_provider(dir)?
            .create_directory(dir.relative(), name)
            .await
            .map_err(OpError::new("create folder", dir))?;
        self.reload_after().await
    }

    pub async fn create_file(&self, dir: &VfsPath, name: &str) -> Result<(), OpError> {
        self.resolve_provider(dir)?
            .create_file(dir.relative(), name)
            .await
            .map_err(OpError::new("create file", dir))?;
        self.reload_after().await
    }

    pub async fn upload_file(&self, dir: &VfsPath, name: &str, content: &str) -> Result<(), OpError> {
        self.resolve_provider(dir)?
            .upload_file(dir.relative(), name, content)
            .await
            .map_err(OpError::new("upload", dir))?;
        self.reload_after().await
    }

    /// Merges an exported tree into the folder at `dest`.
    pub async fn import_tree(&self, dest: &VfsPath, tree: &Node) -> Result<(), OpError> {
        self.resolve_provider(dest)?
            .import_tree(dest.relative(), tree)
            .await
            .map_err(OpError::new("import", dest))?;
        self.reload_after().await
    }

    /// Reads the whole folder at `path`, file contents and magnet sidecars
    /// included, into a tree that [`Self::import_tree`] accepts.
    pub async fn export_tree(&self, path: &VfsPath) -> Result<Node, OpError> {
        let name = path
            .name()
            .ok_or_else(|| OpError::new("export", path)(Error::Unsupported("exporting Home")))?;

        let provider = self.resolve_provider(path)?;
        export_folder(&provider, path.relative().to_vec(), name.to_string())
            .await
            .map_err(OpError::new("export", path))
    }

    pub async fn read_file(&self, dir: &VfsPath, name: &str) -> Result<String, OpError> {
        self.resolve_provider(dir)?
            .get_file_content(dir.relative(), name)
            .await
            .map_err(OpError::new("read", &dir.child(name)))
    }

    pub async fn write_file(&self, dir: &VfsPath, name: &str, content: &str) -> Result<(), OpError> {
        self.resolve_provider(dir)?
            .save_file_content(dir.relative(), name, content)
            .await
            .map_err(OpError::new("write", &dir.child(name)))?;
        self.reload_after().await
    }

    pub fn has_note_support(&self, path: &VfsPath) -> Result<bool, OpError> {
        Ok(self.resolve_provider(path)?.has_note_support())
    }

    pub async fn note(&self, path: &VfsPath) -> Result<Option<String>, OpError> {
        let provider = self.resolve_provider(path)?;
        let notes = provider
            .notes()
            .ok_or_else(|| OpError::new("read note", path)(Error::Unsupported("notes")))?;

        notes
            .get_note(path.relative())
            .await
            .map_err(OpError::new("read note", path))
    }

    pub async fn save_note(&self, path: &VfsPath, content: &str) -> Result<(), OpError> {
        let provider = self.resolve_provider(path)?;
        let notes = provider
            .notes()
            .ok_or_else(|| OpError::new("save note", path)(Error::Unsupported("notes")))?;

        notes
            .save_note(path.relative(), content)
            .await
            .map_err(OpError::new("save note", path))
    }

    /// The icon for `node`, a child of `dir`.
    pub fn icon_url(&self, dir: &VfsPath, node: &Node, custom: Option<&str>) -> Option<Url> {
        self.router.icons_for(dir).icon_url(node, custom)
    }

    pub fn panes(&self) -> Vec<PaneEntry> {
        self.panes.snapshot()
    }

    pub fn active_pane(&self) -> PaneEntry {
        self.panes.active_entry()
    }

    pub fn set_active_pane(&self, id: PaneId) -> bool {
        self.panes.set_active(id)
    }

    pub fn toggle_split(&self) -> bool {
        self.panes.toggle_split()
    }

    /// Points a pane at `path`, which must resolve. Returns `false` if no
    /// such pane is open.
    pub fn set_pane_path(&self, id: PaneId, path: VfsPath) -> Result<bool, OpError> {
        self.resolve_provider(&path)?;
        Ok(self.panes.set_path(id, path))
    }

    pub fn go_up(&self, id: PaneId) -> Option<VfsPath> {
        self.panes.go_up(id)
    }

    /// Breadcrumb navigation: keeps segments up to and including `index`.
    pub fn navigate_to_segment(&self, id: PaneId, index: usize) -> Option<VfsPath> {
        self.panes.truncate(id, index + 1)
    }
}

fn joined(path: &[String], name: &str) -> Vec<String> {
    let mut full = path.to_vec();
    full.push(name.to_string());
    full
}

/// Copies one item between two providers through the generic capability set.
fn transfer<'a>(
    from: &'a ProviderInstance,
    from_dir: &'a [String],
    to: &'a ProviderInstance,
    to_dir: &'a [String],
    item: &'a ItemRef,
) -> BoxFuture<'a, Result<(), Error>> {
    async move {
        match item.kind {
            NodeKind::File => {
                let content = from.get_file_content(from_dir, &item.name).await?;
                to.save_file_content(to_dir, &item.name, &content).await
            }
            NodeKind::Folder => {
                to.create_directory(to_dir, &item.name).await?;

                let inner_from = joined(from_dir, &item.name);
                let inner_to = joined(to_dir, &item.name);
                for child in from.get_contents(&inner_from).await? {
                    transfer(from, &inner_from, to, &inner_to, &child.item_ref()).await?;
                }

                let sidecar = magnet_sidecar(&item.name);
                if from.has_file(from_dir, &sidecar).await {
                    transfer(from, from_dir, to, to_dir, &ItemRef::file(sidecar)).await?;
                }

                Ok(())
            }
        }
    }
    .boxed()
}

fn export_folder(
    provider: &ProviderInstance,
    path: Vec<String>,
    name: String,
) -> BoxFuture<'_, Result<Node, Error>> {
    async move {
        let mut children = Vec::new();

        for child in provider.get_contents(&path).await? {
            if child.is_folder() {
                let mut exported = export_folder(provider, joined(&path, &child.name), child.name.clone()).await?;
                exported.modified = child.modified;
                children.push(exported);

                if let Some(sidecar) = child.magnet_file {
                    let mut marker = Node::file(sidecar.clone());
                    marker.content = Some(provider.get_file_content(&path, &sidecar).await?);
                    children.push(marker);
                }
            } else {
                let mut file = child;
                file.content = Some(provider.get_file_content(&path, &file.name).await?);
                children.push(file);
            }
        }

        Ok(Node::folder(name).with_children(children))
    }
    .boxed()
}
