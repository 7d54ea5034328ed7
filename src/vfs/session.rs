//! The in-process session store backing the local root.

use std::{collections::BTreeMap, sync::Arc, time::SystemTime};

use ahash::HashMap;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{Level, event};

use super::{
    Error,
    ItemRef,
    Node,
    NodeKind,
    Notes,
    Outcomes,
    Provider,
    VfsPath,
    magnet_sidecar,
    pair_magnets,
    validate_name,
};

/// Reserved note key under which the Home view's note is kept.
pub const HOME_NOTE_KEY: &str = "__HOME_NOTE__";

#[derive(Debug, Clone)]
enum Entry {
    Folder {
        children: BTreeMap<String, Entry>,
        modified: SystemTime,
    },
    File {
        content: String,
        modified: SystemTime,
    },
}

impl Entry {
    fn folder() -> Self {
        Entry::Folder {
            children: BTreeMap::new(),
            modified: SystemTime::now(),
        }
    }

    fn file(content: impl Into<String>) -> Self {
        Entry::File {
            content: content.into(),
            modified: SystemTime::now(),
        }
    }

    fn kind(&self) -> NodeKind {
        match self {
            Entry::Folder { .. } => NodeKind::Folder,
            Entry::File { .. } => NodeKind::File,
        }
    }

    /// The children of the folder at `path` below this entry.
    fn folder_at(&self, path: &[String]) -> Option<&BTreeMap<String, Entry>> {
        let mut entry = self;
        for segment in path {
            entry = match entry {
                Entry::Folder { children, .. } => children.get(segment)?,
                Entry::File { .. } => return None,
            };
        }

        match entry {
            Entry::Folder { children, .. } => Some(children),
            Entry::File { .. } => None,
        }
    }

    fn folder_at_mut(
        &mut self,
        path: &[String],
    ) -> Option<(&mut BTreeMap<String, Entry>, &mut SystemTime)> {
        let mut entry = self;
        for segment in path {
            entry = match entry {
                Entry::Folder { children, .. } => children.get_mut(segment)?,
                Entry::File { .. } => return None,
            };
        }

        match entry {
            Entry::Folder { children, modified } => Some((children, modified)),
            Entry::File { .. } => None,
        }
    }

    fn to_node(&self, name: &str) -> Node {
        match self {
            Entry::Folder { modified, .. } => {
                let mut node = Node::folder(name).unloaded();
                node.modified = Some(*modified);
                node
            }
            Entry::File { modified, .. } => {
                let mut node = Node::file(name);
                node.modified = Some(*modified);
                node
            }
        }
    }

    fn from_node(node: &Node) -> Self {
        match node.kind {
            NodeKind::File => Entry::file(node.content.clone().unwrap_or_default()),
            NodeKind::Folder => {
                let children = node
                    .children
                    .iter()
                    .flatten()
                    .filter(|child| validate_name(&child.name).is_ok())
                    .map(|child| (child.name.clone(), Entry::from_node(child)))
                    .collect();

                Entry::Folder {
                    children,
                    modified: SystemTime::now(),
                }
            }
        }
    }

    /// Merges `other` into `self`. Folders merge recursively, anything else
    /// is overwritten.
    fn merge(&mut self, other: Entry) {
        match (self, other) {
            (
                Entry::Folder { children, modified },
                Entry::Folder {
                    children: incoming, ..
                },
            ) => {
                for (name, entry) in incoming {
                    match children.get_mut(&name) {
                        Some(existing) => existing.merge(entry),
                        None => {
                            children.insert(name, entry);
                        }
                    }
                }
                *modified = SystemTime::now();
            }
            (this, other) => *this = other,
        }
    }
}

#[derive(Debug)]
struct State {
    root: Entry,
    notes: HashMap<String, String>,
}

/// An in-memory tree that lives as long as the process.
///
/// Cloning is cheap and every clone sees the same tree.
#[derive(Debug, Clone)]
pub struct SessionStore {
    name: String,
    state: Arc<RwLock<State>>,
}

impl SessionStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(RwLock::new(State {
                root: Entry::folder(),
                notes: HashMap::default(),
            })),
        }
    }

    /// The session's root segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn full_path(&self, path: &[String]) -> VfsPath {
        std::iter::once(self.name.as_str())
            .chain(path.iter().map(String::as_str))
            .collect()
    }

    fn note_key(path: &[String]) -> String {
        format!("/{}", path.join("/"))
    }

    /// Runs `f` against the children of the folder at `path`.
    fn with_folder<T>(
        &self,
        path: &[String],
        f: impl FnOnce(&BTreeMap<String, Entry>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let state = self.state.read();
        let children = state
            .root
            .folder_at(path)
            .ok_or_else(|| Error::NotFound(self.full_path(path)))?;

        f(children)
    }

    /// Runs `f` against the children of the folder at `path`, mutably.
    fn with_folder_mut<T>(
        &self,
        path: &[String],
        f: impl FnOnce(&mut BTreeMap<String, Entry>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut state = self.state.write();
        let (children, modified) = state
            .root
            .folder_at_mut(path)
            .ok_or_else(|| Error::NotFound(self.full_path(path)))?;

        let result = f(children)?;
        *modified = SystemTime::now();
        Ok(result)
    }

    /// The raw one-level listing, sidecars included.
    pub(crate) fn entries(&self, path: &[String]) -> Result<Vec<Node>, Error> {
        self.with_folder(path, |children| {
            Ok(children
                .iter()
                .map(|(name, entry)| entry.to_node(name))
                .collect())
        })
    }

    fn put(&self, path: &[String], name: &str, entry: Entry) -> Result<(), Error> {
        validate_name(name)?;

        self.with_folder_mut(path, |children| {
            if children.contains_key(name) {
                return Err(Error::AlreadyExists(self.full_path(path).child(name)));
            }
            children.insert(name.to_string(), entry);
            Ok(())
        })
    }

    fn get(&self, path: &[String], name: &str) -> Result<Entry, Error> {
        self.with_folder(path, |children| {
            children
                .get(name)
                .cloned()
                .ok_or_else(|| Error::NotFound(self.full_path(path).child(name)))
        })
    }

    /// Moves one item, and a folder's sidecar with it, under a single lock.
    /// Every check runs before anything is detached.
    fn move_one(&self, path: &[String], dest: &[String], item: &ItemRef) -> Result<(), Error> {
        let mut inner = path.to_vec();
        inner.push(item.name.clone());
        if dest.starts_with(&inner) {
            return Err(Error::MoveIntoSelf(self.full_path(&inner)));
        }

        let sidecar = magnet_sidecar(&item.name);
        let mut state = self.state.write();

        let source = state
            .root
            .folder_at(path)
            .ok_or_else(|| Error::NotFound(self.full_path(path)))?;
        let carry = match source.get(&item.name) {
            Some(entry) => {
                entry.kind() == NodeKind::Folder
                    && source.get(&sidecar).is_some_and(|marker| marker.kind() == NodeKind::File)
            }
            None => return Err(Error::NotFound(self.full_path(path).child(&item.name))),
        };

        let target = state
            .root
            .folder_at(dest)
            .ok_or_else(|| Error::NotFound(self.full_path(dest)))?;
        let moving = std::iter::once(&item.name).chain(carry.then_some(&sidecar));
        for name in moving.clone() {
            if target.contains_key(name) {
                return Err(Error::AlreadyExists(self.full_path(dest).child(name)));
            }
        }

        let (children, modified) = state
            .root
            .folder_at_mut(path)
            .ok_or_else(|| Error::NotFound(self.full_path(path)))?;
        let detached: Vec<(String, Entry)> = moving
            .filter_map(|name| children.remove_entry(name))
            .collect();
        *modified = SystemTime::now();

        let (children, modified) = state
            .root
            .folder_at_mut(dest)
            .ok_or_else(|| Error::NotFound(self.full_path(dest)))?;
        children.extend(detached);
        *modified = SystemTime::now();

        Ok(())
    }

    fn copy_one(&self, path: &[String], dest: &[String], item: &ItemRef) -> Result<(), Error> {
        let entry = self.get(path, &item.name)?;
        self.put(dest, &item.name, entry)?;

        let sidecar = magnet_sidecar(&item.name);
        if item.kind == NodeKind::Folder && self.has(path, &sidecar, NodeKind::File) {
            let marker = self.get(path, &sidecar)?;
            self.put(dest, &sidecar, marker)?;
        }

        Ok(())
    }

    /// Removes exactly one entry of the given kind, leaving any sidecar.
    pub(crate) fn remove_entry(&self, path: &[String], name: &str, kind: NodeKind) -> Result<(), Error> {
        self.with_folder_mut(path, |children| match children.get(name) {
            Some(entry) if entry.kind() == kind => {
                children.remove(name);
                Ok(())
            }
            _ => Err(Error::NotFound(self.full_path(path).child(name))),
        })
    }

    /// Renames exactly one entry, leaving any sidecar.
    pub(crate) fn rename_entry(&self, path: &[String], old_name: &str, new_name: &str) -> Result<(), Error> {
        validate_name(new_name)?;

        self.with_folder_mut(path, |children| {
            if children.contains_key(new_name) {
                return Err(Error::AlreadyExists(self.full_path(path).child(new_name)));
            }
            let entry = children
                .remove(old_name)
                .ok_or_else(|| Error::NotFound(self.full_path(path).child(old_name)))?;
            children.insert(new_name.to_string(), entry);
            Ok(())
        })
    }

    fn has(&self, path: &[String], name: &str, kind: NodeKind) -> bool {
        self.with_folder(path, |children| {
            Ok(children.get(name).is_some_and(|entry| entry.kind() == kind))
        })
        .unwrap_or(false)
    }

    pub(crate) fn home_note(&self) -> Option<String> {
        self.state.read().notes.get(HOME_NOTE_KEY).cloned()
    }

    pub(crate) fn save_home_note(&self, content: &str) {
        self.state
            .write()
            .notes
            .insert(HOME_NOTE_KEY.to_string(), content.to_string());
    }
}

#[async_trait]
impl Provider for SessionStore {
    async fn get_contents(&self, path: &[String]) -> Result<Vec<Node>, Error> {
        Ok(pair_magnets(self.entries(path)?))
    }

    async fn get_folder_tree(&self) -> Result<Node, Error> {
        let children = self.get_contents(&[]).await?;

        Ok(Node::folder(self.name.clone()).with_children(children))
    }

    async fn create_directory(&self, path: &[String], name: &str) -> Result<(), Error> {
        self.put(path, name, Entry::folder())
    }

    async fn remove_directory(&self, path: &[String], name: &str) -> Result<(), Error> {
        self.remove_entry(path, name, NodeKind::Folder)?;

        let sidecar = magnet_sidecar(name);
        if self.has(path, &sidecar, NodeKind::File) {
            self.remove_entry(path, &sidecar, NodeKind::File)?;
        }

        Ok(())
    }

    async fn create_file(&self, path: &[String], name: &str) -> Result<(), Error> {
        self.put(path, name, Entry::file(""))
    }

    async fn delete_file(&self, path: &[String], name: &str) -> Result<(), Error> {
        self.remove_entry(path, name, NodeKind::File)
    }

    async fn rename(&self, path: &[String], old_name: &str, new_name: &str) -> Result<(), Error> {
        validate_name(new_name)?;
        if old_name == new_name {
            return Ok(());
        }

        let (old_sidecar, new_sidecar) = (magnet_sidecar(old_name), magnet_sidecar(new_name));

        self.with_folder_mut(path, |children| {
            let carry = match children.get(old_name) {
                Some(entry) => {
                    entry.kind() == NodeKind::Folder
                        && children
                            .get(&old_sidecar)
                            .is_some_and(|marker| marker.kind() == NodeKind::File)
                }
                None => return Err(Error::NotFound(self.full_path(path).child(old_name))),
            };

            let mut targets = std::iter::once(new_name).chain(carry.then_some(new_sidecar.as_str()));
            if let Some(taken) = targets.find(|name| children.contains_key(*name)) {
                return Err(Error::AlreadyExists(self.full_path(path).child(taken)));
            }

            if let Some(entry) = children.remove(old_name) {
                children.insert(new_name.to_string(), entry);
            }
            if let Some(marker) = carry.then(|| children.remove(&old_sidecar)).flatten() {
                event!(Level::DEBUG, %old_sidecar, "renaming magnet sidecar");
                children.insert(new_sidecar.clone(), marker);
            }

            Ok(())
        })
    }

    async fn move_items(&self, path: &[String], dest: &[String], items: &[ItemRef]) -> Outcomes {
        items
            .iter()
            .map(|item| self.move_one(path, dest, item))
            .collect()
    }

    async fn copy_items(&self, path: &[String], dest: &[String], items: &[ItemRef]) -> Outcomes {
        join_all(
            items
                .iter()
                .map(|item| async move { self.copy_one(path, dest, item) }),
        )
        .await
    }

    async fn upload_file(&self, path: &[String], name: &str, content: &str) -> Result<(), Error> {
        self.save_file_content(path, name, content).await
    }

    async fn import_tree(&self, dest: &[String], tree: &Node) -> Result<(), Error> {
        validate_name(&tree.name)?;
        let incoming = Entry::from_node(tree);

        self.with_folder_mut(dest, |children| {
            match children.get_mut(&tree.name) {
                Some(existing) => existing.merge(incoming),
                None => {
                    children.insert(tree.name.clone(), incoming);
                }
            }
            Ok(())
        })
    }

    async fn get_file_content(&self, path: &[String], name: &str) -> Result<String, Error> {
        match self.get(path, name)? {
            Entry::File { content, .. } => Ok(content),
            Entry::Folder { .. } => Err(Error::NotFound(self.full_path(path).child(name))),
        }
    }

    async fn save_file_content(
        &self,
        path: &[String],
        name: &str,
        content: &str,
    ) -> Result<(), Error> {
        validate_name(name)?;

        self.with_folder_mut(path, |children| match children.get_mut(name) {
            Some(Entry::Folder { .. }) => {
                Err(Error::AlreadyExists(self.full_path(path).child(name)))
            }
            Some(entry) => {
                *entry = Entry::file(content);
                Ok(())
            }
            None => {
                children.insert(name.to_string(), Entry::file(content));
                Ok(())
            }
        })
    }

    async fn has_file(&self, path: &[String], name: &str) -> bool {
        self.has(path, name, NodeKind::File)
    }

    async fn has_folder(&self, path: &[String], name: &str) -> bool {
        self.has(path, name, NodeKind::Folder)
    }

    fn notes(&self) -> Option<&dyn Notes> {
        Some(self)
    }
}

#[async_trait]
impl Notes for SessionStore {
    async fn get_note(&self, path: &[String]) -> Result<Option<String>, Error> {
        Ok(self.state.read().notes.get(&Self::note_key(path)).cloned())
    }

    async fn save_note(&self, path: &[String], content: &str) -> Result<(), Error> {
        self.state
            .write()
            .notes
            .insert(Self::note_key(path), content.to_string());
        Ok(())
    }
}
