//! Per-pane navigation state.
//!
//! Every rewrite happens under a single write lock, so a reader sees either
//! all panes before a mutation or all panes after it.

use std::fmt::{Display, Formatter};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{Level, event};

use crate::vfs::VfsPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PaneId(u8);

impl PaneId {
    pub const PRIMARY: PaneId = PaneId(1);
    pub const SECONDARY: PaneId = PaneId(2);
}

impl Display for PaneId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "pane {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaneEntry {
    pub id: PaneId,
    pub path: VfsPath,
}

#[derive(Debug)]
struct PaneState {
    panes: Vec<PaneEntry>,
    active: PaneId,
}

impl PaneState {
    fn rewrite(&mut self, mut f: impl FnMut(&VfsPath) -> Option<VfsPath>) -> usize {
        let mut changed = 0;
        for pane in &mut self.panes {
            if let Some(path) = f(&pane.path) {
                pane.path = path;
                changed += 1;
            }
        }
        changed
    }
}

/// One path per open pane. There is always a primary pane and at most one
/// secondary pane in split view.
#[derive(Debug)]
pub struct PaneRegistry {
    state: RwLock<PaneState>,
}

impl Default for PaneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PaneRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(PaneState {
                panes: vec![PaneEntry {
                    id: PaneId::PRIMARY,
                    path: VfsPath::home(),
                }],
                active: PaneId::PRIMARY,
            }),
        }
    }

    /// Every pane, in id order.
    pub fn snapshot(&self) -> Vec<PaneEntry> {
        self.state.read().panes.clone()
    }

    pub fn path(&self, id: PaneId) -> Option<VfsPath> {
        self.state
            .read()
            .panes
            .iter()
            .find(|pane| pane.id == id)
            .map(|pane| pane.path.clone())
    }

    pub fn active(&self) -> PaneId {
        self.state.read().active
    }

    /// The active pane and its path.
    pub fn active_entry(&self) -> PaneEntry {
        let state = self.state.read();
        state
            .panes
            .iter()
            .find(|pane| pane.id == state.active)
            .cloned()
            .unwrap_or_else(|| state.panes[0].clone())
    }

    /// Returns `false` if no such pane is open.
    pub fn set_active(&self, id: PaneId) -> bool {
        let mut state = self.state.write();
        if state.panes.iter().any(|pane| pane.id == id) {
            state.active = id;
            true
        } else {
            false
        }
    }

    /// Points a pane somewhere else. Returns `false` if no such pane is open.
    pub fn set_path(&self, id: PaneId, path: VfsPath) -> bool {
        let mut state = self.state.write();
        match state.panes.iter_mut().find(|pane| pane.id == id) {
            Some(pane) => {
                pane.path = path;
                true
            }
            None => false,
        }
    }

    pub fn is_split(&self) -> bool {
        self.state.read().panes.len() > 1
    }

    /// Opens the secondary pane on the primary pane's path and focuses it, or
    /// closes it.
    pub fn toggle_split(&self) -> bool {
        let mut state = self.state.write();

        if state.panes.len() > 1 {
            state.panes.retain(|pane| pane.id == PaneId::PRIMARY);
            state.active = PaneId::PRIMARY;
            false
        } else {
            let path = state.panes[0].path.clone();
            state.panes.push(PaneEntry {
                id: PaneId::SECONDARY,
                path,
            });
            state.active = PaneId::SECONDARY;
            true
        }
    }

    /// Moves a pane one level up. Provider roots and Home stay put.
    pub fn go_up(&self, id: PaneId) -> Option<VfsPath> {
        let mut state = self.state.write();
        let pane = state.panes.iter_mut().find(|pane| pane.id == id)?;

        if pane.path.len() > 1 {
            pane.path = pane.path.parent();
        }
        Some(pane.path.clone())
    }

    /// Truncates a pane's path to its first `len` segments (breadcrumb
    /// navigation).
    pub fn truncate(&self, id: PaneId, len: usize) -> Option<VfsPath> {
        let mut state = self.state.write();
        let pane = state.panes.iter_mut().find(|pane| pane.id == id)?;

        if len < pane.path.len() {
            pane.path = pane.path.segments()[..len].iter().collect();
        }
        Some(pane.path.clone())
    }

    /// Splices `new` into every pane at or below `old`.
    pub fn rewrite_after_rename(&self, old: &VfsPath, new: &VfsPath) -> usize {
        if old.is_home() {
            return 0;
        }

        let changed = self
            .state
            .write()
            .rewrite(|path| path.replace_prefix(old, new));

        event!(Level::DEBUG, %old, %new, changed, "rewrote panes after rename");
        changed
    }

    /// Moves every pane at or below `deleted` to its parent.
    pub fn rewrite_after_delete(&self, deleted: &VfsPath) -> usize {
        if deleted.is_home() {
            return 0;
        }

        let parent = deleted.parent();
        let changed = self
            .state
            .write()
            .rewrite(|path| path.starts_with(deleted).then(|| parent.clone()));

        event!(Level::DEBUG, %deleted, changed, "rewrote panes after delete");
        changed
    }

    /// Sends every pane whose root is not in `roots` back to Home.
    pub fn retain_roots(&self, roots: &[&str]) -> usize {
        self.state.write().rewrite(|path| match path.root() {
            Some(root) if !roots.contains(&root) => Some(VfsPath::home()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> VfsPath {
        VfsPath::parse(s)
    }

    fn split(left: &str, right: &str) -> PaneRegistry {
        let panes = PaneRegistry::new();
        panes.toggle_split();
        panes.set_path(PaneId::PRIMARY, path(left));
        panes.set_path(PaneId::SECONDARY, path(right));
        panes
    }

    #[test]
    fn rename_rewrites_every_affected_pane() {
        let panes = split("P/a/b", "P/a/c");
        assert_eq!(panes.rewrite_after_rename(&path("P/a"), &path("P/a2")), 2);

        assert_eq!(panes.path(PaneId::PRIMARY), Some(path("P/a2/b")));
        assert_eq!(panes.path(PaneId::SECONDARY), Some(path("P/a2/c")));
    }

    #[test]
    fn rename_leaves_unrelated_and_lookalike_panes() {
        let panes = split("Q/x", "P/ab");
        assert_eq!(panes.rewrite_after_rename(&path("P/a"), &path("P/a2")), 0);

        assert_eq!(panes.path(PaneId::PRIMARY), Some(path("Q/x")));
        assert_eq!(panes.path(PaneId::SECONDARY), Some(path("P/ab")));
    }

    #[test]
    fn profile_rename_is_a_root_rename() {
        let panes = split("Server1/docs", "Local");
        panes.rewrite_after_rename(&path("Server1"), &path("Srv1"));
        assert_eq!(panes.path(PaneId::PRIMARY), Some(path("Srv1/docs")));
        assert_eq!(panes.path(PaneId::SECONDARY), Some(path("Local")));
    }

    #[test]
    fn delete_lands_on_the_parent() {
        let panes = split("P/a/b/c", "P/a");
        assert_eq!(panes.rewrite_after_delete(&path("P/a/b")), 1);
        assert_eq!(panes.path(PaneId::PRIMARY), Some(path("P/a")));
        assert_eq!(panes.path(PaneId::SECONDARY), Some(path("P/a")));

        assert_eq!(panes.rewrite_after_delete(&VfsPath::home()), 0);
        assert_eq!(panes.path(PaneId::PRIMARY), Some(path("P/a")));
    }

    #[test]
    fn split_is_capped_at_two() {
        let panes = PaneRegistry::new();
        panes.set_path(PaneId::PRIMARY, path("Local/docs"));

        assert!(panes.toggle_split());
        assert_eq!(panes.snapshot().len(), 2);
        assert_eq!(panes.path(PaneId::SECONDARY), Some(path("Local/docs")));
        assert_eq!(panes.active(), PaneId::SECONDARY);

        assert!(!panes.toggle_split());
        assert_eq!(panes.snapshot().len(), 1);
        assert_eq!(panes.active(), PaneId::PRIMARY);
        assert!(!panes.set_active(PaneId::SECONDARY));
    }

    #[test]
    fn go_up_stops_at_the_provider_root() {
        let panes = PaneRegistry::new();
        panes.set_path(PaneId::PRIMARY, path("Local/a"));

        assert_eq!(panes.go_up(PaneId::PRIMARY), Some(path("Local")));
        assert_eq!(panes.go_up(PaneId::PRIMARY), Some(path("Local")));
        assert_eq!(panes.go_up(PaneId::SECONDARY), None);
    }

    #[test]
    fn truncate_navigates_breadcrumbs() {
        let panes = PaneRegistry::new();
        panes.set_path(PaneId::PRIMARY, path("Local/a/b/c"));

        assert_eq!(panes.truncate(PaneId::PRIMARY, 2), Some(path("Local/a")));
        assert_eq!(panes.truncate(PaneId::PRIMARY, 5), Some(path("Local/a")));
        assert_eq!(panes.truncate(PaneId::PRIMARY, 0), Some(VfsPath::home()));
    }

    #[test]
    fn retain_roots_collapses_orphans() {
        let panes = split("Server1/docs", "Local/x");
        assert_eq!(panes.retain_roots(&["Local"]), 1);
        assert!(panes.path(PaneId::PRIMARY).unwrap().is_home());
        assert_eq!(panes.path(PaneId::SECONDARY), Some(path("Local/x")));
    }
}
