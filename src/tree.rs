//! The cached Home tree.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{Level, event, instrument};

use crate::vfs::{Error, Node, Router, VfsPath};

/// Everything fetched so far, rooted at Home.
///
/// The root is replaced wholesale on every update. Expanding a folder rebuilds
/// only the spine from the root down to it, so every other subtree keeps its
/// [`Arc`] and can be compared by pointer.
#[derive(Debug, Default)]
pub struct TreeCache {
    root: RwLock<Option<Arc<Node>>>,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current root, if the tree has been loaded.
    pub fn root(&self) -> Option<Arc<Node>> {
        self.root.read().clone()
    }

    /// The cached node at `path`, if it has been fetched.
    pub fn node(&self, path: &VfsPath) -> Option<Node> {
        let root = self.root()?;
        root.find(path.segments()).cloned()
    }

    /// Rebuilds the whole tree from the Home provider.
    #[instrument(skip_all, err)]
    pub async fn reload(&self, router: &Router) -> Result<Arc<Node>, Error> {
        let root = Arc::new(router.resolve(&VfsPath::home())?.get_folder_tree().await?);

        *self.root.write() = Some(root.clone());
        event!(Level::DEBUG, "tree reloaded");

        Ok(root)
    }

    /// Fetches one level below `path` and splices it into the cached tree.
    ///
    /// A failed fetch leaves the cache untouched.
    #[instrument(skip(self, router), fields(path = %path), err)]
    pub async fn expand(&self, router: &Router, path: &VfsPath) -> Result<Arc<Node>, Error> {
        if self.root().is_none() {
            self.reload(router).await?;
        }

        if path.is_home() {
            return self.reload(router).await;
        }

        let target = self
            .node(path)
            .ok_or_else(|| Error::NotFound(path.clone()))?;

        if target.is_server_root && target.connected == Some(false) {
            return Err(Error::NotConnected(target.name));
        }
        if !target.is_folder() {
            return Err(Error::NotFound(path.clone()));
        }

        let provider = router.resolve(path)?;
        let children = provider.get_contents(path.relative()).await?;

        // The root may have been replaced while the listing was in flight.
        let mut guard = self.root.write();
        let root = guard
            .as_ref()
            .ok_or_else(|| Error::NotFound(path.clone()))?;

        let updated = replace_at(root, path.segments(), &|node: &Node| {
            let mut node = node.clone();
            node.children = Some(
                children
                    .iter()
                    .cloned()
                    .map(|child| Arc::new(child.unloaded()))
                    .collect(),
            );
            node.children_loaded = true;
            node
        })
        .ok_or_else(|| Error::NotFound(path.clone()))?;

        *guard = Some(updated.clone());
        Ok(updated)
    }
}

/// Rebuilds `node` with the descendant at `segments` replaced by `f` applied
/// to it. Siblings along the way are shared, not copied. Returns [`None`] if
/// no node lives at `segments`.
fn replace_at(node: &Arc<Node>, segments: &[String], f: &dyn Fn(&Node) -> Node) -> Option<Arc<Node>> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(Arc::new(f(node)));
    };

    let children = node.children.as_ref()?;
    let index = children.iter().position(|child| &child.name == first)?;
    let replaced = replace_at(&children[index], rest, f)?;

    let mut children = children.clone();
    children[index] = replaced;

    let mut rebuilt = Node::clone(node);
    rebuilt.children = Some(children);
    Some(Arc::new(rebuilt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        profile::Profile,
        vfs::{Provider, SessionStore},
    };

    async fn setup() -> (Router, TreeCache) {
        let session = SessionStore::new("Local");
        session.create_directory(&[], "docs").await.unwrap();
        session.create_directory(&[], "music").await.unwrap();
        session
            .create_directory(&["docs".to_string()], "deep")
            .await
            .unwrap();
        session
            .create_file(&["docs".to_string()], "readme.md")
            .await
            .unwrap();

        let router = Router::new(
            session,
            vec![Profile::new("1", "Server1", "broker1")],
            None,
        )
        .unwrap();

        (router, TreeCache::new())
    }

    fn path(s: &str) -> VfsPath {
        VfsPath::parse(s)
    }

    #[tokio::test]
    async fn expand_loads_one_level() {
        let (router, cache) = setup().await;

        cache.expand(&router, &path("Local/docs")).await.unwrap();

        let docs = cache.node(&path("Local/docs")).unwrap();
        assert!(docs.children_loaded);
        let names: Vec<_> = docs.children.iter().flatten().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["deep", "readme.md"]);

        let deep = cache.node(&path("Local/docs/deep")).unwrap();
        assert!(!deep.children_loaded);
    }

    #[tokio::test]
    async fn expand_shares_untouched_siblings() {
        let (router, cache) = setup().await;
        let before = cache.reload(&router).await.unwrap();

        let after = cache.expand(&router, &path("Local/docs")).await.unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        let before_music = before.find(&["Local".into()]).unwrap().child("music").unwrap();
        let after_music = after.find(&["Local".into()]).unwrap().child("music").unwrap();
        assert!(Arc::ptr_eq(before_music, after_music));
        assert!(Arc::ptr_eq(
            before.child("Server1").unwrap(),
            after.child("Server1").unwrap()
        ));
    }

    #[tokio::test]
    async fn expanding_twice_yields_equal_trees() {
        let (router, cache) = setup().await;

        let first = cache.expand(&router, &path("Local/docs")).await.unwrap();
        let second = cache.expand(&router, &path("Local/docs")).await.unwrap();

        assert_eq!(*first, *second);
    }

    #[tokio::test]
    async fn disconnected_server_roots_fail_fast() {
        let (router, cache) = setup().await;
        cache.reload(&router).await.unwrap();

        assert!(matches!(
            cache.expand(&router, &path("Server1")).await,
            Err(Error::NotConnected(name)) if name == "Server1"
        ));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_cache_alone() {
        let (router, cache) = setup().await;
        let before = cache.reload(&router).await.unwrap();

        router
            .session()
            .remove_directory(&[], "music")
            .await
            .unwrap();

        assert!(matches!(
            cache.expand(&router, &path("Local/music")).await,
            Err(Error::NotFound(_))
        ));
        assert!(Arc::ptr_eq(&before, &cache.root().unwrap()));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let (router, cache) = setup().await;
        assert!(matches!(
            cache.expand(&router, &path("Local/nope")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn reload_is_idempotent() {
        let (router, cache) = setup().await;

        let first = cache.reload(&router).await.unwrap();
        let second = cache.reload(&router).await.unwrap();
        assert_eq!(first, second);
    }
}
