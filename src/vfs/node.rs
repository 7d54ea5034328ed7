use std::{
    fmt::{Display, Formatter},
    sync::Arc,
    time::SystemTime,
};

use serde::{Deserialize, Serialize};

use super::Error;

/// Suffix of the sidecar file that marks its same-named sibling folder as a
/// magnet folder.
pub const MAGNET_SUFFIX: &str = ".magnet";

/// Name of the sidecar marker file for the folder `name`.
pub fn magnet_sidecar(name: &str) -> String {
    format!("{name}{MAGNET_SUFFIX}")
}

/// An absolute, root-inclusive path into the virtual tree.
///
/// Segment 0 names the provider that owns the rest of the path. The empty
/// path is the synthesized Home root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VfsPath(Vec<String>);

impl VfsPath {
    pub const SEPARATOR: char = '/';

    /// The Home root.
    pub fn home() -> Self {
        Self(Vec::new())
    }

    /// Builds a path from segments, rejecting empty segments and segments
    /// containing the separator.
    pub fn new<I, S>(segments: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments = segments
            .into_iter()
            .map(Into::into)
            .map(|segment| validate_name(&segment).map(|()| segment))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self(segments))
    }

    /// Parses a `/`-separated path. Leading, trailing and doubled separators
    /// are ignored, so `""` and `"/"` both denote Home.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split(Self::SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_home(&self) -> bool {
        self.0.is_empty()
    }

    /// The root segment, if this is not Home.
    pub fn root(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// The part of the path below the root segment, as seen by the provider.
    pub fn relative(&self) -> &[String] {
        self.0.get(1..).unwrap_or_default()
    }

    /// The last segment, if this is not Home.
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The path one segment shorter. Home is its own parent.
    pub fn parent(&self) -> Self {
        let mut segments = self.0.clone();
        segments.pop();
        Self(segments)
    }

    /// Appends a name returned by a backend.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        debug_assert!(validate_name(&name).is_ok(), "invalid segment {name:?}");

        let mut segments = self.0.clone();
        segments.push(name);
        Self(segments)
    }

    /// Segment-wise prefix test. Every path starts with Home.
    pub fn starts_with(&self, prefix: &VfsPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Splices `new` in place of the `old` prefix, keeping the remaining
    /// segments verbatim. Returns [`None`] if `old` is not a prefix.
    pub fn replace_prefix(&self, old: &VfsPath, new: &VfsPath) -> Option<Self> {
        let suffix = self.0.strip_prefix(old.0.as_slice())?;

        let mut segments = new.0.clone();
        segments.extend_from_slice(suffix);
        Some(Self(segments))
    }
}

impl Display for VfsPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }

        for segment in &self.0 {
            write!(f, "/{segment}")?;
        }

        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for VfsPath {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Rejects names that cannot be a single path segment.
pub fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || name.contains(VfsPath::SEPARATOR) || name == "." || name == ".." {
        Err(Error::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// One entry of the virtual tree.
///
/// Nodes are treated as immutable values once they are in the tree cache:
/// children are shared behind [`Arc`] so that replacing one subtree leaves
/// every untouched sibling pointer-identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: NodeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Arc<Node>>>,

    #[serde(default)]
    pub children_loaded: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub modified: Option<SystemTime>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_server_root: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,

    /// Only meaningful on server-root nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_magnet: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnet_file: Option<String>,
}

impl Node {
    fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: None,
            children_loaded: false,
            content: None,
            modified: None,
            is_server_root: false,
            profile_id: None,
            connected: None,
            is_magnet: false,
            magnet_file: None,
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Folder)
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::File)
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// A folder whose children are materialized and trustworthy.
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = Some(children.into_iter().map(Arc::new).collect());
        self.children_loaded = true;
        self
    }

    /// Marks a folder as awaiting expansion: empty children, not loaded.
    /// Files are returned unchanged.
    pub fn unloaded(mut self) -> Self {
        if self.is_folder() {
            self.children = Some(Vec::new());
            self.children_loaded = false;
        }
        self
    }

    pub fn child(&self, name: &str) -> Option<&Arc<Node>> {
        self.children
            .as_ref()?
            .iter()
            .find(|child| child.name == name)
    }

    /// Walks `segments` down from this node.
    pub fn find(&self, segments: &[String]) -> Option<&Node> {
        let mut node = self;
        for segment in segments {
            node = node.child(segment)?;
        }
        Some(node)
    }

    pub fn item_ref(&self) -> ItemRef {
        ItemRef {
            name: self.name.clone(),
            kind: self.kind,
        }
    }
}

/// A reference to a directory entry by name, as passed to move and copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

impl ItemRef {
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Folder,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
        }
    }
}

/// Drops `.magnet` sidecar files from a one-level listing and marks the
/// folders they belong to.
pub fn pair_magnets(items: Vec<Node>) -> Vec<Node> {
    let sidecars: Vec<String> = items
        .iter()
        .filter(|item| item.name.ends_with(MAGNET_SUFFIX))
        .map(|item| item.name.clone())
        .collect();

    items
        .into_iter()
        .filter(|item| !item.name.ends_with(MAGNET_SUFFIX))
        .map(|mut item| {
            if item.is_folder() {
                let sidecar = magnet_sidecar(&item.name);
                if sidecars.contains(&sidecar) {
                    item.is_magnet = true;
                    item.magnet_file = Some(sidecar);
                }
            }
            item
        })
        .collect()
}
