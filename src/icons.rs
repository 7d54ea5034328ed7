//! Folder icon URLs.

use url::Url;

use crate::vfs::{MAGNET_SUFFIX, Node};

/// Maps folders to icon URLs under one image base URL.
///
/// One resolver is bound per mounted profile and rebuilt whenever the profile
/// is renamed, alongside its provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconResolver {
    base: Option<Url>,
}

impl IconResolver {
    pub fn new(base: Option<Url>) -> Self {
        Self { base }
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// The icon for `node`, or [`None`] for files and when no image URL is
    /// configured. `custom` overrides the name the icon is looked up by.
    pub fn icon_url(&self, node: &Node, custom: Option<&str>) -> Option<Url> {
        if !node.is_folder() {
            return None;
        }

        let mut url = self.base.clone()?;

        let name: &str = match (custom, &node.magnet_file) {
            (Some(custom), _) if !custom.is_empty() => custom,
            (_, Some(magnet_file)) if node.is_magnet => magnet_file
                .strip_suffix(MAGNET_SUFFIX)
                .unwrap_or(magnet_file),
            _ => node.name.as_str(),
        };

        let name = if name.to_lowercase().ends_with(".js") {
            name.replace('.', "")
        } else {
            name.to_string()
        };
        let name = name.replace(' ', "-").to_lowercase();

        url.path_segments_mut().ok()?.pop_if_empty().push(&name);
        Some(url)
    }
}
