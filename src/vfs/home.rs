use async_trait::async_trait;

use super::{Error, ItemRef, Node, Notes, Outcomes, Provider, SessionStore};

/// Name of the synthesized root node.
pub const HOME_NAME: &str = "Home";

/// A known profile as it appears in the Home listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRoot {
    pub id: String,
    pub name: String,
    pub connected: bool,
}

impl ProfileRoot {
    fn node(&self) -> Node {
        let mut node = Node::folder(self.name.clone()).unloaded();
        node.is_server_root = true;
        node.profile_id = Some(self.id.clone());
        node.connected = Some(self.connected);
        node
    }
}

/// The synthetic provider behind the empty path.
///
/// It is a snapshot: the router builds a fresh one on every resolution so the
/// `connected` flags always reflect the mount state at that moment.
#[derive(Debug, Clone)]
pub struct HomeProvider {
    session: SessionStore,
    roots: Vec<ProfileRoot>,
}

const NOT_HERE: Error = Error::Unsupported("the Home view cannot be modified");

impl HomeProvider {
    pub fn new(session: SessionStore, roots: Vec<ProfileRoot>) -> Self {
        Self { session, roots }
    }
}

#[async_trait]
impl Provider for HomeProvider {
    async fn get_contents(&self, path: &[String]) -> Result<Vec<Node>, Error> {
        if !path.is_empty() {
            return Ok(Vec::new());
        }

        let mut children = vec![self.session.get_folder_tree().await?];
        children.extend(self.roots.iter().map(ProfileRoot::node));

        Ok(children)
    }

    async fn get_folder_tree(&self) -> Result<Node, Error> {
        let children = self.get_contents(&[]).await?;

        Ok(Node::folder(HOME_NAME).with_children(children))
    }

    async fn create_directory(&self, _path: &[String], _name: &str) -> Result<(), Error> {
        Err(NOT_HERE)
    }

    async fn remove_directory(&self, _path: &[String], _name: &str) -> Result<(), Error> {
        Err(NOT_HERE)
    }

    async fn create_file(&self, _path: &[String], _name: &str) -> Result<(), Error> {
        Err(NOT_HERE)
    }

    async fn delete_file(&self, _path: &[String], _name: &str) -> Result<(), Error> {
        Err(NOT_HERE)
    }

    async fn rename(&self, _path: &[String], _old: &str, _new: &str) -> Result<(), Error> {
        Err(NOT_HERE)
    }

    async fn move_items(&self, _path: &[String], _dest: &[String], items: &[ItemRef]) -> Outcomes {
        items.iter().map(|_| Err(NOT_HERE)).collect()
    }

    async fn copy_items(&self, _path: &[String], _dest: &[String], items: &[ItemRef]) -> Outcomes {
        items.iter().map(|_| Err(NOT_HERE)).collect()
    }

    async fn upload_file(&self, _path: &[String], _name: &str, _content: &str) -> Result<(), Error> {
        Err(NOT_HERE)
    }

    async fn import_tree(&self, _dest: &[String], _tree: &Node) -> Result<(), Error> {
        Err(NOT_HERE)
    }

    async fn get_file_content(&self, _path: &[String], _name: &str) -> Result<String, Error> {
        Err(NOT_HERE)
    }

    async fn save_file_content(
        &self,
        _path: &[String],
        _name: &str,
        _content: &str,
    ) -> Result<(), Error> {
        Err(NOT_HERE)
    }

    async fn has_file(&self, _path: &[String], _name: &str) -> bool {
        false
    }

    async fn has_folder(&self, path: &[String], name: &str) -> bool {
        path.is_empty()
            && (self.session.name() == name || self.roots.iter().any(|root| root.name == name))
    }

    fn notes(&self) -> Option<&dyn Notes> {
        Some(self)
    }
}

#[async_trait]
impl Notes for HomeProvider {
    async fn get_note(&self, path: &[String]) -> Result<Option<String>, Error> {
        if !path.is_empty() {
            return Ok(None);
        }
        Ok(self.session.home_note())
    }

    async fn save_note(&self, path: &[String], content: &str) -> Result<(), Error> {
        if !path.is_empty() {
            return Err(NOT_HERE);
        }
        self.session.save_home_note(content);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn home() -> HomeProvider {
        HomeProvider::new(
            SessionStore::new("Local"),
            vec![ProfileRoot {
                id: "1".to_string(),
                name: "Server1".to_string(),
                connected: false,
            }],
        )
    }

    #[tokio::test]
    async fn listing_has_session_then_profiles() {
        let tree = home().get_folder_tree().await.unwrap();
        assert_eq!(tree.name, HOME_NAME);

        let children = tree.children.unwrap();
        assert_eq!(children.len(), 2);

        assert_eq!(children[0].name, "Local");
        assert!(children[0].children_loaded);
        assert!(!children[0].is_server_root);

        assert_eq!(children[1].name, "Server1");
        assert!(children[1].is_server_root);
        assert!(!children[1].children_loaded);
        assert_eq!(children[1].connected, Some(false));
        assert_eq!(children[1].profile_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn below_home_is_empty() {
        let nested = vec!["Local".to_string()];
        assert!(home().get_contents(&nested).await.unwrap().is_empty());
        assert!(!home().has_folder(&nested, "Local").await);
    }

    #[tokio::test]
    async fn knows_its_roots() {
        let home = home();
        assert!(home.has_folder(&[], "Local").await);
        assert!(home.has_folder(&[], "Server1").await);
        assert!(!home.has_folder(&[], "Other").await);
        assert!(!home.has_file(&[], "Local").await);
        assert!(matches!(
            home.create_directory(&[], "x").await,
            Err(Error::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn home_note_lives_in_the_session() {
        let session = SessionStore::new("Local");
        let home = HomeProvider::new(session.clone(), Vec::new());

        home.save_note(&[], "welcome").await.unwrap();
        assert_eq!(home.get_note(&[]).await.unwrap().as_deref(), Some("welcome"));
        assert_eq!(session.home_note().as_deref(), Some("welcome"));

        let nested = vec!["x".to_string()];
        assert_eq!(home.get_note(&nested).await.unwrap(), None);
        assert!(home.save_note(&nested, "no").await.is_err());
    }
}
