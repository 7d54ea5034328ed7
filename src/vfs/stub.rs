use async_trait::async_trait;

use super::{Error, ItemRef, Node, Outcomes, Provider};

/// Stands in for a profile that is configured but not mounted.
///
/// Reads come back empty and every mutation fails with
/// [`Error::Unsupported`].
#[derive(Debug, Clone)]
pub struct StubProvider {
    name: String,
}

impl StubProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

const READ_ONLY: Error = Error::Unsupported("profile is not mounted");

#[async_trait]
impl Provider for StubProvider {
    async fn get_contents(&self, _path: &[String]) -> Result<Vec<Node>, Error> {
        Ok(Vec::new())
    }

    async fn get_folder_tree(&self) -> Result<Node, Error> {
        Ok(Node::folder(self.name.clone()))
    }

    async fn create_directory(&self, _path: &[String], _name: &str) -> Result<(), Error> {
        Err(READ_ONLY)
    }

    async fn remove_directory(&self, _path: &[String], _name: &str) -> Result<(), Error> {
        Err(READ_ONLY)
    }

    async fn create_file(&self, _path: &[String], _name: &str) -> Result<(), Error> {
        Err(READ_ONLY)
    }

    async fn delete_file(&self, _path: &[String], _name: &str) -> Result<(), Error> {
        Err(READ_ONLY)
    }

    async fn rename(&self, _path: &[String], _old: &str, _new: &str) -> Result<(), Error> {
        Err(READ_ONLY)
    }

    async fn move_items(&self, _path: &[String], _dest: &[String], items: &[ItemRef]) -> Outcomes {
        items.iter().map(|_| Err(READ_ONLY)).collect()
    }

    async fn copy_items(&self, _path: &[String], _dest: &[String], items: &[ItemRef]) -> Outcomes {
        items.iter().map(|_| Err(READ_ONLY)).collect()
    }

    async fn upload_file(&self, _path: &[String], _name: &str, _content: &str) -> Result<(), Error> {
        Err(READ_ONLY)
    }

    async fn import_tree(&self, _dest: &[String], _tree: &Node) -> Result<(), Error> {
        Err(READ_ONLY)
    }

    async fn get_file_content(&self, _path: &[String], _name: &str) -> Result<String, Error> {
        Err(READ_ONLY)
    }

    async fn save_file_content(
        &self,
        _path: &[String],
        _name: &str,
        _content: &str,
    ) -> Result<(), Error> {
        Err(READ_ONLY)
    }

    async fn has_file(&self, _path: &[String], _name: &str) -> bool {
        false
    }

    async fn has_folder(&self, _path: &[String], _name: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsupported(result: Result<(), Error>) -> bool {
        matches!(result, Err(Error::Unsupported(_)))
    }

    #[tokio::test]
    async fn every_call_is_safe() {
        let stub = StubProvider::new("Server1");
        let here = vec!["a".to_string()];

        assert!(stub.get_contents(&here).await.unwrap().is_empty());
        let root = stub.get_folder_tree().await.unwrap();
        assert_eq!(root.name, "Server1");
        assert!(root.is_folder());

        assert!(!stub.has_file(&here, "x").await);
        assert!(!stub.has_folder(&here, "x").await);

        assert!(unsupported(stub.create_directory(&here, "x").await));
        assert!(unsupported(stub.remove_directory(&here, "x").await));
        assert!(unsupported(stub.create_file(&here, "x").await));
        assert!(unsupported(stub.delete_file(&here, "x").await));
        assert!(unsupported(stub.rename(&here, "x", "y").await));
        assert!(unsupported(stub.upload_file(&here, "x", "").await));
        assert!(unsupported(stub.import_tree(&here, &Node::folder("x")).await));
        assert!(unsupported(stub.save_file_content(&here, "x", "").await));
        assert!(matches!(
            stub.get_file_content(&here, "x").await,
            Err(Error::Unsupported(_))
        ));

        let items = [ItemRef::file("x"), ItemRef::folder("y")];
        let moved = stub.move_items(&here, &[], &items).await;
        let copied = stub.copy_items(&here, &[], &items).await;
        assert_eq!(moved.len(), 2);
        assert!(moved.into_iter().chain(copied).all(unsupported));
        assert!(stub.notes().is_none());
    }
}
