use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use thiserror_ext::AsReport;
use tracing::{Level, event, instrument};
use url::Url;

use super::{
    Error,
    IntoMalformedResponse,
    IntoTransportError,
    ItemRef,
    Node,
    Notes,
    Outcomes,
    Provider,
    magnet_sidecar,
    pair_magnets,
    validate_name,
};
use crate::{
    profile::Profile,
    transport::{Transport, broker_endpoint},
};

/// Broker service that answers every file operation.
pub const SERVICE_NAME: &str = "restFsService";

/// A server reached through the broker.
///
/// The endpoint and the caller's alias are fixed at construction; a profile
/// rename or a new login builds a fresh provider.
#[derive(derive_more::Debug)]
pub struct RemoteProvider {
    profile: Profile,
    endpoint: Url,
    #[debug(skip)]
    transport: Arc<dyn Transport>,
    alias: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Listing {
    Bare(Vec<RawItem>),
    Files { files: Vec<RawItem> },
    Items { items: Vec<RawItem> },
    Other(Value),
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    modified: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl RawItem {
    fn into_node(self) -> Option<Node> {
        let name = self.name?;
        if let Err(error) = validate_name(&name) {
            event!(Level::WARN, error = %error.as_report(), "skipping listing entry");
            return None;
        }

        let kind = self.kind.unwrap_or_default().to_lowercase();
        let mut node = if kind == "folder" || kind == "directory" {
            Node::folder(name).unloaded()
        } else {
            Node::file(name)
        };

        node.content = self.content;
        node.modified = self
            .modified
            .as_deref()
            .and_then(|modified| humantime_serde::re::humantime::parse_rfc3339_weak(modified).ok());

        Some(node)
    }
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: Option<String>,
}

fn joined(path: &[String], name: &str) -> Vec<String> {
    let mut full = path.to_vec();
    full.push(name.to_string());
    full
}

impl RemoteProvider {
    pub fn new(
        profile: Profile,
        transport: Arc<dyn Transport>,
        alias: Option<String>,
    ) -> Result<Self, Error> {
        let endpoint = broker_endpoint(&profile.broker_url)
            .into_transport_error(format!("resolving broker for {}", profile.name))?;

        Ok(Self {
            profile,
            endpoint,
            transport,
            alias,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    async fn call(&self, operation: &str, args: Value) -> Result<Value, Error> {
        self.transport
            .submit(&self.endpoint, SERVICE_NAME, operation, args)
            .await
            .into_transport_error(format!("{operation} on {}", self.profile.name))
    }

    async fn call_for<T: DeserializeOwned>(&self, operation: &str, args: Value) -> Result<T, Error> {
        let value = self.call(operation, args).await?;

        serde_json::from_value(value).into_malformed_response(format!("{operation} on {}", self.profile.name))
    }

    fn with_alias(&self, mut args: Value) -> Value {
        if let (Some(alias), Some(object)) = (&self.alias, args.as_object_mut()) {
            object.insert("alias".to_string(), Value::String(alias.clone()));
        }
        args
    }

    async fn probe(&self, operation: &str, args: Value) -> bool {
        match self.call_for::<bool>(operation, args).await {
            Ok(exists) => exists,
            Err(error) => {
                event!(Level::WARN, error = %error.as_report(), operation, "existence probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl Provider for RemoteProvider {
    #[instrument(skip(self), fields(profile = %self.profile.name), err)]
    async fn get_contents(&self, path: &[String]) -> Result<Vec<Node>, Error> {
        let listing: Listing = self.call_for("listFiles", json!({ "path": path })).await?;

        let raw = match listing {
            Listing::Bare(items) | Listing::Files { files: items } | Listing::Items { items } => items,
            Listing::Other(Value::Null) => Vec::new(),
            Listing::Other(other) => {
                event!(Level::WARN, response = %other, "unexpected listing response");
                Vec::new()
            }
        };

        Ok(pair_magnets(raw.into_iter().filter_map(RawItem::into_node).collect()))
    }

    async fn get_folder_tree(&self) -> Result<Node, Error> {
        let children = self.get_contents(&[]).await?;

        Ok(Node::folder(self.profile.name.clone()).with_children(children))
    }

    async fn create_directory(&self, path: &[String], name: &str) -> Result<(), Error> {
        validate_name(name)?;
        self.call("createDirectory", json!({ "path": joined(path, name) }))
            .await
            .map(drop)
    }

    async fn remove_directory(&self, path: &[String], name: &str) -> Result<(), Error> {
        self.call("removeDirectory", json!({ "path": joined(path, name) }))
            .await?;

        let sidecar = magnet_sidecar(name);
        if self.has_file(path, &sidecar).await {
            self.delete_file(path, &sidecar).await?;
        }

        Ok(())
    }

    async fn create_file(&self, path: &[String], name: &str) -> Result<(), Error> {
        validate_name(name)?;
        self.call("createFile", json!({ "path": path, "filename": name }))
            .await
            .map(drop)
    }

    async fn delete_file(&self, path: &[String], name: &str) -> Result<(), Error> {
        self.call("deleteFile", json!({ "path": path, "filename": name }))
            .await
            .map(drop)
    }

    async fn rename(&self, path: &[String], old_name: &str, new_name: &str) -> Result<(), Error> {
        validate_name(new_name)?;

        let (old_sidecar, new_sidecar) = (magnet_sidecar(old_name), magnet_sidecar(new_name));
        let carry = self.has_file(path, &old_sidecar).await && self.has_folder(path, old_name).await;
        if carry && self.has_file(path, &new_sidecar).await {
            let taken = std::iter::once(self.profile.name.as_str())
                .chain(path.iter().map(String::as_str))
                .chain([new_sidecar.as_str()]);
            return Err(Error::AlreadyExists(taken.collect()));
        }

        self.call(
            "rename",
            json!({ "fromPath": joined(path, old_name), "toPath": joined(path, new_name) }),
        )
        .await?;

        if carry {
            self.call(
                "rename",
                json!({
                    "fromPath": joined(path, &old_sidecar),
                    "toPath": joined(path, &new_sidecar),
                }),
            )
            .await?;
        }

        Ok(())
    }

    async fn move_items(&self, path: &[String], dest: &[String], items: &[ItemRef]) -> Outcomes {
        join_all(items.iter().map(|item| async move {
            self.call(
                "moveItems",
                json!({ "sourcePath": path, "destPath": dest, "items": [item] }),
            )
            .await
            .map(drop)
        }))
        .await
    }

    async fn copy_items(&self, path: &[String], dest: &[String], items: &[ItemRef]) -> Outcomes {
        join_all(items.iter().map(|item| async move {
            self.call(
                "copy",
                json!({
                    "fromPath": joined(path, &item.name),
                    "toPath": joined(dest, &item.name),
                }),
            )
            .await
            .map(drop)
        }))
        .await
    }

    async fn upload_file(&self, path: &[String], name: &str, content: &str) -> Result<(), Error> {
        self.save_file_content(path, name, content).await
    }

    async fn import_tree(&self, _dest: &[String], _tree: &Node) -> Result<(), Error> {
        Err(Error::Unsupported("import into a remote server"))
    }

    async fn get_file_content(&self, path: &[String], name: &str) -> Result<String, Error> {
        let response: ContentResponse = self
            .call_for("readFile", json!({ "path": path, "filename": name }))
            .await?;

        Ok(response.content.unwrap_or_default())
    }

    async fn save_file_content(
        &self,
        path: &[String],
        name: &str,
        content: &str,
    ) -> Result<(), Error> {
        validate_name(name)?;
        self.call(
            "saveFile",
            json!({ "path": path, "filename": name, "content": content }),
        )
        .await
        .map(drop)
    }

    async fn has_file(&self, path: &[String], name: &str) -> bool {
        self.probe("hasFile", json!({ "path": path, "fileName": name }))
            .await
    }

    async fn has_folder(&self, path: &[String], name: &str) -> bool {
        self.probe("hasFolder", json!({ "path": path, "folderName": name }))
            .await
    }

    fn notes(&self) -> Option<&dyn Notes> {
        Some(self)
    }
}

#[async_trait]
impl Notes for RemoteProvider {
    async fn get_note(&self, path: &[String]) -> Result<Option<String>, Error> {
        let response: Option<ContentResponse> = self
            .call_for("getNote", self.with_alias(json!({ "path": path })))
            .await?;

        Ok(response.and_then(|response| response.content))
    }

    async fn save_note(&self, path: &[String], content: &str) -> Result<(), Error> {
        self.call(
            "saveNote",
            self.with_alias(json!({ "path": path, "content": content })),
        )
        .await
        .map(drop)
    }
}
