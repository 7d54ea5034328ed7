//! In-process broker used by the tests.

use ahash::{HashMap, HashSet};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use url::Url;

use crate::{
    auth::AUTH_SERVICE,
    transport::{Transport, TransportError, broker_endpoint},
    vfs::{Error, ItemRef, NodeKind, Notes, Provider, SERVICE_NAME, SessionStore},
};

#[derive(Debug, Clone)]
pub struct Call {
    pub endpoint: String,
    pub operation: String,
    pub args: Value,
}

#[derive(Debug, Default)]
struct State {
    stores: HashMap<String, SessionStore>,
    failing: HashSet<String>,
    canned: HashMap<(String, String), Value>,
    calls: Vec<Call>,
}

/// Answers `restFsService` calls from a [`SessionStore`] per broker and
/// `authService.login` for any password equal to `"secret"`.
#[derive(Debug, Default)]
pub struct FakeBroker {
    state: Mutex<State>,
}

fn key(base: &str) -> String {
    broker_endpoint(base).unwrap().to_string()
}

fn strings(args: &Value, field: &str) -> Vec<String> {
    serde_json::from_value(args[field].clone()).unwrap_or_default()
}

fn string(args: &Value, field: &str) -> String {
    args[field].as_str().unwrap_or_default().to_string()
}

fn split_last(mut path: Vec<String>) -> (Vec<String>, String) {
    let name = path.pop().unwrap_or_default();
    (path, name)
}

fn status(operation: &str, error: &Error) -> TransportError {
    let status = match error {
        Error::NotFound(_) => 404,
        Error::AlreadyExists(_) => 409,
        _ => 400,
    };

    TransportError::Status {
        status,
        operation: operation.to_string(),
        body: error.to_string(),
    }
}

impl FakeBroker {
    /// Starts serving a fresh store behind `base` and returns it.
    pub fn serve(&self, base: &str) -> SessionStore {
        let store = SessionStore::new("remote");
        self.state.lock().stores.insert(key(base), store.clone());
        store
    }

    /// Makes every call to `base` fail with a 503 while `failing` is set.
    pub fn fail(&self, base: &str, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing.insert(key(base));
        } else {
            state.failing.remove(&key(base));
        }
    }

    /// Answers `operation` on `base` with `response` from now on.
    pub fn respond_with(&self, base: &str, operation: &str, response: Value) {
        self.state
            .lock()
            .canned
            .insert((key(base), operation.to_string()), response);
    }

    pub fn calls(&self, base: &str) -> Vec<Call> {
        let endpoint = key(base);
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .cloned()
            .collect()
    }

    pub fn count(&self, base: &str, operation: &str) -> usize {
        self.calls(base)
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn last_args(&self, base: &str, operation: &str) -> Option<Value> {
        self.calls(base)
            .into_iter()
            .rev()
            .find(|call| call.operation == operation)
            .map(|call| call.args)
    }

    async fn file_op(store: &SessionStore, operation: &str, args: &Value) -> Result<Value, Error> {
        let path = strings(args, "path");

        match operation {
            "listFiles" => {
                let files: Vec<Value> = store
                    .entries(&path)?
                    .into_iter()
                    .map(|node| {
                        json!({
                            "name": node.name,
                            "type": if node.is_folder() { "Directory" } else { "File" },
                            "modified": node.modified
                                .map(|m| humantime_serde::re::humantime::format_rfc3339(m).to_string()),
                        })
                    })
                    .collect();
                Ok(json!({ "files": files }))
            }
            "readFile" => {
                let content = store.get_file_content(&path, &string(args, "filename")).await?;
                Ok(json!({ "content": content }))
            }
            "saveFile" => {
                let (filename, content) = (string(args, "filename"), string(args, "content"));
                store.save_file_content(&path, &filename, &content).await?;
                Ok(Value::Null)
            }
            "createDirectory" => {
                let (parent, name) = split_last(path);
                store.create_directory(&parent, &name).await?;
                Ok(Value::Null)
            }
            "removeDirectory" => {
                let (parent, name) = split_last(path);
                store.remove_entry(&parent, &name, NodeKind::Folder)?;
                Ok(Value::Null)
            }
            "createFile" => {
                store.create_file(&path, &string(args, "filename")).await?;
                Ok(Value::Null)
            }
            "deleteFile" => {
                store.delete_file(&path, &string(args, "filename")).await?;
                Ok(Value::Null)
            }
            "rename" => {
                let (parent, old_name) = split_last(strings(args, "fromPath"));
                let (_, new_name) = split_last(strings(args, "toPath"));
                store.rename_entry(&parent, &old_name, &new_name)?;
                Ok(Value::Null)
            }
            "hasFile" => Ok(json!(store.has_file(&path, &string(args, "fileName")).await)),
            "hasFolder" => Ok(json!(store.has_folder(&path, &string(args, "folderName")).await)),
            "moveItems" => {
                let items: Vec<ItemRef> =
                    serde_json::from_value(args["items"].clone()).unwrap_or_default();
                let (source, dest) = (strings(args, "sourcePath"), strings(args, "destPath"));
                for outcome in store.move_items(&source, &dest, &items).await {
                    outcome?;
                }
                Ok(Value::Null)
            }
            "copy" => {
                let (source, name) = split_last(strings(args, "fromPath"));
                let (dest, _) = split_last(strings(args, "toPath"));
                let item = if store.has_folder(&source, &name).await {
                    ItemRef::folder(name)
                } else {
                    ItemRef::file(name)
                };
                for outcome in store.copy_items(&source, &dest, &[item]).await {
                    outcome?;
                }
                Ok(Value::Null)
            }
            "getNote" => Ok(json!({ "content": store.get_note(&path).await? })),
            "saveNote" => {
                store.save_note(&path, &string(args, "content")).await?;
                Ok(Value::Null)
            }
            _ => Err(Error::Unsupported("unknown operation")),
        }
    }
}

#[async_trait]
impl Transport for FakeBroker {
    async fn submit(
        &self,
        endpoint: &Url,
        service: &str,
        operation: &str,
        args: Value,
    ) -> Result<Value, TransportError> {
        let endpoint = endpoint.to_string();

        let (store, canned) = {
            let mut state = self.state.lock();
            state.calls.push(Call {
                endpoint: endpoint.clone(),
                operation: operation.to_string(),
                args: args.clone(),
            });

            if state.failing.contains(&endpoint) {
                return Err(TransportError::Status {
                    status: 503,
                    operation: operation.to_string(),
                    body: "unavailable".to_string(),
                });
            }

            (
                state.stores.get(&endpoint).cloned(),
                state
                    .canned
                    .get(&(endpoint.clone(), operation.to_string()))
                    .cloned(),
            )
        };

        if let Some(canned) = canned {
            return Ok(canned);
        }

        if service == AUTH_SERVICE && operation == "login" {
            let username = string(&args, "username");
            return if args["password"] == "secret" {
                Ok(json!({ "username": username, "alias": format!("{username}-alias") }))
            } else {
                Err(TransportError::Status {
                    status: 401,
                    operation: operation.to_string(),
                    body: "bad credentials".to_string(),
                })
            };
        }

        let Some(store) = store.filter(|_| service == SERVICE_NAME) else {
            return Err(TransportError::Status {
                status: 404,
                operation: operation.to_string(),
                body: format!("nothing served at {endpoint}"),
            });
        };

        Self::file_op(&store, operation, &args)
            .await
            .map_err(|error| status(operation, &error))
    }
}
