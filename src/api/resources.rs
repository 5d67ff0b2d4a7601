//! Prompt resources: templates, blocks, folders.
//!
//! All calls carry the stored bearer token. Reads and creates take the active
//! workspace [`Scope`] so results land in the right space.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

use super::{ApiClient, Auth, ListEnvelope};
use crate::error::{Error, Result};
use crate::workspace::Scope;

/// Resource collections exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Templates,
    Blocks,
    Folders,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Templates, Self::Blocks, Self::Folders];

    /// Collection path, with trailing slash.
    pub fn path(self) -> &'static str {
        match self {
            Self::Templates => "/prompts/templates/",
            Self::Blocks => "/prompts/blocks/",
            Self::Folders => "/prompts/folders/",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Templates => "templates",
            Self::Blocks => "blocks",
            Self::Folders => "folders",
        }
    }

    fn item_path(self, id: &str) -> String {
        format!("{}{}", self.path(), urlencoding::encode(id))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "templates" | "template" => Ok(Self::Templates),
            "blocks" | "block" => Ok(Self::Blocks),
            "folders" | "folder" => Ok(Self::Folders),
            other => Err(format!(
                "Unknown resource kind '{other}'. Use one of: templates, blocks, folders"
            )),
        }
    }
}

/// A resource record. Only `id` is interpreted; other fields pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Value,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Resource {
    /// The id as a string, whether the backend sent a string or a number.
    pub fn id_string(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// `title`, falling back to `name`.
    pub fn title(&self) -> Option<&str> {
        self.fields
            .get("title")
            .or_else(|| self.fields.get("name"))
            .and_then(Value::as_str)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Single {
    Wrapped { data: Resource },
    Bare(Resource),
}

impl From<Single> for Resource {
    fn from(single: Single) -> Self {
        match single {
            Single::Wrapped { data } | Single::Bare(data) => data,
        }
    }
}

impl ApiClient {
    /// List a collection within `scope`.
    #[instrument(skip(self))]
    pub async fn list(&self, kind: ResourceKind, scope: Option<&Scope>) -> Result<ListEnvelope<Resource>> {
        let path = kind.path();
        let mut req = self.request(Method::GET, path);
        if let Some(scope) = scope {
            req = req.query(&[(scope.field(), scope.value())]);
        }
        let list: ListEnvelope<Resource> = self.send_json(path, req, Auth::Stored).await?;
        debug!(kind = %kind, count = list.len(), "Listed resources");
        Ok(list)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, kind: ResourceKind, id: &str) -> Result<Resource> {
        let path = kind.item_path(id);
        let req = self.request(Method::GET, &path);
        let single: Single = self.send_json(&path, req, Auth::Stored).await?;
        Ok(single.into())
    }

    /// Create a resource. The scope field is added to the body unless the
    /// caller already set it.
    #[instrument(skip(self, body))]
    pub async fn create(&self, kind: ResourceKind, body: Value, scope: Option<&Scope>) -> Result<Resource> {
        let mut body = match body {
            Value::Object(map) => map,
            _ => {
                return Err(Error::UnexpectedResponse(
                    "resource body must be a JSON object".to_string(),
                ));
            }
        };
        if let Some(scope) = scope {
            body.entry(scope.field())
                .or_insert_with(|| Value::String(scope.value().to_string()));
        }
        let path = kind.path();
        let req = self.request(Method::POST, path).json(&body);
        let single: Single = self.send_json(path, req, Auth::Stored).await?;
        Ok(single.into())
    }

    #[instrument(skip(self, body))]
    pub async fn update(&self, kind: ResourceKind, id: &str, body: &Value) -> Result<Resource> {
        let path = kind.item_path(id);
        let req = self.request(Method::PUT, &path).json(body);
        let single: Single = self.send_json(&path, req, Auth::Stored).await?;
        Ok(single.into())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, kind: ResourceKind, id: &str) -> Result<()> {
        let path = kind.item_path(id);
        let req = self.request(Method::DELETE, &path);
        self.send(&path, req, Auth::Stored).await?;
        Ok(())
    }

    /// Full-text search across templates.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, scope: Option<&Scope>) -> Result<ListEnvelope<Resource>> {
        let path = "/prompts/search/";
        let mut req = self.request(Method::GET, path).query(&[("q", query)]);
        if let Some(scope) = scope {
            req = req.query(&[(scope.field(), scope.value())]);
        }
        self.send_json(path, req, Auth::Stored).await
    }
}
