//! Workspace metadata endpoints.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::instrument;

use super::{ApiClient, Auth, ListEnvelope};
use crate::error::Result;
use crate::workspace::Organization;

#[derive(Debug, Default, Deserialize)]
struct MetadataBody {
    #[serde(default)]
    company_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MetadataResponse {
    Wrapped { data: MetadataBody },
    Bare(MetadataBody),
}

/// What the workspace selector needs from the backend.
#[async_trait]
pub trait WorkspaceBackend: Send + Sync {
    /// Company the signed-in user belongs to, if any.
    async fn company_id(&self) -> Result<Option<String>>;

    /// Organizations the signed-in user belongs to.
    async fn organizations(&self) -> Result<Vec<Organization>>;
}

#[async_trait]
impl WorkspaceBackend for ApiClient {
    #[instrument(skip_all)]
    async fn company_id(&self) -> Result<Option<String>> {
        let path = "/user/metadata";
        let req = self.request(Method::GET, path);
        let resp: MetadataResponse = self.send_json(path, req, Auth::Stored).await?;
        let body = match resp {
            MetadataResponse::Wrapped { data } | MetadataResponse::Bare(data) => data,
        };
        Ok(body.company_id.filter(|id| !id.is_empty()))
    }

    #[instrument(skip_all)]
    async fn organizations(&self) -> Result<Vec<Organization>> {
        let path = "/organizations";
        let req = self.request(Method::GET, path);
        let list: ListEnvelope<Organization> = self.send_json(path, req, Auth::Stored).await?;
        Ok(list.into_vec())
    }
}
