//! Metadata and price list sources
//!
//! The cost engine only ever sees materialized documents. These sources do the
//! I/O up front: HTTP for the orchestration API and the public price list, or
//! local files (and stdin) for offline runs. Transient HTTP failures are
//! retried according to `[fetch]` in the config; anything else is fatal.

use crate::config::FetchConfig;
use crate::error::{Result, WfcostError};
use crate::metadata::WorkflowMetadata;
use crate::pricing::PricingTable;
use crate::retry::{ExponentialBackoffPolicy, RetryPolicy};
use crate::validation::{validate_uuid, validate_workspace_component};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

/// Identifies one workflow run inside a Terra workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRef {
    pub namespace: String,
    pub workspace: String,
    pub submission_id: String,
    pub workflow_id: String,
}

impl WorkflowRef {
    pub fn new(
        namespace: impl Into<String>,
        workspace: impl Into<String>,
        submission_id: impl Into<String>,
        workflow_id: impl Into<String>,
    ) -> Result<Self> {
        let workflow = Self {
            namespace: namespace.into(),
            workspace: workspace.into(),
            submission_id: submission_id.into(),
            workflow_id: workflow_id.into(),
        };
        workflow.validate()?;
        Ok(workflow)
    }

    /// Build from optional CLI arguments, naming the first one that is missing.
    pub fn from_parts(
        namespace: Option<String>,
        workspace: Option<String>,
        submission_id: Option<String>,
        workflow_id: Option<String>,
    ) -> Result<Self> {
        let require = |field: &str, value: Option<String>| {
            value.ok_or_else(|| WfcostError::Validation {
                field: field.to_string(),
                reason: "required unless --metadata is given".to_string(),
            })
        };
        Self::new(
            require("namespace", namespace)?,
            require("workspace", workspace)?,
            require("submission_id", submission_id)?,
            require("workflow_id", workflow_id)?,
        )
    }

    pub fn validate(&self) -> Result<()> {
        validate_workspace_component("namespace", &self.namespace)?;
        validate_workspace_component("workspace", &self.workspace)?;
        validate_uuid("submission_id", &self.submission_id)?;
        validate_uuid("workflow_id", &self.workflow_id)?;
        Ok(())
    }

    /// Metadata endpoint relative to the API root.
    pub fn metadata_path(&self) -> String {
        format!(
            "workspaces/{}/{}/submissions/{}/workflows/{}",
            self.namespace, self.workspace, self.submission_id, self.workflow_id
        )
    }
}

/// Source of the workflow-metadata document
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Human-readable origin, for logs
    fn describe(&self) -> String;

    /// The document exactly as served
    async fn fetch_raw(&self) -> Result<String>;

    async fn fetch(&self) -> Result<WorkflowMetadata> {
        let raw = self.fetch_raw().await?;
        let metadata = WorkflowMetadata::from_json_str(&raw)?;
        debug!(
            "Loaded metadata from {} ({} call records)",
            self.describe(),
            metadata.record_count()
        );
        Ok(metadata)
    }
}

/// Source of the pricing table
#[async_trait]
pub trait PriceListSource: Send + Sync {
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<PricingTable>;
}

pub fn build_http_client(config: &FetchConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("wfcost/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| WfcostError::Fetch {
            target: "http client".to_string(),
            status: None,
            message: "failed to build HTTP client".to_string(),
            source: Some(Box::new(e)),
        })
}

async fn get_text(
    client: &reqwest::Client,
    target: &str,
    url: &str,
    query: &[(&str, &str)],
    token: Option<&str>,
) -> Result<String> {
    let mut request = client.get(url);
    if !query.is_empty() {
        request = request.query(query);
    }
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(|e| WfcostError::Fetch {
        target: target.to_string(),
        status: e.status().map(|s| s.as_u16()),
        message: format!("request to {} failed", url),
        source: Some(Box::new(e)),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(WfcostError::Fetch {
            target: target.to_string(),
            status: Some(status.as_u16()),
            message: format!("{} returned {}: {}", url, status, snippet.trim()),
            source: None,
        });
    }

    response.text().await.map_err(|e| WfcostError::Fetch {
        target: target.to_string(),
        status: Some(status.as_u16()),
        message: format!("failed to read response body from {}", url),
        source: Some(Box::new(e)),
    })
}

/// Workflow metadata from the FireCloud / Terra orchestration API
pub struct FireCloudMetadataSource {
    client: reqwest::Client,
    api_root: String,
    workflow: WorkflowRef,
    token: Option<String>,
    max_attempts: u32,
}

impl FireCloudMetadataSource {
    pub fn new(
        client: reqwest::Client,
        api_root: impl Into<String>,
        workflow: WorkflowRef,
        token: Option<String>,
        max_attempts: u32,
    ) -> Self {
        Self {
            client,
            api_root: api_root.into(),
            workflow,
            token,
            max_attempts,
        }
    }

    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.api_root.trim_end_matches('/'),
            self.workflow.metadata_path()
        )
    }
}

#[async_trait]
impl MetadataSource for FireCloudMetadataSource {
    fn describe(&self) -> String {
        self.url()
    }

    async fn fetch_raw(&self) -> Result<String> {
        let url = self.url();
        info!("Fetching workflow metadata: {}", url);
        // Sub-workflows are only inlined when asked for
        let query = [("expandSubWorkflows", "true")];
        ExponentialBackoffPolicy::new(self.max_attempts)
            .execute_with_retry(|| {
                get_text(
                    &self.client,
                    "workflow metadata",
                    &url,
                    &query,
                    self.token.as_deref(),
                )
            })
            .await
    }
}

/// Workflow metadata from a file, or stdin when the path is `-`
pub struct FileMetadataSource {
    path: PathBuf,
}

impl FileMetadataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }
}

#[async_trait]
impl MetadataSource for FileMetadataSource {
    fn describe(&self) -> String {
        if self.is_stdin() {
            "<stdin>".to_string()
        } else {
            self.path.display().to_string()
        }
    }

    async fn fetch_raw(&self) -> Result<String> {
        if self.is_stdin() {
            let mut content = String::new();
            tokio::io::stdin().read_to_string(&mut content).await?;
            return Ok(content);
        }
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }
}

/// The public price list over HTTP
pub struct HttpPriceListSource {
    client: reqwest::Client,
    url: String,
    max_attempts: u32,
}

impl HttpPriceListSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            client,
            url: url.into(),
            max_attempts,
        }
    }
}

#[async_trait]
impl PriceListSource for HttpPriceListSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<PricingTable> {
        info!("Fetching price list: {}", self.url);
        let body = ExponentialBackoffPolicy::new(self.max_attempts)
            .execute_with_retry(|| get_text(&self.client, "price list", &self.url, &[], None))
            .await?;
        PricingTable::from_json_str(&body)
    }
}

/// A price list saved to disk
pub struct FilePriceListSource {
    path: PathBuf,
}

impl FilePriceListSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PriceListSource for FilePriceListSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<PricingTable> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        PricingTable::from_json_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMISSION: &str = "6d1f3a6c-3f1e-4d5e-9c8a-2b7e1f0a9d41";
    const WORKFLOW: &str = "0a3c5e7f-1b2d-4f6a-8c9e-123456789abc";

    #[test]
    fn test_workflow_ref_path() {
        let wf = WorkflowRef::new("clara-terra", "Clara-Parabricks", SUBMISSION, WORKFLOW).unwrap();
        assert_eq!(
            wf.metadata_path(),
            format!(
                "workspaces/clara-terra/Clara-Parabricks/submissions/{}/workflows/{}",
                SUBMISSION, WORKFLOW
            )
        );
    }

    #[test]
    fn test_workflow_ref_from_parts_reports_missing_field() {
        let err = WorkflowRef::from_parts(
            Some("ns".to_string()),
            None,
            Some(SUBMISSION.to_string()),
            Some(WORKFLOW.to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, WfcostError::Validation { ref field, .. } if field == "workspace"));
    }

    #[test]
    fn test_workflow_ref_rejects_bad_ids() {
        assert!(WorkflowRef::new("ns", "ws", "123", WORKFLOW).is_err());
        assert!(WorkflowRef::new("ns", "../ws", SUBMISSION, WORKFLOW).is_err());
    }

    #[test]
    fn test_firecloud_url_trims_trailing_slash() {
        let wf = WorkflowRef::new("ns", "ws", SUBMISSION, WORKFLOW).unwrap();
        let source = FireCloudMetadataSource::new(
            reqwest::Client::new(),
            "https://api.firecloud.org/api/",
            wf,
            None,
            1,
        );
        assert!(source
            .url()
            .starts_with("https://api.firecloud.org/api/workspaces/ns/ws/"));
    }
}
