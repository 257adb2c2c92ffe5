//! Workflow metadata document
//!
//! Serde model of the Cromwell-style metadata served by the orchestration
//! service: a `calls` map from task name to the list of attempts/shards, each
//! possibly carrying a nested `subWorkflowMetadata` document of the same shape.
//! Resource descriptors stay as raw strings here; `crate::record` parses them.

use crate::error::Result;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub workflow_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub calls: BTreeMap<String, Vec<CallRecord>>,
}

impl WorkflowMetadata {
    /// Parse a metadata document.
    ///
    /// Sub-workflow chains nest without bound, so serde_json's recursion
    /// limit is lifted and the stack grows on demand while deserializing.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let mut de = serde_json::Deserializer::from_str(content);
        de.disable_recursion_limit();
        let metadata = Self::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Ok(metadata)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(Self::deserialize(serde_stacker::Deserializer::new(value))?)
    }

    /// Number of call records in this document and all nested sub-workflows.
    pub fn record_count(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(doc) = pending.pop() {
            for call in doc.calls.values().flatten() {
                count += 1;
                if let Some(sub) = &call.sub_workflow_metadata {
                    pending.push(sub.as_ref());
                }
            }
        }
        count
    }
}

/// One logged attempt of a task
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    #[serde(default)]
    pub jes: Option<JesAttributes>,
    #[serde(default)]
    pub runtime_attributes: Option<RuntimeAttributes>,
    #[serde(default)]
    pub preemptible: Option<bool>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub shard_index: Option<i64>,
    #[serde(default)]
    pub attempt: Option<u32>,
    #[serde(default)]
    pub execution_status: Option<String>,
    #[serde(default)]
    pub sub_workflow_id: Option<String>,
    #[serde(default)]
    pub sub_workflow_metadata: Option<Box<WorkflowMetadata>>,
}

/// Backend (Pipelines API) placement of a call
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JesAttributes {
    /// `"<zone>/<machine type>"` or a bare machine type
    #[serde(default)]
    pub machine_type: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeAttributes {
    /// Comma-separated `"<name> <sizeGB> <HDD|SSD|LOCAL>"` specs
    #[serde(default)]
    pub disks: Option<String>,
    #[serde(default)]
    pub gpu_type: Option<String>,
    #[serde(default)]
    pub gpu_count: Option<CountValue>,
}

/// Runtime attributes are rendered as strings by Cromwell, but hand-written
/// documents often use numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CountValue {
    Number(u64),
    Text(String),
}
