//! Workflow Cost Aggregator
//!
//! Depth-first walk over the call tree, to any nesting depth. Every attempt and shard is priced; a
//! record that carries `subWorkflowMetadata` adds the sub-tree total on top of
//! its own cost (if it has one). The grand total is rounded up to the cent.

use crate::calculator::{TaskCost, TaskCostCalculator};
use crate::error::{Result, WfcostError};
use crate::metadata::WorkflowMetadata;
use crate::pricing::PricingResolver;
use crate::record::ExecutionRecord;
use crate::utils::round_up_to_cent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// One priced execution record
#[derive(Debug, Clone, Serialize)]
pub struct CostLine {
    /// Call names from the root workflow down, joined with `/`
    pub call: String,
    pub shard: Option<i64>,
    pub attempt: Option<u32>,
    pub machine: String,
    pub region: String,
    pub preemptible: bool,
    #[serde(flatten)]
    pub cost: TaskCost,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostReport {
    pub workflow_id: Option<String>,
    pub workflow_name: Option<String>,
    /// Sum of all task costs before rounding
    pub raw_total: f64,
    /// `raw_total` rounded up to the cent
    pub total: f64,
    pub lines: Vec<CostLine>,
    /// Records that carried no machine placement
    pub skipped: usize,
}

pub struct WorkflowCostAggregator<'a> {
    calculator: TaskCostCalculator<'a>,
}

impl<'a> WorkflowCostAggregator<'a> {
    pub fn new(resolver: &'a PricingResolver, now: DateTime<Utc>) -> Self {
        Self {
            calculator: TaskCostCalculator::new(resolver, now),
        }
    }

    /// Total cost of the workflow, rounded up to the cent.
    pub fn total(&self, metadata: &WorkflowMetadata) -> Result<f64> {
        Ok(self.aggregate(metadata)?.total)
    }

    pub fn aggregate(&self, metadata: &WorkflowMetadata) -> Result<CostReport> {
        let mut lines = Vec::new();
        let mut skipped = 0;
        let raw_total = self.walk(metadata, &mut lines, &mut skipped)?;
        let total = round_up_to_cent(raw_total);

        info!(
            "Priced {} task records ({} skipped): ${:.6} -> ${:.2}",
            lines.len(),
            skipped,
            raw_total,
            total
        );

        Ok(CostReport {
            workflow_id: metadata.id.clone(),
            workflow_name: metadata.workflow_name.clone(),
            raw_total,
            total,
            lines,
            skipped,
        })
    }

    /// Depth-first over an explicit stack, so chain depth is bounded by the
    /// heap rather than the call stack.
    fn walk(
        &self,
        root: &WorkflowMetadata,
        lines: &mut Vec<CostLine>,
        skipped: &mut usize,
    ) -> Result<f64> {
        let mut subtotal = 0.0;
        let mut pending: Vec<(&WorkflowMetadata, String)> = vec![(root, String::new())];

        while let Some((metadata, prefix)) = pending.pop() {
            let mut nested = Vec::new();

            for (name, calls) in &metadata.calls {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", prefix, name)
                };

                for call in calls {
                    match ExecutionRecord::from_call(call)? {
                        Some(record) => {
                            let cost = self.calculator.cost(&record)?;
                            subtotal += cost.total;
                            lines.push(CostLine {
                                call: path.clone(),
                                shard: call.shard_index,
                                attempt: call.attempt,
                                machine: record.machine.to_string(),
                                region: record.region,
                                preemptible: record.preemptible,
                                cost,
                            });
                        }
                        None if call.sub_workflow_metadata.is_none() => {
                            debug!("Skipping {}: no machine placement", path);
                            *skipped += 1;
                        }
                        None => {}
                    }

                    match (&call.sub_workflow_metadata, &call.sub_workflow_id) {
                        (Some(sub), _) => nested.push((sub.as_ref(), path.clone())),
                        (None, Some(id)) => {
                            return Err(WfcostError::parse(
                                "subWorkflowMetadata",
                                id.as_str(),
                                format!(
                                    "sub-workflow of {} was not expanded; fetch metadata with expandSubWorkflows=true",
                                    path
                                ),
                            ));
                        }
                        (None, None) => {}
                    }
                }
            }

            // reversed so sub-workflows are visited in document order
            pending.extend(nested.into_iter().rev());
        }

        Ok(subtotal)
    }
}

/// Price a whole workflow document.
pub fn estimate(
    metadata: &WorkflowMetadata,
    resolver: &PricingResolver,
    now: DateTime<Utc>,
) -> Result<CostReport> {
    WorkflowCostAggregator::new(resolver, now).aggregate(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{GpuPriceTable, PricingTable};
    use serde_json::json;

    fn resolver() -> PricingResolver {
        // $1.00/hr machine, no disks
        let table = PricingTable::new()
            .with_price("CP-COMPUTEENGINE-VMIMAGE-N1-STANDARD-1", "us-central1", 1.0)
            .with_price("CP-COMPUTEENGINE-VMIMAGE-N1-STANDARD-1-PREEMPTIBLE", "us-central1", 0.25);
        PricingResolver::new(table, GpuPriceTable::default())
    }

    fn task(hours: u32) -> serde_json::Value {
        json!({
            "jes": {"machineType": "us-central1-f/n1-standard-1"},
            "start": "2020-01-01T00:00:00.000Z",
            "end": format!("2020-01-01T{:02}:00:00.000Z", hours),
        })
    }

    #[test]
    fn test_attempts_and_shards_are_summed() {
        let metadata = WorkflowMetadata::from_value(json!({
            "calls": {"wf.scatter": [task(1), task(2), task(3)]}
        }))
        .unwrap();
        let report = estimate(&metadata, &resolver(), Utc::now()).unwrap();
        assert_eq!(report.lines.len(), 3);
        assert!((report.total - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_nested_sub_workflow_is_additive() {
        let mut parent = task(1);
        parent["subWorkflowMetadata"] = json!({
            "calls": {
                "inner.a": [task(2)],
                "inner.b": [{"subWorkflowMetadata": {"calls": {"deep.c": [task(3)]}}}]
            }
        });
        let metadata =
            WorkflowMetadata::from_value(json!({"calls": {"wf.node": [parent]}})).unwrap();
        let report = estimate(&metadata, &resolver(), Utc::now()).unwrap();
        assert!((report.total - 6.0).abs() < 1e-9);
        assert_eq!(report.lines.len(), 3);
        assert!(report
            .lines
            .iter()
            .any(|l| l.call == "wf.node/inner.b/deep.c"));
        // the pure sub-workflow node is neither priced nor skipped
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn test_bookkeeping_records_are_skipped() {
        let metadata = WorkflowMetadata::from_value(json!({
            "calls": {
                "wf.cached": [{"executionStatus": "Done", "callCaching": {"hit": true}}],
                "wf.run": [task(1)]
            }
        }))
        .unwrap();
        let report = estimate(&metadata, &resolver(), Utc::now()).unwrap();
        assert_eq!(report.skipped, 1);
        assert!((report.total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unexpanded_sub_workflow_fails() {
        let metadata = WorkflowMetadata::from_value(json!({
            "calls": {"wf.sub": [{"subWorkflowId": "0000-1111"}]}
        }))
        .unwrap();
        let err = estimate(&metadata, &resolver(), Utc::now()).unwrap_err();
        assert!(matches!(err, WfcostError::Parse { .. }));
    }

    #[test]
    fn test_lookup_error_aborts_everything() {
        let mut bad = task(1);
        bad["jes"]["machineType"] = json!("us-central1-f/n1-ultramem-40");
        let metadata = WorkflowMetadata::from_value(json!({
            "calls": {"wf.good": [task(1)], "wf.bad": [bad]}
        }))
        .unwrap();
        let err = WorkflowCostAggregator::new(&resolver(), Utc::now())
            .total(&metadata)
            .unwrap_err();
        assert!(matches!(err, WfcostError::Lookup { .. }));
    }

    #[test]
    fn test_total_rounds_up_to_cent() {
        let mut short = task(0);
        short["end"] = json!("2020-01-01T00:01:00.000Z");
        let metadata =
            WorkflowMetadata::from_value(json!({"calls": {"wf.quick": [short]}})).unwrap();
        let report = estimate(&metadata, &resolver(), Utc::now()).unwrap();
        // one minute at $1/hr is $0.0166..., billed as $0.02
        assert_eq!(report.total, 0.02);
        assert!(report.raw_total < report.total);
    }

    #[test]
    fn test_empty_workflow_costs_nothing() {
        let report = estimate(&WorkflowMetadata::default(), &resolver(), Utc::now()).unwrap();
        assert_eq!(report.total, 0.0);
        assert!(report.lines.is_empty());
    }

    #[test]
    fn test_deep_sub_workflow_chain() {
        let depth = 300;
        let mut doc = json!({"calls": {"leaf.work": [task(1)]}}).to_string();
        for level in 0..depth {
            doc = format!(
                r#"{{"calls": {{"level{}.sub": [{{"subWorkflowId": "sub-{}", "subWorkflowMetadata": {}}}]}}}}"#,
                level, level, doc
            );
        }

        let metadata = WorkflowMetadata::from_json_str(&doc).unwrap();
        assert_eq!(metadata.record_count(), depth + 1);

        let report = estimate(&metadata, &resolver(), Utc::now()).unwrap();
        assert_eq!(report.total, 1.0);
        assert_eq!(report.lines.len(), 1);
        assert_eq!(report.lines[0].call.matches('/').count(), depth);
        assert!(report.lines[0].call.ends_with("/leaf.work"));
    }
}
