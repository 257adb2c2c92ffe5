//! Report rendering
//!
//! Text output is the single `$<amount>` line scripts expect; `--breakdown`
//! adds a per-record table above it. JSON output carries the same data.

use crate::aggregate::CostReport;
use crate::error::{Result, WfcostError};
use crate::utils::{format_currency, format_hours};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = WfcostError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(WfcostError::Validation {
                field: "output".to_string(),
                reason: format!("unknown output format '{}' (expected text or json)", other),
            }),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    workflow_id: Option<&'a str>,
    workflow_name: Option<&'a str>,
    total: f64,
    formatted: String,
    raw_total: f64,
    priced_records: usize,
    skipped_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    lines: Option<&'a [crate::aggregate::CostLine]>,
}

pub fn render_report(report: &CostReport, format: OutputFormat, breakdown: bool) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let total = format_currency(report.total);
            if breakdown {
                Ok(format!("{}\n\n{}", breakdown_table(report), total))
            } else {
                Ok(total)
            }
        }
        OutputFormat::Json => {
            let json = JsonReport {
                workflow_id: report.workflow_id.as_deref(),
                workflow_name: report.workflow_name.as_deref(),
                total: report.total,
                formatted: format_currency(report.total),
                raw_total: report.raw_total,
                priced_records: report.lines.len(),
                skipped_records: report.skipped,
                lines: breakdown.then_some(report.lines.as_slice()),
            };
            Ok(serde_json::to_string_pretty(&json)?)
        }
    }
}

fn breakdown_table(report: &CostReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "CALL", "SHARD", "ATTEMPT", "MACHINE", "REGION", "PREEMPT", "RUNTIME", "$/HR", "COST",
    ]);

    for line in &report.lines {
        table.add_row(vec![
            Cell::new(&line.call),
            Cell::new(line.shard.map_or("-".to_string(), |s| s.to_string())),
            Cell::new(line.attempt.map_or("-".to_string(), |a| a.to_string())),
            Cell::new(&line.machine),
            Cell::new(&line.region),
            Cell::new(if line.preemptible { "yes" } else { "no" }),
            Cell::new(format_hours(line.cost.hours)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}", line.cost.hourly_rate())).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}", line.cost.total)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
