//! wfcost library
//!
//! Estimates the cost of a cloud-executed workflow from its execution metadata
//! and the public per-region price list.
//!
//! The engine is synchronous and pure: `sources` materializes the metadata
//! document and the pricing table, then `aggregate` walks the call tree,
//! `calculator` prices each task and `pricing` resolves every rate.

pub mod aggregate;
pub mod calculator;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod metadata;
pub mod output;
pub mod pricing;
pub mod record;
pub mod retry;
pub mod sources;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use aggregate::{estimate, CostLine, CostReport, WorkflowCostAggregator};
pub use calculator::{TaskCost, TaskCostCalculator};
pub use error::{Result, WfcostError};
pub use metadata::WorkflowMetadata;
pub use pricing::{GpuPriceTable, PriceKey, PricingResolver, PricingTable, ResourceClass};
pub use record::{Disk, DiskType, ExecutionRecord, Gpu, MachineType};
