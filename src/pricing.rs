//! Pricing Resolver
//!
//! Joins resource descriptors to the region-keyed price catalog. Price keys
//! are built deterministically from the resource class, the machine family
//! and the preemptible flag, then rendered with the product prefix used by
//! the public GCP price list (`CP-COMPUTEENGINE-`).
//!
//! A missing key or region is always a `Lookup` error. Treating it as zero
//! would under-report cost.

use crate::config::DEFAULT_KEY_PREFIX;
use crate::error::{Result, WfcostError};
use crate::record::{Disk, DiskType, Gpu, MachineType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Billing month used to turn GB-month storage prices into hourly rates.
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Local SSDs are billed as whole 375 GB partitions regardless of the declared size.
pub const LOCAL_SSD_SIZE_GB: u64 = 375;

/// Custom machine memory is billed per started GB of 1000 MB.
pub const MB_PER_BILLABLE_GB: u64 = 1000;

/// Resource classes that map to entries of the price list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// Predefined machine family, e.g. `n1-standard-4`
    VmImage(String),
    CustomCore,
    CustomRam,
    PdCapacity,
    PdSsd,
    LocalSsd,
}

impl ResourceClass {
    fn stem(&self) -> String {
        match self {
            ResourceClass::VmImage(family) => format!("VMIMAGE-{}", family.to_uppercase()),
            ResourceClass::CustomCore => "CUSTOM-VM-CORE".to_string(),
            ResourceClass::CustomRam => "CUSTOM-VM-RAM".to_string(),
            ResourceClass::PdCapacity => "STORAGE-PD-CAPACITY".to_string(),
            ResourceClass::PdSsd => "STORAGE-PD-SSD".to_string(),
            ResourceClass::LocalSsd => "LOCAL-SSD".to_string(),
        }
    }

    /// Persistent disks are billed the same for preemptible VMs.
    pub fn has_preemptible_variant(&self) -> bool {
        !matches!(self, ResourceClass::PdCapacity | ResourceClass::PdSsd)
    }
}

/// Canonical join key between a resource descriptor and the pricing table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceKey {
    class: ResourceClass,
    preemptible: bool,
}

impl PriceKey {
    pub fn new(class: ResourceClass, preemptible: bool) -> Self {
        let preemptible = preemptible && class.has_preemptible_variant();
        Self { class, preemptible }
    }

    pub fn class(&self) -> &ResourceClass {
        &self.class
    }

    pub fn is_preemptible(&self) -> bool {
        self.preemptible
    }

    /// Render the key as it appears in the price list.
    pub fn render(&self, prefix: &str) -> String {
        let mut key = format!("{}{}", prefix, self.class.stem());
        if self.preemptible {
            key.push_str("-PREEMPTIBLE");
        }
        key
    }
}

/// Region-keyed price catalog: price key -> region -> unit price
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    entries: HashMap<String, HashMap<String, f64>>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, region: impl Into<String>, price: f64) {
        self.entries
            .entry(key.into())
            .or_default()
            .insert(region.into(), price);
    }

    pub fn with_price(
        mut self,
        key: impl Into<String>,
        region: impl Into<String>,
        price: f64,
    ) -> Self {
        self.insert(key, region, price);
        self
    }

    /// Build the table from a price list document.
    ///
    /// Accepts the public document (table nested under `gcp_price_list`) or a
    /// bare table. Non-numeric values next to the region prices (`cores`,
    /// `memory`, ...) are dropped, as are entries that are not objects.
    pub fn from_document(doc: &serde_json::Value) -> Result<Self> {
        let root = doc.get("gcp_price_list").unwrap_or(doc);
        let listing = root.as_object().ok_or_else(|| {
            WfcostError::parse(
                "pricelist",
                truncate(&root.to_string(), 80),
                "expected a JSON object of price keys",
            )
        })?;

        let mut table = PricingTable::new();
        for (key, value) in listing {
            let Some(regions) = value.as_object() else {
                continue;
            };
            for (region, price) in regions {
                if let Some(price) = price.as_f64() {
                    table.insert(key.clone(), region.clone(), price);
                }
            }
        }
        debug!("Loaded pricing table with {} keys", table.len());
        Ok(table)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let doc: serde_json::Value = serde_json::from_str(content)?;
        Self::from_document(&doc)
    }

    pub fn get(&self, key: &str, region: &str) -> Option<f64> {
        self.entries.get(key)?.get(region).copied()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Built-in GPU prices: model, on-demand, preemptible
const DEFAULT_GPU_PRICES: [(&str, f64, f64); 6] = [
    ("nvidia-tesla-k80", 0.45, 0.135),
    ("nvidia-tesla-p4", 0.60, 0.216),
    ("nvidia-tesla-t4", 0.35, 0.11),
    ("nvidia-tesla-p100", 1.46, 0.43),
    ("nvidia-tesla-v100", 2.48, 0.74),
    ("nvidia-tesla-a100", 2.93, 0.88),
];

fn default_on_demand() -> BTreeMap<String, f64> {
    DEFAULT_GPU_PRICES
        .iter()
        .map(|(model, price, _)| (model.to_string(), *price))
        .collect()
}

fn default_preemptible() -> BTreeMap<String, f64> {
    DEFAULT_GPU_PRICES
        .iter()
        .map(|(model, _, price)| (model.to_string(), *price))
        .collect()
}

/// Per-GPU-hour prices by accelerator model
///
/// GPU prices are not read from the price list; they are configuration
/// (`[gpu.on_demand]` / `[gpu.preemptible]`). A table given in the config
/// replaces the built-in one; a table left out keeps the built-in prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuPriceTable {
    #[serde(default = "default_on_demand")]
    pub on_demand: BTreeMap<String, f64>,
    #[serde(default = "default_preemptible")]
    pub preemptible: BTreeMap<String, f64>,
}

impl Default for GpuPriceTable {
    fn default() -> Self {
        Self {
            on_demand: default_on_demand(),
            preemptible: default_preemptible(),
        }
    }
}

impl GpuPriceTable {
    /// Per-unit hourly price; model names match case-insensitively.
    pub fn price(&self, model: &str, preemptible: bool) -> Option<f64> {
        let table = if preemptible {
            &self.preemptible
        } else {
            &self.on_demand
        };
        table
            .get(model)
            .or_else(|| {
                table
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(model))
                    .map(|(_, price)| price)
            })
            .copied()
    }
}

/// Resolves resource descriptors to hourly rates
///
/// Owns the pricing table and the GPU price tables; both are read-only for
/// the lifetime of the resolver.
#[derive(Debug, Clone)]
pub struct PricingResolver {
    table: PricingTable,
    gpu: GpuPriceTable,
    key_prefix: String,
}

impl PricingResolver {
    pub fn new(table: PricingTable, gpu: GpuPriceTable) -> Self {
        Self {
            table,
            gpu,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn key_string(&self, key: &PriceKey) -> String {
        key.render(&self.key_prefix)
    }

    /// Look up a rendered price key in a region.
    pub fn resolve(&self, key: &str, region: &str) -> Result<f64> {
        self.table
            .get(key, region)
            .ok_or_else(|| WfcostError::lookup(key, region))
    }

    pub fn resolve_key(&self, key: &PriceKey, region: &str) -> Result<f64> {
        self.resolve(&self.key_string(key), region)
    }

    /// Hourly machine rate, dispatching on predefined vs custom shapes.
    pub fn machine_hourly(
        &self,
        machine: &MachineType,
        region: &str,
        preemptible: bool,
    ) -> Result<f64> {
        match machine {
            MachineType::Standard { family } => self.resolve_key(
                &PriceKey::new(ResourceClass::VmImage(family.clone()), preemptible),
                region,
            ),
            MachineType::Custom { cores, memory_mb } => {
                let core_price =
                    self.resolve_key(&PriceKey::new(ResourceClass::CustomCore, preemptible), region)?;
                let ram_price =
                    self.resolve_key(&PriceKey::new(ResourceClass::CustomRam, preemptible), region)?;
                let billable_gb = memory_mb.div_ceil(MB_PER_BILLABLE_GB);
                Ok(core_price * f64::from(*cores) + ram_price * billable_gb as f64)
            }
        }
    }

    /// Hourly rate of one disk, from its GB-month price.
    pub fn disk_hourly(&self, disk: &Disk, region: &str, preemptible: bool) -> Result<f64> {
        let class = match disk.disk_type {
            DiskType::Hdd => ResourceClass::PdCapacity,
            DiskType::Ssd => ResourceClass::PdSsd,
            DiskType::Local => ResourceClass::LocalSsd,
        };
        let per_gb_month = self.resolve_key(&PriceKey::new(class, preemptible), region)?;
        Ok(per_gb_month * disk.billable_gb() as f64 / HOURS_PER_MONTH)
    }

    /// Hourly GPU surcharge for all attached accelerators.
    ///
    /// The region only appears in the error; GPU prices are not regional here.
    pub fn gpu_hourly(&self, gpu: &Gpu, region: &str, preemptible: bool) -> Result<f64> {
        let unit = self.gpu.price(&gpu.model, preemptible).ok_or_else(|| {
            let mut key = format!("GPU-{}", gpu.model.to_uppercase());
            if preemptible {
                key.push_str("-PREEMPTIBLE");
            }
            WfcostError::lookup(key, region)
        })?;
        Ok(unit * f64::from(gpu.count))
    }
}
