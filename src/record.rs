//! Execution records
//!
//! Parse step between the raw metadata document and the pricing logic: machine
//! types become `MachineType::{Standard, Custom}`, disk specs become `Disk`
//! values and timestamps become `DateTime<Utc>`. Grammar failures are
//! `Parse` errors; a call without machine placement is not a compute task and
//! yields `None`.

use crate::error::{Result, WfcostError};
use crate::metadata::{CallRecord, CountValue};
use crate::pricing::LOCAL_SSD_SIZE_GB;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Tasks shorter than this are billed as if they ran this long.
pub const MIN_BILLABLE_SECONDS: f64 = 60.0;

fn custom_machine_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^custom-(\d+)-(\d+)$").expect("valid regex"))
}

fn machine_family_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)+$").expect("valid regex"))
}

fn disk_spec_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\S+)\s+(\d+)\s+(\S+)$").expect("valid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineType {
    /// Predefined family such as `n1-standard-4`
    Standard { family: String },
    /// `custom-<cores>-<memoryMB>`
    Custom { cores: u32, memory_mb: u64 },
}

impl MachineType {
    pub fn parse(raw: &str) -> Result<Self> {
        let value = raw.trim().to_ascii_lowercase();

        if value.starts_with("custom") {
            let caps = custom_machine_re().captures(&value).ok_or_else(|| {
                WfcostError::parse(
                    "machineType",
                    raw,
                    "custom machine types must look like custom-<cores>-<memoryMB>",
                )
            })?;
            let cores: u32 = caps[1].parse().map_err(|_| {
                WfcostError::parse("machineType", raw, "core count out of range")
            })?;
            let memory_mb: u64 = caps[2].parse().map_err(|_| {
                WfcostError::parse("machineType", raw, "memory size out of range")
            })?;
            if cores == 0 || memory_mb == 0 {
                return Err(WfcostError::parse(
                    "machineType",
                    raw,
                    "cores and memory must be greater than zero",
                ));
            }
            return Ok(MachineType::Custom { cores, memory_mb });
        }

        if !machine_family_re().is_match(&value) {
            return Err(WfcostError::parse(
                "machineType",
                raw,
                "expected a machine family like n1-standard-4 or custom-<cores>-<memoryMB>",
            ));
        }
        Ok(MachineType::Standard { family: value })
    }
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineType::Standard { family } => write!(f, "{}", family),
            MachineType::Custom { cores, memory_mb } => write!(f, "custom-{}-{}", cores, memory_mb),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskType {
    Hdd,
    Ssd,
    Local,
}

impl FromStr for DiskType {
    type Err = WfcostError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "HDD" => Ok(DiskType::Hdd),
            "SSD" => Ok(DiskType::Ssd),
            "LOCAL" => Ok(DiskType::Local),
            _ => Err(WfcostError::parse(
                "disks",
                s,
                "disk type must be one of HDD, SSD, LOCAL",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disk {
    pub name: String,
    pub size_gb: u64,
    pub disk_type: DiskType,
}

impl Disk {
    /// Parse one `"<name> <sizeGB> <type>"` spec.
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        let caps = disk_spec_re().captures(trimmed).ok_or_else(|| {
            WfcostError::parse("disks", spec, "expected \"<name> <sizeGB> <HDD|SSD|LOCAL>\"")
        })?;
        let size_gb = caps[2]
            .parse()
            .map_err(|_| WfcostError::parse("disks", spec, "disk size out of range"))?;
        Ok(Disk {
            name: caps[1].to_string(),
            size_gb,
            disk_type: caps[3].parse()?,
        })
    }

    /// Parse a comma-separated list of disk specs. Blank input means no disks.
    pub fn parse_list(specs: &str) -> Result<Vec<Self>> {
        if specs.trim().is_empty() {
            return Ok(Vec::new());
        }
        specs.split(',').map(Disk::parse).collect()
    }

    pub fn billable_gb(&self) -> u64 {
        match self.disk_type {
            DiskType::Local => LOCAL_SSD_SIZE_GB,
            DiskType::Hdd | DiskType::Ssd => self.size_gb,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gpu {
    pub model: String,
    pub count: u32,
}

/// One priceable task attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub region: String,
    pub machine: MachineType,
    pub preemptible: bool,
    pub disks: Vec<Disk>,
    pub gpu: Option<Gpu>,
    pub start: DateTime<Utc>,
    /// `None` while the task is still running
    pub end: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Build a record from a metadata call.
    ///
    /// Returns `Ok(None)` for calls with no machine placement (sub-workflow
    /// nodes, calls that never reached the backend, cache hits).
    pub fn from_call(call: &CallRecord) -> Result<Option<Self>> {
        let Some(jes) = call.jes.as_ref() else {
            return Ok(None);
        };
        let Some(raw_machine) = non_blank(jes.machine_type.as_deref()) else {
            return Ok(None);
        };
        let (zone, machine) = match raw_machine.split_once('/') {
            Some((zone, machine)) => (Some(zone), machine),
            None => (non_blank(jes.zone.as_deref()), raw_machine),
        };
        let Some(zone) = zone else {
            return Ok(None);
        };

        let region = region_from_zone(zone)?;
        let machine = MachineType::parse(machine)?;
        let preemptible = call.preemptible.unwrap_or(false);

        let runtime = call.runtime_attributes.as_ref();
        let disks = match runtime.and_then(|r| r.disks.as_deref()) {
            Some(specs) => Disk::parse_list(specs)?,
            None => Vec::new(),
        };

        let gpu_type = runtime.and_then(|r| non_blank(r.gpu_type.as_deref()));
        let gpu_count = match runtime.and_then(|r| r.gpu_count.as_ref()) {
            Some(count) => Some(parse_count(count)?),
            None => None,
        };
        let gpu = match (gpu_type, gpu_count) {
            (Some(model), count) => Some(Gpu {
                model: model.to_string(),
                count: count.unwrap_or(1),
            }),
            (None, Some(count)) if count > 0 => {
                return Err(WfcostError::lookup("GPU (model not specified)", region));
            }
            (None, _) => None,
        };
        let gpu = gpu.filter(|g| g.count > 0);

        let start = match non_blank(call.start.as_deref()) {
            Some(raw) => parse_timestamp("start", raw)?,
            None => {
                return Err(WfcostError::parse(
                    "start",
                    "",
                    "a task placed on a machine must have a start time",
                ))
            }
        };
        let end = match non_blank(call.end.as_deref()) {
            Some(raw) => Some(parse_timestamp("end", raw)?),
            None => None,
        };
        if let Some(end) = end {
            if end < start {
                return Err(WfcostError::parse(
                    "end",
                    end.to_rfc3339(),
                    format!("end precedes start ({})", start.to_rfc3339()),
                ));
            }
        }

        Ok(Some(ExecutionRecord {
            region,
            machine,
            preemptible,
            disks,
            gpu,
            start,
            end,
        }))
    }

    /// Billable hours, running tasks counted until `now`, floored at one minute.
    pub fn elapsed_hours(&self, now: DateTime<Utc>) -> f64 {
        let end = self.end.unwrap_or(now);
        let seconds = (end - self.start).num_milliseconds() as f64 / 1000.0;
        seconds.max(MIN_BILLABLE_SECONDS) / 3600.0
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_count(count: &CountValue) -> Result<u32> {
    match count {
        CountValue::Number(n) => u32::try_from(*n)
            .map_err(|_| WfcostError::parse("gpuCount", n.to_string(), "GPU count out of range")),
        CountValue::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| WfcostError::parse("gpuCount", text.as_str(), "expected a whole number")),
    }
}

/// Strip the zone letter: `us-central1-b` -> `us-central1`.
pub fn region_from_zone(zone: &str) -> Result<String> {
    let zone = zone.trim();
    match zone.rsplit_once('-') {
        Some((region, suffix))
            if !region.is_empty()
                && suffix.len() == 1
                && suffix.chars().all(|c| c.is_ascii_lowercase()) =>
        {
            Ok(region.to_string())
        }
        _ => Err(WfcostError::parse(
            "zone",
            zone,
            "expected a zone like us-central1-b",
        )),
    }
}

/// Parse an RFC 3339 timestamp; zone-less timestamps are taken as UTC.
pub fn parse_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| WfcostError::parse(field, raw, format!("invalid timestamp: {}", e)))
}
