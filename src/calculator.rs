//! Task Cost Calculator
//!
//! Prices one execution record: `(machine + disks + gpus) * hours`.

use crate::error::Result;
use crate::pricing::PricingResolver;
use crate::record::ExecutionRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Rates and runtime behind one task cost
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCost {
    pub hours: f64,
    pub machine_rate: f64,
    pub disk_rate: f64,
    pub gpu_rate: f64,
    pub total: f64,
}

impl TaskCost {
    /// Combined hourly rate of the task
    pub fn hourly_rate(&self) -> f64 {
        self.machine_rate + self.disk_rate + self.gpu_rate
    }
}

pub struct TaskCostCalculator<'a> {
    resolver: &'a PricingResolver,
    now: DateTime<Utc>,
}

impl<'a> TaskCostCalculator<'a> {
    /// `now` stands in for the end time of tasks that are still running.
    pub fn new(resolver: &'a PricingResolver, now: DateTime<Utc>) -> Self {
        Self { resolver, now }
    }

    pub fn cost(&self, record: &ExecutionRecord) -> Result<TaskCost> {
        let region = record.region.as_str();
        let hours = record.elapsed_hours(self.now);

        let machine_rate =
            self.resolver
                .machine_hourly(&record.machine, region, record.preemptible)?;

        let mut disk_rate = 0.0;
        for disk in &record.disks {
            disk_rate += self.resolver.disk_hourly(disk, region, record.preemptible)?;
        }

        let gpu_rate = match &record.gpu {
            Some(gpu) => self.resolver.gpu_hourly(gpu, region, record.preemptible)?,
            None => 0.0,
        };

        let total = (machine_rate + disk_rate + gpu_rate) * hours;
        debug!(
            "{} in {}: {:.4}h at ${:.4}/hr (machine {:.4}, disk {:.4}, gpu {:.4})",
            record.machine,
            region,
            hours,
            machine_rate + disk_rate + gpu_rate,
            machine_rate,
            disk_rate,
            gpu_rate
        );

        Ok(TaskCost {
            hours,
            machine_rate,
            disk_rate,
            gpu_rate,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{GpuPriceTable, PricingTable};
    use crate::record::{Disk, DiskType, Gpu, MachineType};
    use chrono::TimeZone;

    fn resolver() -> PricingResolver {
        let table = PricingTable::new()
            .with_price("CP-COMPUTEENGINE-VMIMAGE-N1-STANDARD-4", "us-central1", 0.20)
            .with_price("CP-COMPUTEENGINE-STORAGE-PD-SSD", "us-central1", 0.04)
            .with_price("CP-COMPUTEENGINE-STORAGE-PD-CAPACITY", "us-central1", 0.02);
        PricingResolver::new(table, GpuPriceTable::default())
    }

    fn record(seconds: i64) -> ExecutionRecord {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        ExecutionRecord {
            region: "us-central1".to_string(),
            machine: MachineType::Standard {
                family: "n1-standard-4".to_string(),
            },
            preemptible: false,
            disks: vec![Disk {
                name: "local-disk".to_string(),
                size_gb: 100,
                disk_type: DiskType::Ssd,
            }],
            gpu: None,
            start,
            end: Some(start + chrono::Duration::seconds(seconds)),
        }
    }

    #[test]
    fn test_one_hour_task() {
        let r = resolver();
        let calc = TaskCostCalculator::new(&r, Utc::now());
        let cost = calc.cost(&record(3600)).unwrap();
        assert!((cost.hours - 1.0).abs() < 1e-12);
        assert!((cost.total - (0.20 + 100.0 * 0.04 / 730.0)).abs() < 1e-12);
        assert_eq!(cost.gpu_rate, 0.0);
    }

    #[test]
    fn test_short_task_billed_one_minute() {
        let r = resolver();
        let calc = TaskCostCalculator::new(&r, Utc::now());
        let short = calc.cost(&record(1)).unwrap();
        let minute = calc.cost(&record(60)).unwrap();
        assert_eq!(short, minute);
    }

    #[test]
    fn test_disk_rates_are_summed() {
        let r = resolver();
        let calc = TaskCostCalculator::new(&r, Utc::now());
        let mut rec = record(3600);
        rec.disks.push(Disk {
            name: "/mnt".to_string(),
            size_gb: 365,
            disk_type: DiskType::Hdd,
        });
        let cost = calc.cost(&rec).unwrap();
        let expected = 100.0 * 0.04 / 730.0 + 365.0 * 0.02 / 730.0;
        assert!((cost.disk_rate - expected).abs() < 1e-12);
    }

    #[test]
    fn test_gpu_surcharge() {
        let r = resolver();
        let calc = TaskCostCalculator::new(&r, Utc::now());
        let mut rec = record(7200);
        rec.gpu = Some(Gpu {
            model: "nvidia-tesla-t4".to_string(),
            count: 1,
        });
        let cost = calc.cost(&rec).unwrap();
        assert!((cost.gpu_rate - 0.35).abs() < 1e-12);
        assert!((cost.total - cost.hourly_rate() * 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_running_task_priced_until_now() {
        let r = resolver();
        let mut rec = record(0);
        rec.end = None;
        let now = rec.start + chrono::Duration::minutes(90);
        let cost = TaskCostCalculator::new(&r, now).cost(&rec).unwrap();
        assert!((cost.hours - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_region_fails() {
        let r = resolver();
        let calc = TaskCostCalculator::new(&r, Utc::now());
        let mut rec = record(3600);
        rec.region = "australia-southeast1".to_string();
        assert!(calc.cost(&rec).is_err());
    }
}
