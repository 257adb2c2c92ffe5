use crate::error::{ConfigError, Result};
use crate::pricing::GpuPriceTable;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_PRICELIST_URL: &str =
    "https://cloudpricingcalculator.appspot.com/static/data/pricelist.json";
pub const DEFAULT_KEY_PREFIX: &str = "CP-COMPUTEENGINE-";
pub const DEFAULT_API_ROOT: &str = "https://api.firecloud.org/api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pricing: PricingConfig,
    pub metadata: MetadataConfig,
    pub fetch: FetchConfig,
    #[serde(default)]
    pub gpu: GpuPriceTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Public price list URL
    pub url: String,
    /// Product prefix prepended to every price key
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Orchestration API root (FireCloud / Terra)
    pub api_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pricing: PricingConfig {
                url: DEFAULT_PRICELIST_URL.to_string(),
                key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            },
            metadata: MetadataConfig {
                api_root: DEFAULT_API_ROOT.to_string(),
            },
            fetch: FetchConfig {
                timeout_secs: 60,
                max_attempts: 3,
            },
            gpu: GpuPriceTable::default(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            // Try .wfcost.toml in current dir, then ~/.config/wfcost/config.toml
            let local = PathBuf::from(".wfcost.toml");
            if local.exists() {
                local
            } else {
                dirs::config_dir()
                    .map(|d| d.join("wfcost").join("config.toml"))
                    .unwrap_or_else(|| PathBuf::from(".wfcost.toml"))
            }
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(ConfigError::NotFound(config_path.display().to_string()).into());
            }
            debug!("No config file found, using defaults");
            return Ok(Config::default());
        }

        debug!("Loading config from {}", config_path.display());
        let content = std::fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            ConfigError::ParseError(format!(
                "{}: {}\n  Tip: Run 'wfcost init' to create a new config file",
                config_path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pricing.url.trim().is_empty() {
            return Err(ConfigError::MissingField("pricing.url".to_string()).into());
        }
        if self.metadata.api_root.trim().is_empty() {
            return Err(ConfigError::MissingField("metadata.api_root".to_string()).into());
        }
        if self.fetch.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        for (table, prices) in [
            ("gpu.on_demand", &self.gpu.on_demand),
            ("gpu.preemptible", &self.gpu.preemptible),
        ] {
            if let Some((model, price)) = prices.iter().find(|(_, p)| !p.is_finite() || **p < 0.0) {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.{}", table, model),
                    reason: format!("price must be a non-negative number, got {}", price),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn init_config(output: &Path) -> Result<()> {
    let config = Config::default();
    config.save(output)?;
    println!("Created config file: {}", output.display());
    Ok(())
}
