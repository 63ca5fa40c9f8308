use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::record::ValueCoercion;

#[derive(Debug, Deserialize, Clone)]
pub struct DocmaintConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    pub cosmos: CosmosConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default = "default_containers")]
    pub containers: Vec<ContainerConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CosmosConfig {
    pub endpoint: String,
    #[serde(default)]
    pub key: Option<String>,
    pub database: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl CosmosConfig {
    /// Account key from the config file, falling back to `COSMOS_KEY`.
    pub fn resolved_key(&self) -> String {
        self.key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("COSMOS_KEY").ok())
            .unwrap_or_default()
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_request_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub field_sampling: FieldSampling,
    #[serde(default)]
    pub value_coercion: ValueCoercion,
}

/// Which retrieved records contribute updatable fields for open containers.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldSampling {
    #[default]
    FirstRecord,
    AllRecords,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContainerShape {
    UsageRecord,
    Open,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContainerConfig {
    pub name: String,
    pub shape: ContainerShape,
}

fn default_containers() -> Vec<ContainerConfig> {
    vec![ContainerConfig {
        name: "UsageRecords".to_string(),
        shape: ContainerShape::UsageRecord,
    }]
}

impl DocmaintConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("DOCMAINT").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
