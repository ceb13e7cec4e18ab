use crate::error::{EtlError, Result};
use crate::types::PartitionSpec;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

/// File-based configuration: the declared year partitions and the target
/// schema namespace. Credentials come from the environment, not this file.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(rename = "partition", default)]
    pub partitions: Vec<PartitionConfig>,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema: default_schema(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PartitionConfig {
    pub year: String,
    pub file: PathBuf,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!("Failed to read config file '{path}': {e}"))
        })?;
        Self::load_from_str(&content)
    }

    fn load_from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;

        if config.partitions.is_empty() {
            return Err(EtlError::Config(
                "No partitions declared in configuration".to_string(),
            ));
        }
        for partition in &config.partitions {
            // Partition years name relations, so keep them strictly 4 digits
            if partition.year.len() != 4 || !partition.year.chars().all(|c| c.is_ascii_digit()) {
                return Err(EtlError::Config(format!(
                    "Invalid partition year '{}', expected 4 digits",
                    partition.year
                )));
            }
        }
        Ok(config)
    }

    /// Build the partition descriptors once, in declared order.
    pub fn partition_specs(&self) -> Vec<PartitionSpec> {
        self.partitions
            .iter()
            .map(|p| PartitionSpec::new(p.year.clone(), p.file.clone()))
            .collect()
    }
}

/// Store connection settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub schema: String,
}

impl DatabaseConfig {
    pub fn from_env(schema: &str) -> Result<Self> {
        Ok(Self {
            user: required_env("DB_USER")?,
            password: required_env("DB_PASSWORD")?,
            host: required_env("DB_HOST")?,
            port: match env::var("DB_PORT") {
                Ok(value) => value.parse().map_err(|_| {
                    EtlError::Config(format!("Invalid DB_PORT '{value}'"))
                })?,
                Err(_) => 5432,
            },
            name: required_env("DB_NAME")?,
            schema: schema.to_string(),
        })
    }

    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

fn required_env(key: &str) -> Result<String> {
    env::var(key).map_err(|_| EtlError::Config(format!("{key} environment variable not set")))
}
