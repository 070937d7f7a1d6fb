//! Config file loading: a single `config.yaml` with `${VAR}` expansion
//! against the process environment.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub sqlite_path: String,
    pub blob_root: String,
}

fn default_bus_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: default_bus_capacity() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bus: BusConfig,
}

/// Expands `${VAR}` references against the process environment, missing
/// vars resolve to an empty string rather than failing the whole load.
pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let mut config: AppConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))?;

    config.storage.sqlite_path = resolve_env_var(&config.storage.sqlite_path);
    config.storage.blob_root = resolve_env_var(&config.storage.blob_root);

    Ok(config)
}

/// Writes a minimal default config next to `config_root` if one isn't
/// already there, so `serve` works on a bare config root without a
/// separate init step.
pub fn ensure_skeleton_config(config_root: &Path, port: u16) -> Result<AppConfig> {
    let path = config_root.join("config.yaml");
    if !path.exists() {
        fs::create_dir_all(config_root)
            .with_context(|| format!("failed to create config root: {}", config_root.display()))?;
        let skeleton = AppConfig {
            storage: StorageConfig {
                sqlite_path: config_root.join("acontext.db").display().to_string(),
                blob_root: config_root.join("blobs").display().to_string(),
            },
            server: ServerConfig { host: default_host(), port },
            bus: BusConfig::default(),
        };
        let yaml = serde_yaml::to_string(&skeleton)?;
        fs::write(&path, yaml)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        return Ok(skeleton);
    }
    load_config(&path)
}
