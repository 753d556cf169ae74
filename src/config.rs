//! Configuration
//!
//! One TOML file with a section per subsystem. Every section and field
//! has a default, so a missing file or an empty file is a valid setup.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::alert::AlertConfig;
use crate::engine::EngineConfig;
use crate::flow::FlowConfig;
use crate::ml::AnomalyConfig;
use crate::signatures::SignatureConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub flow: FlowConfig,
    pub signatures: SignatureConfig,
    pub anomaly: AnomalyConfig,
    pub engine: EngineConfig,
    pub alerts: AlertConfig,
}

impl Config {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {path:?}"))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config file {path:?}"))?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from a file when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
