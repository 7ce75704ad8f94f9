use crate::registry::{opaque_decoder, ControlRegistry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// How decoded controls are printed by the command-line tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Rust `{:#?}` representation.
    #[default]
    Debug,
    Json,
    Yaml,
    /// One summary line per control.
    Text,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output format: debug (default), json, yaml.
    pub output: OutputFormat,
    /// OIDs removed from the registry at start-up; they decode as unknown controls.
    pub disabled_oids: Vec<String>,
    /// OIDs registered with the pass-through decoder; the value is kept untyped.
    pub opaque_oids: Vec<String>,
    /// Печатать метрики кодека (формат Prometheus) после выполнения команды.
    pub metrics: bool,
    /// Also decode Persistent Search and Entry Change Notification controls.
    pub extended: bool,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content).context("Invalid config YAML")?;
        Ok(config)
    }

    /// Applies the OID overrides to `registry`. Extended decoders go in first,
    /// so the OID lists can still disable them or make them opaque. Opaque
    /// registrations run after removals, so an OID listed in both ends up opaque.
    pub fn apply(&self, registry: &ControlRegistry) -> Result<()> {
        if self.extended {
            registry.register_extended();
        }
        for oid in &self.disabled_oids {
            registry.unregister(oid);
        }
        for oid in &self.opaque_oids {
            registry
                .register(oid.clone(), opaque_decoder())
                .with_context(|| format!("Failed to register opaque decoder for {}", oid))?;
        }
        if !self.disabled_oids.is_empty() || !self.opaque_oids.is_empty() {
            info!(
                "Applied control overrides: {} disabled, {} opaque",
                self.disabled_oids.len(),
                self.opaque_oids.len()
            );
        }
        Ok(())
    }
}
