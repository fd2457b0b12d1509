use crate::models::{Provider, SccConfig};
use crate::services::ProviderRegistry;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Configuration manager for the source control settings file.
///
/// Manages `Decoda SCC.yaml` (selected provider, caller name, last project,
/// extra providers) inside a configuration directory.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager, creating `config_dir` if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join("Decoda SCC.yaml"),
            config_dir,
        })
    }

    /// Load the configuration, or defaults if the file doesn't exist.
    pub fn load_config(&self) -> Result<SccConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Source control config not found at {}, using defaults",
                self.config_path
            );
            return Ok(SccConfig::default());
        }

        let file_contents = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: SccConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::info!("Loaded source control config from {}", self.config_path);
        Ok(config)
    }

    pub fn save_config(&self, config: &SccConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved source control config to {}", self.config_path);
        Ok(())
    }

    /// Installed providers plus the ones listed under `Extra Providers`.
    pub fn providers(&self, config: &SccConfig) -> ProviderRegistry {
        ProviderRegistry::global().merged(&config.source_control.extra_providers)
    }

    /// The provider the configuration selects, if it is available.
    pub fn selected_provider(&self, config: &SccConfig) -> Option<Provider> {
        let name = &config.source_control.provider;
        if name.is_empty() {
            return None;
        }
        self.providers(config).find(name).cloned()
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
