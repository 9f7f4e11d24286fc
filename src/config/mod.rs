use crate::models::StudioSettings;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Settings file inside the config directory
pub const SETTINGS_FILE_NAME: &str = "PhotoMuse Config.yaml";

/// Prefix for environment overrides, e.g. `PHOTOMUSE_CHAT_MODEL`
pub const ENV_PREFIX: &str = "PHOTOMUSE";

/// Configuration manager for loading and saving the settings file.
///
/// Settings are layered: built-in defaults, then `PhotoMuse Config.yaml`, then
/// `PHOTOMUSE_*` environment variables.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing the settings file (e.g., "PhotoMuse Data")
    ///
    /// # Returns
    /// A new ConfigManager instance
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE_NAME),
            config_dir,
        })
    }

    /// Load settings from the file and the process environment.
    ///
    /// # Returns
    /// The merged settings; defaults when neither source sets a key
    pub fn load_settings(&self) -> Result<StudioSettings> {
        self.load_settings_with_env(None)
    }

    /// Load settings with an explicit set of environment variables.
    ///
    /// `None` reads the process environment. Passing a map keeps tests independent
    /// of the real environment.
    pub fn load_settings_with_env(
        &self,
        env: Option<config::Map<String, String>>,
    ) -> Result<StudioSettings> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let environment = Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(env);

        let settings = Config::builder()
            .add_source(
                File::from(self.settings_path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(environment)
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize::<StudioSettings>()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!(
            "Loaded settings: edit={}, generation={}, chat={}, timeout={}s",
            settings.edit_model,
            settings.generation_model,
            settings.chat_model,
            settings.request_timeout_secs
        );
        Ok(settings)
    }

    /// Save the settings file.
    ///
    /// # Arguments
    /// * `settings` - The settings to save
    pub fn save_settings(&self, settings: &StudioSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Write a default settings file when none exists.
    ///
    /// # Returns
    /// `true` if a file was written
    pub fn save_default_if_missing(&self) -> Result<bool> {
        if self.settings_path.exists() {
            return Ok(false);
        }
        self.save_settings(&StudioSettings::default())?;
        Ok(true)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
