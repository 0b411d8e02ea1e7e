//! Template settings loaded from a TOML file and `STENCIL_*` environment variables

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use stencil_common::{LogLevel, LogOptions};
use tracing::debug;

use crate::error::{SettingsError, SettingsResult};
use crate::identifier::{strip_special_prefix, TemplateIdentifierSyntax};

/// Default bound on concurrently running folder scans
pub const DEFAULT_MAX_CONCURRENT_SCANS: usize = 4;

const DEFAULT_ENV_PREFIX: &str = "STENCIL";

/// A special folder declared in settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialFolderSetting {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Settings for the template subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Application-wide fallback template root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_template_folder: Option<PathBuf>,
    /// Workspace whose `Templates` folder overrides the default root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_directory: Option<PathBuf>,
    /// Identifiers whose folder trees must exist
    pub required_templates: Vec<String>,
    pub max_concurrent_scans: usize,
    /// trace, debug, info, warn or error
    pub log_level: String,
    pub special_folders: Vec<SpecialFolderSetting>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            default_template_folder: None,
            workspace_directory: None,
            required_templates: Vec::new(),
            max_concurrent_scans: DEFAULT_MAX_CONCURRENT_SCANS,
            log_level: "info".to_string(),
            special_folders: Vec::new(),
        }
    }
}

impl TemplateSettings {
    /// Logging options for [`stencil_common::init_logging`]
    pub fn log_options(&self) -> SettingsResult<LogOptions> {
        let level: LogLevel = self
            .log_level
            .parse()
            .map_err(|e| SettingsError::Validation(format!("{}", e)))?;
        Ok(LogOptions {
            level,
            ..LogOptions::default()
        })
    }
}

/// Loads, saves and validates [`TemplateSettings`]
pub struct SettingsManager {
    settings_path: PathBuf,
    env_prefix: String,
}

impl SettingsManager {
    /// Manager for the default settings file
    pub fn new() -> Self {
        Self::with_path(Self::default_settings_path())
    }

    /// Manager for a specific settings file
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            settings_path: path,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Read environment overrides from `<prefix>_*` instead of `STENCIL_*`
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// `<config dir>/stencil/templates.toml`
    pub fn default_settings_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stencil")
            .join("templates.toml")
    }

    /// Load settings: defaults, then the file if present, then environment.
    /// The result is validated.
    pub fn load(&self) -> SettingsResult<TemplateSettings> {
        let builder = Config::builder()
            .add_source(
                File::from(self.settings_path.clone())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("required_templates"),
            );

        let settings: TemplateSettings = builder.build()?.try_deserialize()?;
        self.validate(&settings)?;
        debug!(path = %self.settings_path.display(), "Loaded template settings");
        Ok(settings)
    }

    /// Write settings as TOML, creating the parent directory
    pub fn save(&self, settings: &TemplateSettings) -> SettingsResult<()> {
        let toml = toml::to_string(settings)?;
        if let Some(parent) = self.settings_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.settings_path, toml)?;
        debug!(path = %self.settings_path.display(), "Saved template settings");
        Ok(())
    }

    pub fn validate(&self, settings: &TemplateSettings) -> SettingsResult<()> {
        if settings.max_concurrent_scans == 0 {
            return Err(SettingsError::Validation(
                "max_concurrent_scans must be greater than 0".to_string(),
            ));
        }

        settings.log_options()?;

        for folder in &settings.special_folders {
            let name = strip_special_prefix(&folder.name);
            if !TemplateIdentifierSyntax::is_valid_template_name(name) {
                return Err(SettingsError::Validation(format!(
                    "Invalid special folder name '{}'",
                    folder.name
                )));
            }
        }

        for identifier in &settings.required_templates {
            let parsed = TemplateIdentifierSyntax::parse(identifier);
            if !parsed.is_valid() {
                return Err(SettingsError::Validation(format!(
                    "Invalid required template '{}': {}",
                    identifier,
                    parsed.error_message().unwrap_or_default()
                )));
            }
        }
        Ok(())
    }
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new()
    }
}
