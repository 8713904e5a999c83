use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wizard: WizardConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub submit: SubmitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wizard timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Quiet period in milliseconds before an inline field check runs (default: 300)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Milliseconds between an unsaved edit and the auto-save (default: 1000)
    #[serde(default = "default_autosave_delay_ms")]
    pub autosave_delay_ms: u64,
    /// Drafts older than this many hours are discarded at startup (default: 168, 0 = never)
    #[serde(default = "default_max_draft_age_hours")]
    pub max_draft_age_hours: u64,
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_autosave_delay_ms() -> u64 {
    1000
}

fn default_max_draft_age_hours() -> u64 {
    168 // one week
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            autosave_delay_ms: default_autosave_delay_ms(),
            max_draft_age_hours: default_max_draft_age_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// State directory holding drafts and logs
    #[serde(default = "default_state_path")]
    pub state: String,
    /// Subdirectory of `state` for draft files
    #[serde(default = "default_drafts_path")]
    pub drafts: String,
    /// Directory of user form definitions (`*.json` / `*.toml`)
    #[serde(default = "default_forms_path")]
    pub forms: String,
}

fn default_state_path() -> String {
    ".regwiz".to_string()
}

fn default_drafts_path() -> String {
    "drafts".to_string()
}

fn default_forms_path() -> String {
    "forms".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state: default_state_path(),
            drafts: default_drafts_path(),
            forms: default_forms_path(),
        }
    }
}

/// Where completed registrations go
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    /// Registration endpoint; when unset the CLI prints the submission instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_submit_timeout")]
    pub timeout_secs: u64,
}

fn default_submit_timeout() -> u64 {
    30
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_submit_timeout(),
        }
    }
}

impl SubmitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to a file under the state directory instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Project-local config file
    pub fn local_config_path() -> PathBuf {
        PathBuf::from("regwiz.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so regwiz works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let local_config = Self::local_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // User config in ~/.config/regwiz/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("regwiz").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with REGWIZ_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("REGWIZ")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to ./regwiz.toml
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::local_config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        absolute(&self.paths.state)
    }

    /// Directory holding one JSON file per draft key
    pub fn drafts_path(&self) -> PathBuf {
        self.state_path().join(&self.paths.drafts)
    }

    /// Get absolute path to the user forms directory
    pub fn forms_path(&self) -> PathBuf {
        absolute(&self.paths.forms)
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}

fn absolute(path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}
