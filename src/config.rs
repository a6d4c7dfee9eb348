//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/downline/downline.toml`
//! 3. Local config: file passed with `--config`
//! 4. Environment variables: `DOWNLINE_*` prefix, `__` between sections

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::Policy;

/// Raw policy for intermediate parsing. `None` means "not specified, inherit".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawPolicy {
    pub earning_unit: Option<u64>,
    pub distribution_depth: Option<usize>,
    pub terminal_level: Option<u32>,
    pub report_depth: Option<usize>,
    pub search_limit: Option<usize>,
    pub company_payment: Option<u64>,
    pub cascade_limit: Option<usize>,
    pub empty_search_is_not_found: Option<bool>,
    pub evaluate_grand_sponsor: Option<bool>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub data_file: Option<PathBuf>,
    pub policy: RawPolicy,
}

fn merge_policy(base: &Policy, overlay: &RawPolicy) -> Policy {
    Policy {
        earning_unit: overlay.earning_unit.unwrap_or(base.earning_unit),
        distribution_depth: overlay
            .distribution_depth
            .unwrap_or(base.distribution_depth),
        terminal_level: overlay.terminal_level.unwrap_or(base.terminal_level),
        report_depth: overlay.report_depth.unwrap_or(base.report_depth),
        search_limit: overlay.search_limit.unwrap_or(base.search_limit),
        company_payment: overlay.company_payment.unwrap_or(base.company_payment),
        cascade_limit: overlay.cascade_limit.or(base.cascade_limit),
        empty_search_is_not_found: overlay
            .empty_search_is_not_found
            .unwrap_or(base.empty_search_is_not_found),
        evaluate_grand_sponsor: overlay
            .evaluate_grand_sponsor
            .unwrap_or(base.evaluate_grand_sponsor),
    }
}

/// Unified configuration for downline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// JSON snapshot holding members, achievers and the company ledger
    pub data_file: PathBuf,
    /// Earnings and promotion rules
    pub policy: Policy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            policy: Policy::default(),
        }
    }
}

/// Default snapshot location in the platform data directory.
fn default_data_file() -> PathBuf {
    ProjectDirs::from("", "", "downline")
        .map(|dirs| dirs.data_dir().join("downline.json"))
        .unwrap_or_else(|| PathBuf::from("~/.downline/downline.json"))
}

/// Get the XDG config directory for downline.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "downline").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("downline.toml"))
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the input as is.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    shellexpand::full(raw.as_ref())
        .map(|s| PathBuf::from(s.into_owned()))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    fn expand_paths(&mut self) {
        self.data_file = expand_path(&self.data_file);
    }

    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            data_file: overlay
                .data_file
                .clone()
                .unwrap_or_else(|| self.data_file.clone()),
            policy: merge_policy(&self.policy, &overlay.policy),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_config` - Optional config file, must exist when given
    pub fn load(local_config: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("global config: {}", global_path.display());
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(local) = local_config {
            let local = expand_path(local);
            debug!("local config: {}", local.display());
            let raw = load_raw_settings(&local)?;
            current = current.merge_with(&raw);
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;
        Ok(current)
    }

    /// Apply DOWNLINE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("DOWNLINE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("data_file") {
            settings.data_file = PathBuf::from(val);
        }
        let policy = &mut settings.policy;
        if let Ok(val) = config.get::<u64>("policy.earning_unit") {
            policy.earning_unit = val;
        }
        if let Ok(val) = config.get::<usize>("policy.distribution_depth") {
            policy.distribution_depth = val;
        }
        if let Ok(val) = config.get::<u32>("policy.terminal_level") {
            policy.terminal_level = val;
        }
        if let Ok(val) = config.get::<usize>("policy.report_depth") {
            policy.report_depth = val;
        }
        if let Ok(val) = config.get::<usize>("policy.search_limit") {
            policy.search_limit = val;
        }
        if let Ok(val) = config.get::<u64>("policy.company_payment") {
            policy.company_payment = val;
        }
        if let Ok(val) = config.get::<usize>("policy.cascade_limit") {
            policy.cascade_limit = Some(val);
        }
        if let Ok(val) = config.get_bool("policy.empty_search_is_not_found") {
            policy.empty_search_is_not_found = val;
        }
        if let Ok(val) = config.get_bool("policy.evaluate_grand_sponsor") {
            policy.evaluate_grand_sponsor = val;
        }

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.policy.terminal_level == 0 {
            return Err(config_message("policy.terminal_level must be at least 1"));
        }
        if self.policy.search_limit == 0 {
            return Err(config_message("policy.search_limit must be at least 1"));
        }
        if self.policy.cascade_limit == Some(0) {
            return Err(config_message("policy.cascade_limit must be at least 1"));
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# downline configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/downline/downline.toml
#   Local:  file given with --config
#   Env:    DOWNLINE_* environment variables, e.g. DOWNLINE_POLICY__EARNING_UNIT=100

# Snapshot file with members, achievers and the company ledger
# data_file = "~/.local/share/downline/downline.json"

[policy]
# Credit per upline and registration
# earning_unit = 100

# Uplines credited per registration
# distribution_depth = 8

# Members promoted past this level become achievers
# terminal_level = 9

# Levels shown by `downline tree`
# report_depth = 8

# Maximum search hits
# search_limit = 10

# Lump sum paid into the company ledger by `downline pay`
# company_payment = 1000

# Maximum promotion steps per saturation event (unset = up to the root)
# cascade_limit = 3

# Report an empty search as an error
# empty_search_is_not_found = true

# Also evaluate the sponsor's sponsor after a registration
# evaluate_grand_sponsor = true
"#
        .to_string()
    }
}

fn config_message(message: &str) -> ApplicationError {
    ApplicationError::Config {
        message: message.to_string(),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
