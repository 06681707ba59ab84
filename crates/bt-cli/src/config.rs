//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use bt_core::ProcessorOptions;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Event processor tunables.
    pub processor: ProcessorOptions,

    /// Print JSON instead of text unless a command says otherwise.
    pub json: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("solution_extensions", &self.processor.solution_extensions)
            .field("core_compile_target", &self.processor.core_compile_target)
            .field("json", &self.json)
            .finish()
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (BT_*, nested with `__`)
        figment = figment.merge(Env::prefixed("BT_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for bt.
///
/// On Linux: `~/.config/bt`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("bt"))
}
