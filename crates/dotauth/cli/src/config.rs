// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dotauth_core::AuthorityConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// JSON snapshot holding roles, permissions and grants
    pub data_file: PathBuf,
    pub log_level: String,
    pub authority: AuthorityConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_file: dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("dotauth").join("authority.json"),
            log_level: "warn".to_string(),
            authority: AuthorityConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn resolve_config(cli_config: Option<PathBuf>, cli_data_file: Option<PathBuf>) -> Result<Self> {
        Self::resolve_with(cli_config, cli_data_file, |key| std::env::var(key).ok())
    }

    /// Resolution order: `--config`, `$DOTAUTH_CONFIG`, then defaults with
    /// authority settings from the environment. `--data-file` beats
    /// `$DOTAUTH_DATA_FILE`, which beats the file.
    pub fn resolve_with<F>(cli_config: Option<PathBuf>, cli_data_file: Option<PathBuf>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Some(env_config) = lookup("DOTAUTH_CONFIG") {
            Self::load_from_file(env_config)?
        } else {
            Self {
                authority: AuthorityConfig::from_lookup(&lookup),
                ..Self::default()
            }
        };

        if let Some(data_file) = cli_data_file {
            config.data_file = data_file;
        } else if let Some(env_data_file) = lookup("DOTAUTH_DATA_FILE") {
            config.data_file = PathBuf::from(env_data_file);
        }

        if let Some(parent) = config.data_file.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(config)
    }

    /// Maximum log level, `warn` when the configured value is not a level
    pub fn max_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::WARN)
    }
}
