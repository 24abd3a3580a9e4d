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

//! Command line configuration

use anyhow::{Context, Result};
use dotheap_core::{Reachability, SnapshotConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "DOTHEAP_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotheapConfig {
    pub analysis: SnapshotConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Maximum number of rows in listings
    pub limit: usize,
    /// Strings longer than this are cut when printed
    pub max_string_chars: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            limit: 20,
            max_string_chars: 200,
        }
    }
}

impl DotheapConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// File from `--config`, else from `$DOTHEAP_CONFIG`, else defaults.
    /// Command line flags override file values.
    pub fn resolve_config(cli_config: Option<PathBuf>, cli_retained: Option<Reachability>, cli_format: Option<OutputFormat>) -> Result<Self> {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Ok(env_config) = std::env::var(CONFIG_ENV) {
            Self::load_from_file(env_config)?
        } else {
            Self::default()
        };

        if let Some(retained) = cli_retained {
            config.analysis.retained = retained;
        }
        if let Some(format) = cli_format {
            config.output.format = format;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DotheapConfig::default();
        assert_eq!(config.analysis.retained, Reachability::Strong);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.output.limit, 20);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[analysis]\nretained = \"soft\"\n\n[output]\nlimit = 5").unwrap();

        let config = DotheapConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.analysis.retained, Reachability::Soft);
        assert!(!config.analysis.log_progress);
        assert_eq!(config.output.limit, 5);
        assert_eq!(config.output.max_string_chars, 200);
    }

    #[test]
    fn test_cli_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[analysis]\nretained = \"soft\"").unwrap();

        let config = DotheapConfig::resolve_config(Some(file.path().to_path_buf()), Some(Reachability::Weak), Some(OutputFormat::Json)).unwrap();
        assert_eq!(config.analysis.retained, Reachability::Weak);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = DotheapConfig::load_from_file("/nonexistent/dotheap.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
