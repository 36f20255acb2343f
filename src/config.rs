// Copyright 2026 GattLink Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bluetooth::ScanGating;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network settings.
    pub network: NetworkConfig,

    /// Advertisement scan settings.
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the bridge listens on for client connections.
    pub bind: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:20111".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Peripherals at or above this RSSI are considered in range.
    pub in_range_dbm: i16,

    /// Hysteresis below the in-range threshold before a peripheral is
    /// considered out of range.
    pub hysteresis_db: i16,

    /// Milliseconds of silence before a peripheral is considered gone.
    pub out_of_range_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            in_range_dbm: -70,
            hysteresis_db: 5,
            out_of_range_timeout_ms: 2000,
        }
    }
}

impl ScanConfig {
    /// Signal gating handed to the hardware provider.
    pub fn gating(&self) -> ScanGating {
        ScanGating {
            in_range_dbm: self.in_range_dbm,
            out_of_range_dbm: self.in_range_dbm - self.hysteresis_db,
            out_of_range_timeout: Duration::from_millis(self.out_of_range_timeout_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gattlink");

        std::fs::create_dir_all(&config_dir)?;

        Self::load_from(&config_dir.join("config.toml"))
    }

    /// Load configuration from a specific path, writing the defaults
    /// there on first run.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config = if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            toml::from_str(&content)?
        } else {
            let config = Self::default();
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(config_path, content)?;
            config
        };

        Ok(config)
    }

    /// Save configuration to file.
    #[allow(dead_code)]
    pub fn save(&self) -> Result<()> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gattlink");

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.network.bind, "127.0.0.1:20111");

        let gating = config.scan.gating();
        assert_eq!(gating.in_range_dbm, -70);
        assert_eq!(gating.out_of_range_dbm, -75);
        assert_eq!(gating.out_of_range_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("[scan]\nin_range_dbm = -60\n").unwrap();
        assert_eq!(config.scan.in_range_dbm, -60);
        assert_eq!(config.scan.hysteresis_db, 5);
        assert_eq!(config.network.bind, "127.0.0.1:20111");
    }

    #[test]
    fn test_load_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.network.bind, "127.0.0.1:20111");

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.scan.in_range_dbm, created.scan.in_range_dbm);
    }
}
