// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration for the analyzer.
//!
//! This module loads analysis settings and MIDI device selection from a
//! YAML or TOML file. Every field has a default, so an empty file is valid.

pub mod watcher;

pub use watcher::{validate_config, ConfigEvent, ConfigWatcher};

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::tracking::DEFAULT_MAXIMUM_NOTES;

/// File formats accepted by [`AnalyzerFile::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Format from the file extension; anything unrecognized is YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AnalyzerFile {
    /// Reducer and timing settings
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Input device selection
    #[serde(default)]
    pub midi: MidiDeviceConfig,
}

impl AnalyzerFile {
    /// Load a configuration file, choosing the format by extension
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config = match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => Self::from_yaml(&contents)?,
            ConfigFormat::Toml => Self::from_toml(&contents)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as null rather than an empty map
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse TOML configuration")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Save configuration to a file in the format its extension names
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => self.to_yaml()?,
            ConfigFormat::Toml => {
                toml::to_string(self).context("Failed to serialize configuration to TOML")?
            }
        };
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))
    }

    /// Reject values the session cannot run with
    pub fn validate(&self) -> Result<()> {
        if let Some(channel) = self.midi.input_channel {
            if !(1..=16).contains(&channel) {
                bail!("midi.input_channel must be 1-16, got {}", channel);
            }
        }
        Ok(())
    }
}

/// Reducer and timing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    /// How many recent pitch classes the scanner keeps
    #[serde(default = "default_maximum_notes")]
    pub maximum_notes: usize,
    /// Period of the duration refresh tick; 0 disables it
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Quiet period before reducer output is published
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_maximum_notes() -> usize {
    DEFAULT_MAXIMUM_NOTES
}
fn default_tick_interval_ms() -> u64 {
    250
}
fn default_debounce_ms() -> u64 {
    20
}

impl AnalysisConfig {
    pub fn tick_interval(&self) -> Option<Duration> {
        (self.tick_interval_ms > 0).then(|| Duration::from_millis(self.tick_interval_ms))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            maximum_notes: default_maximum_notes(),
            tick_interval_ms: default_tick_interval_ms(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// MIDI device configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MidiDeviceConfig {
    /// Substring of the port name to connect to
    #[serde(default)]
    pub device: Option<String>,
    /// Port index; takes precedence over `device`
    #[serde(default)]
    pub source: Option<usize>,
    /// Input channel filter (1-16), all channels when unset
    #[serde(default)]
    pub input_channel: Option<u8>,
}
