//! Configuration management for ctrlhost
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::commands::{CustomOscCommand, MidiCommand};
use crate::module::ModuleSettings;
use crate::value::ValueType;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub module: ModuleConfig,
    #[serde(default)]
    pub devices: DeviceConfig,
    /// Where the module snapshot is kept between runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
    /// How long an activity trigger stays lit
    #[serde(default = "default_activity_hold")]
    pub activity_hold_ms: u64,
    /// Commands sent once the output is bound
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub startup: Vec<MidiCommand>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub osc_commands: Vec<OscCommandConfig>,
}

/// Module identity and switches
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModuleConfig {
    #[serde(default = "default_module_name")]
    pub name: String,
    #[serde(flatten)]
    pub settings: ModuleSettings,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            name: default_module_name(),
            settings: ModuleSettings::default(),
        }
    }
}

/// Port name patterns (case-insensitive substring match)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// An OSC command with typed arguments
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OscCommandConfig {
    pub address: String,
    /// Type descriptors, e.g. `["string", "float"]`
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Registry key whose updates drive the mapping argument, e.g. `"[1] CC7"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl OscCommandConfig {
    pub fn build(&self) -> Result<CustomOscCommand> {
        CustomOscCommand::with_argument_types(&self.address, &self.arguments)
            .with_context(|| format!("Invalid arguments for OSC command '{}'", self.address))
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.module.name.trim().is_empty() {
            anyhow::bail!("Module name cannot be empty");
        }

        for (idx, command) in self.startup.iter().enumerate() {
            validate_midi_command(command).with_context(|| format!("Invalid startup command {} ({})", idx, command))?;
        }

        for osc in &self.osc_commands {
            if !osc.address.starts_with('/') {
                anyhow::bail!("OSC address '{}' must start with '/'", osc.address);
            }
            for tag in &osc.arguments {
                if ValueType::from_descriptor(tag).is_none() {
                    anyhow::bail!("OSC command '{}' has unknown argument type '{}'", osc.address, tag);
                }
            }
        }

        Ok(())
    }
}

fn validate_midi_command(command: &MidiCommand) -> Result<()> {
    if let Some(channel) = command.channel() {
        if !(1..=16).contains(&channel) {
            anyhow::bail!("channel {} is invalid (must be 1-16)", channel);
        }
    }

    let data: Vec<u8> = match command {
        MidiCommand::NoteOn { pitch, velocity, .. } | MidiCommand::FullNote { pitch, velocity, .. } => {
            vec![*pitch, *velocity]
        }
        MidiCommand::NoteOff { pitch, .. } => vec![*pitch],
        MidiCommand::ControlChange { number, value, .. } => vec![*number, *value],
        MidiCommand::SysEx { data } => data.clone(),
    };
    if let Some(byte) = data.iter().find(|b| **b > 127) {
        anyhow::bail!("data byte {} is out of range (must be 0-127)", byte);
    }
    Ok(())
}

fn default_module_name() -> String {
    "midi".to_string()
}

fn default_activity_hold() -> u64 {
    200
}
