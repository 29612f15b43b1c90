//! Module state snapshots
//!
//! Saves the module record (registry values, enabled flag) and the argument
//! values of custom OSC commands to a JSON file so they survive restarts.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::commands::CustomOscCommand;
use crate::module::MidiModule;

/// Snapshot of one module and its OSC commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    /// Snapshot creation time (milliseconds since epoch)
    pub timestamp: i64,
    /// Snapshot format version
    pub version: String,
    /// Record produced by [`MidiModule::to_record`]
    pub module: Value,
    /// Records produced by [`CustomOscCommand::to_record`]
    #[serde(default)]
    pub osc_commands: Vec<Value>,
}

impl ModuleSnapshot {
    /// Current snapshot format version
    pub const VERSION: &'static str = "1.0.0";

    pub fn capture(module: &MidiModule, osc_commands: &[CustomOscCommand]) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            version: Self::VERSION.to_string(),
            module: module.to_record(),
            osc_commands: osc_commands.iter().map(CustomOscCommand::to_record).collect(),
        }
    }

    /// Restore the module, and every command whose address appears in the
    /// snapshot
    pub fn restore(&self, module: &mut MidiModule, osc_commands: &mut [CustomOscCommand]) {
        if self.version != Self::VERSION {
            warn!("Snapshot version {} differs from {}", self.version, Self::VERSION);
        }

        module.load_record(&self.module);

        for command in osc_commands.iter_mut() {
            let saved = self
                .osc_commands
                .iter()
                .find(|r| r.get("address").and_then(Value::as_str) == Some(command.address.as_str()));
            if let Some(record) = saved {
                command.load_record(record);
            }
        }
    }

    /// Save snapshot to JSON file
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).context("Failed to serialize module snapshot")?;

        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write module snapshot to {}", path.display()))?;

        debug!("Module snapshot saved to: {}", path.display());
        Ok(())
    }

    /// Load snapshot from JSON file
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read module snapshot {}", path.display()))?;

        let snapshot: ModuleSnapshot =
            serde_json::from_str(&json).context("Failed to parse module snapshot JSON")?;

        debug!(
            "Module snapshot loaded (version: {}, timestamp: {})",
            snapshot.version, snapshot.timestamp
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityTracker;
    use crate::midi::MidiMessage;
    use crate::module::ModuleSettings;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn module() -> MidiModule {
        let (module, _rx) = MidiModule::new(
            "midi",
            ModuleSettings { auto_add: true, ..Default::default() },
            Arc::new(ActivityTracker::new(100, None)),
        );
        module
    }

    #[tokio::test]
    async fn test_snapshot_save_load() {
        let mut source = module();
        source.handle_message(&MidiMessage::ControlChange { channel: 1, cc: 10, value: 64 });
        source.handle_message(&MidiMessage::NoteOn { channel: 0, note: 60, velocity: 90 });

        let mut fader = CustomOscCommand::with_argument_types("/fader", &["string", "float"]).unwrap();
        fader.set_mapped_value(0.75);

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();
        ModuleSnapshot::capture(&source, std::slice::from_ref(&fader))
            .save_to_file(path)
            .await
            .unwrap();

        let mut target = module();
        let mut commands = vec![
            CustomOscCommand::with_argument_types("/fader", &["string", "float"]).unwrap(),
            CustomOscCommand::with_argument_types("/other", &["int"]).unwrap(),
        ];
        let snapshot = ModuleSnapshot::load_from_file(path).await.unwrap();
        assert_eq!(snapshot.version, ModuleSnapshot::VERSION);
        snapshot.restore(&mut target, &mut commands);

        assert_eq!(target.registry(), source.registry());
        assert_eq!(target.registry().value("[2] CC10"), Some(64));
        assert_eq!(commands[0].build_message(), fader.build_message());
        assert_eq!(commands[1].build_message().args.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ModuleSnapshot::load_from_file(dir.path().join("missing.json")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "{ not json").unwrap();
        assert!(ModuleSnapshot::load_from_file(temp_file.path()).await.is_err());
    }
}
