//! Configuration file watcher for hot-reload support

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::AppConfig;

/// Delay between a file event and the reload, so writes can complete
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Config watcher that reloads the file on change and forwards new configs
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<AppConfig>,
}

impl ConfigWatcher {
    /// Load the config at `config_path` and start watching it
    pub async fn new(config_path: String) -> Result<(Self, Arc<AppConfig>)> {
        let (tx, rx) = mpsc::channel(10);

        let initial_config = AppConfig::load(&config_path)
            .await
            .context("Failed to load initial config")?;
        let initial_config = Arc::new(initial_config);

        // Editors often emit several events per save; only forward real changes
        let last_sent = Arc::new(Mutex::new((*initial_config).clone()));

        let config_path_clone = config_path.clone();

        // notify callbacks run on their own OS thread, outside the runtime
        let runtime_handle = tokio::runtime::Handle::current();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                debug!("Config file changed: {:?}", event.paths);

                let config_path = config_path_clone.clone();
                let tx = tx.clone();
                let last_sent = last_sent.clone();

                runtime_handle.spawn(async move {
                    tokio::time::sleep(DEBOUNCE).await;

                    match AppConfig::load(&config_path).await {
                        Ok(new_config) => {
                            {
                                let mut last = last_sent.lock();
                                if *last == new_config {
                                    debug!("Config unchanged, skipping reload");
                                    return;
                                }
                                *last = new_config.clone();
                            }
                            info!("Configuration reloaded successfully");
                            if let Err(e) = tx.send(new_config).await {
                                error!("Failed to send config update: {}", e);
                            }
                        }
                        Err(e) => {
                            warn!("Failed to reload config (keeping old config): {:#}", e);
                        }
                    }
                });
            }
            Err(e) => {
                error!("Watch error: {}", e);
            }
        })?;

        watcher
            .watch(Path::new(&config_path), RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config file: {}", config_path))?;

        info!("Config file watcher started for: {}", config_path);

        Ok((Self { _watcher: watcher, rx }, initial_config))
    }

    /// Wait for the next config update
    /// Returns None if the watcher has been closed
    pub async fn next_config(&mut self) -> Option<AppConfig> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reload_on_device_change() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("ctrlhost.yaml");

        fs::write(&config_path, "devices:\n  input: \"nanoKONTROL\"\n")?;

        let (mut watcher, config) = ConfigWatcher::new(config_path.to_string_lossy().to_string()).await?;
        assert_eq!(config.devices.input.as_deref(), Some("nanoKONTROL"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        fs::write(&config_path, "devices:\n  input: \"Launch Control\"\n  output: \"loopMIDI\"\n")?;

        let new_config = tokio::time::timeout(Duration::from_secs(2), watcher.next_config())
            .await?
            .ok_or_else(|| anyhow::anyhow!("watcher closed before the reload arrived"))?;

        assert_eq!(new_config.devices.input.as_deref(), Some("Launch Control"));
        assert_eq!(new_config.devices.output.as_deref(), Some("loopMIDI"));

        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_initial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.yaml");
        fs::write(&config_path, "module:\n  name: \"\"\n").unwrap();

        let result = ConfigWatcher::new(config_path.to_string_lossy().to_string()).await;
        assert!(result.is_err());
    }
}
