//! ctrlhost - MIDI module host
//!
//! Binds one MIDI module to the ports named in the config, keeps its value
//! registry up to date and turns registry updates into OSC messages.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ctrlhost::activity::ActivityTracker;
use ctrlhost::commands::CustomOscCommand;
use ctrlhost::config::{AppConfig, ConfigWatcher, DeviceConfig};
use ctrlhost::devices::midir_ports::{list_ports, scan_devices};
use ctrlhost::devices::DeviceTable;
use ctrlhost::module::{MidiModule, ModuleEvent};
use ctrlhost::persistence::ModuleSnapshot;
use ctrlhost::value::ValueType;

/// Client name announced to the OS MIDI layer
const CLIENT_NAME: &str = "ctrlhost";

/// ctrlhost - MIDI device binding, value registry and OSC mapping
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "ctrlhost.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Snapshot file (overrides `state_file` from the config)
    #[arg(long)]
    state: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        list_ports_formatted()?;
        return Ok(());
    }

    info!("Starting ctrlhost...");
    info!("Configuration file: {}", args.config);

    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let config = (*initial_config).clone();
    let state_file = args.state.clone().or_else(|| config.state_file.clone());

    run_app(config, config_watcher, state_file, shutdown_signal()).await?;

    info!("ctrlhost shutdown complete");
    Ok(())
}

async fn run_app(
    mut config: AppConfig,
    mut config_watcher: ConfigWatcher,
    state_file: Option<String>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let devices = scan_devices(CLIENT_NAME).context("Failed to scan MIDI ports")?;
    info!(
        "Found {} MIDI inputs, {} MIDI outputs",
        devices.input_ids().count(),
        devices.output_ids().count()
    );

    let activity = Arc::new(ActivityTracker::new(config.activity_hold_ms, None));
    let (mut module, mut inbound_rx) =
        MidiModule::new(config.module.name.clone(), config.module.settings.clone(), activity);

    // Module events are drained by the loop below
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ModuleEvent>();
    module.subscribe(Arc::new(move |event: &ModuleEvent| {
        let _ = event_tx.send(event.clone());
    }));

    let mut osc_commands = build_osc_commands(&config)?;

    if let Some(path) = &state_file {
        if Path::new(path).exists() {
            match ModuleSnapshot::load_from_file(path).await {
                Ok(snapshot) => {
                    snapshot.restore(&mut module, &mut osc_commands);
                    info!("Restored {} values from {}", module.registry().len(), path);
                }
                Err(e) => warn!("Ignoring snapshot: {:#}", e),
            }
        }
    }

    bind_devices(&mut module, &config.devices, &devices);

    for command in &config.startup {
        debug!("Startup command: {}", command);
        module.execute(&devices, command);
    }

    info!("Ready to process MIDI events!");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(inbound) = inbound_rx.recv() => {
                module.handle_inbound(&inbound);
            }

            Some(event) = event_rx.recv() => {
                on_module_event(&event, &config, &mut osc_commands);
            }

            Some(new_config) = config_watcher.next_config() => {
                info!("Configuration file changed, applying...");
                match apply_config(&mut module, &config, &new_config, &devices) {
                    Ok(Some(commands)) => osc_commands = commands,
                    Ok(None) => {}
                    Err(e) => {
                        warn!("Failed to apply config (keeping old config): {:#}", e);
                        continue;
                    }
                }
                config = new_config;
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    if let Some(path) = &state_file {
        ModuleSnapshot::capture(&module, &osc_commands)
            .save_to_file(path)
            .await?;
        info!("Module state saved to {}", path);
    }
    module.shutdown(&devices);

    Ok(())
}

fn build_osc_commands(config: &AppConfig) -> Result<Vec<CustomOscCommand>> {
    config.osc_commands.iter().map(|c| c.build()).collect()
}

/// Resolve the configured port patterns and rebind the module
fn bind_devices(module: &mut MidiModule, wanted: &DeviceConfig, devices: &DeviceTable) {
    let selector = devices.select(wanted.input.as_deref(), wanted.output.as_deref());

    if let (Some(pattern), None) = (&wanted.input, &selector.input) {
        warn!("No MIDI input matches '{}'", pattern);
    }
    if let (Some(pattern), None) = (&wanted.output, &selector.output) {
        warn!("No MIDI output matches '{}'", pattern);
    }

    match module.set_selector(selector, devices) {
        Ok(availability) => info!(
            "{}: input={:?} output={:?} (receive: {}, send: {})",
            module.name(),
            module.selector().input.as_ref().map(|d| d.as_str()),
            module.selector().output.as_ref().map(|d| d.as_str()),
            availability.can_receive,
            availability.can_send
        ),
        Err(e) => warn!("{}: {}", module.name(), e),
    }
}

/// Apply a reloaded config; returns the rebuilt OSC commands if they changed
fn apply_config(
    module: &mut MidiModule,
    old: &AppConfig,
    new: &AppConfig,
    devices: &DeviceTable,
) -> Result<Option<Vec<CustomOscCommand>>> {
    let commands = if new.osc_commands != old.osc_commands {
        Some(build_osc_commands(new)?)
    } else {
        None
    };

    if new.module.name != old.module.name {
        warn!("Module rename requires a restart ('{}' kept)", module.name());
    }
    if new.module.settings != old.module.settings {
        module.set_settings(new.module.settings.clone());
        info!("Module settings updated");
    }
    if new.devices != old.devices {
        bind_devices(module, &new.devices, devices);
    }

    Ok(commands)
}

/// Feed registry updates into the OSC commands that map them
fn on_module_event(event: &ModuleEvent, config: &AppConfig, osc_commands: &mut [CustomOscCommand]) {
    match event {
        ModuleEvent::RegistryUpdated { key, value, created } => {
            if *created {
                info!("New value: {} = {}", key, value);
            }
            let routes = config.osc_commands.iter().zip(osc_commands.iter_mut());
            for (route, command) in routes {
                if route.source.as_deref() != Some(key.as_str()) {
                    continue;
                }
                let mapped = match command.mapping_argument().map(|a| a.value_type()) {
                    Some(ValueType::Float) | Some(ValueType::Bool) => *value as f64 / 127.0,
                    _ => *value as f64,
                };
                if command.set_mapped_value(mapped) {
                    info!("OSC -> {}", command.build_message());
                }
            }
        }
        ModuleEvent::AvailabilityChanged(availability) => {
            debug!("Availability: {:?}", availability);
        }
        ModuleEvent::Activity(_) => {}
    }
}

fn list_ports_formatted() -> Result<()> {
    use colored::*;

    let (inputs, outputs) = list_ports(CLIENT_NAME).context("Failed to list MIDI ports")?;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    println!("\n{}", "Input Ports:".bold());
    if inputs.is_empty() {
        println!("  {}", "No input ports found".dimmed());
    }
    for (i, name) in inputs.iter().enumerate() {
        println!("  {} {}", format!("[{}]", i).green(), name);
    }

    println!("\n{}", "Output Ports:".bold());
    if outputs.is_empty() {
        println!("  {}", "No output ports found".dimmed());
    }
    for (i, name) in outputs.iter().enumerate() {
        println!("  {} {}", format!("[{}]", i).green(), name);
    }

    println!();
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
}
