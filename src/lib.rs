//! ctrlhost - MIDI module core for a modular control host
//!
//! Binds a module to MIDI input/output devices chosen at runtime, records
//! every inbound note and controller value in a sorted registry, and drives
//! outgoing MIDI and OSC commands.

pub mod activity;
pub mod arguments;
pub mod commands;
pub mod config;
pub mod devices;
pub mod error;
pub mod items;
pub mod midi;
pub mod module;
pub mod persistence;
pub mod registry;
pub mod value;
