//! Persistence: node configuration and the tracked-device registry.

pub mod config;
pub mod registry;
