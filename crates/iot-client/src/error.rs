//! Client error types

use thiserror::Error;

/// Errors raised by device command tables and behaviours
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("action {action} out of range (table has {count})")]
    UnknownAction { action: u8, count: usize },

    #[error("missing argument {name} at offset {offset} ({available} bytes received)")]
    MissingArgument {
        name: &'static str,
        offset: usize,
        available: usize,
    },

    #[error("invalid command table: {0}")]
    InvalidTable(String),

    #[error("unknown device type: {0}")]
    UnknownDeviceType(String),
}

/// Errors raised while loading or storing configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no stored configuration")]
    Missing,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("schema version {found} does not match {expected}")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
