//! Unified error handling for Thermoctl
//!
//! This crate provides a single error type used across all Thermoctl components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using ThermoctlError
pub type Result<T> = std::result::Result<T, ThermoctlError>;

/// Unified error type for all Thermoctl operations
#[derive(thiserror::Error, Debug)]
pub enum ThermoctlError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Firmware Channel Errors
    // ============================================================================
    #[error("Failed to read firmware channel {channel}: {reason}")]
    ChannelRead {
        channel: String,
        reason: String,
    },

    #[error("Failed to write firmware channel {channel}: {reason}")]
    ChannelWrite {
        channel: String,
        reason: String,
    },

    #[error("Firmware interface not available: {0}")]
    FirmwareUnavailable(String),

    // ============================================================================
    // Sensor and GPU Errors
    // ============================================================================
    #[error("Failed to read sensor {sensor}: {reason}")]
    SensorRead {
        sensor: String,
        reason: String,
    },

    #[error("Hardware not found: {0}")]
    HardwareNotFound(String),

    #[error("GPU error: {0}")]
    GpuError(String),

    #[error("GPU backend not available")]
    GpuUnavailable,

    // ============================================================================
    // Configuration and Policy Errors
    // ============================================================================
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Curve validation failed: {0}")]
    InvalidCurve(String),

    #[error("Value {value} out of range for {field} ({min}..={max})")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl ThermoctlError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a channel read error
    pub fn channel_read(channel: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::ChannelRead {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a channel write error
    pub fn channel_write(channel: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::ChannelWrite {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a sensor read error
    pub fn sensor(sensor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SensorRead {
            sensor: sensor.into(),
            reason: reason.into(),
        }
    }

    /// Create a GPU error from a string
    pub fn gpu(msg: impl Into<String>) -> Self {
        Self::GpuError(msg.into())
    }

    /// Whether this error means "nothing to do here" rather than a real failure
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Self::GpuUnavailable | Self::NotSupported(_))
    }
}

// Allow converting from String to ThermoctlError
impl From<String> for ThermoctlError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to ThermoctlError
impl From<&str> for ThermoctlError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
