//! Configuration for the plotter driver
//!
//! Provides configuration file handling and validation.
//! Supports JSON and TOML file formats stored in platform-specific
//! directories.
//!
//! Configuration is organized into logical sections:
//! - Connection settings (port, baud rate, timeouts)
//! - Machine settings (per-axis step density and travel, speed limit,
//!   command buffer capacity)

use plotkit_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-axis machine parameters
///
/// Immutable once loaded; one instance per axis (x, y, z).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Conversion factor from millimeters to stepper pulses
    pub steps_per_mm: f64,
    /// Usable travel length in millimeters
    pub length: f64,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            steps_per_mm: 80.0,
            length: 200.0,
        }
    }
}

/// The three machine axes
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AxesConfig {
    /// X axis parameters
    pub x: AxisConfig,
    /// Y axis parameters
    pub y: AxisConfig,
    /// Z axis parameters
    pub z: AxisConfig,
}

/// Machine configuration
///
/// Owned by the motion controller and immutable for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Per-axis step density and travel limits
    pub axes: AxesConfig,
    /// Maximum feed speed in mm/s
    pub max_speed: f64,
    /// Number of pending moves that triggers an automatic flush
    pub cmd_buffer_max_size: usize,
    /// Fraction of `max_speed` applied as the default move speed at
    /// connect time
    pub default_speed_factor: f64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            axes: AxesConfig::default(),
            max_speed: 50.0,
            cmd_buffer_max_size: 5,
            default_speed_factor: 0.666,
        }
    }
}

/// Connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Serial port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Baud rate for the serial link
    pub baud_rate: u32,
    /// Read timeout in milliseconds for every blocking wait
    pub timeout_ms: u64,
    /// Delay after opening the port before the handshake, giving
    /// Arduino-style boards time to finish their auto-reset
    pub reset_delay_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: 9600,
            timeout_ms: 5000,
            reset_delay_ms: 2000,
        }
    }
}

/// Complete plotter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlotterConfig {
    /// Connection settings
    #[serde(default)]
    pub connection: ConnectionSettings,
    /// Machine settings
    #[serde(default)]
    pub machine: MachineConfig,
}

impl PlotterConfig {
    /// Load configuration from a file
    ///
    /// The format is chosen by extension: `.toml` or `.json`.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::other(format!("Failed to read config file: {}", e)))?;

        let config: PlotterConfig = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| Error::other(format!("Failed to parse config: {}", e)))?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| Error::other(format!("Failed to parse config: {}", e)))?
        } else {
            return Err(Error::other(
                "Config file must be .json or .toml".to_string(),
            ));
        };

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::to_string_pretty(self)
                .map_err(|e| Error::other(format!("Failed to serialize config: {}", e)))?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            toml::to_string_pretty(self)
                .map_err(|e| Error::other(format!("Failed to serialize config: {}", e)))?
        } else {
            return Err(Error::other(
                "Config file must be .json or .toml".to_string(),
            ));
        };

        std::fs::write(path, content)
            .map_err(|e| Error::other(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.connection.baud_rate == 0 {
            return Err(Error::other("Baud rate must be > 0".to_string()));
        }

        if self.connection.timeout_ms == 0 {
            return Err(Error::other("Read timeout must be > 0".to_string()));
        }

        for (name, axis) in [
            ("x", &self.machine.axes.x),
            ("y", &self.machine.axes.y),
            ("z", &self.machine.axes.z),
        ] {
            if axis.steps_per_mm <= 0.0 {
                return Err(Error::other(format!(
                    "Axis {} steps_per_mm must be > 0",
                    name
                )));
            }
            if axis.length <= 0.0 {
                return Err(Error::other(format!("Axis {} length must be > 0", name)));
            }
        }

        if self.machine.max_speed <= 0.0 {
            return Err(Error::other("Max speed must be > 0".to_string()));
        }

        if self.machine.cmd_buffer_max_size == 0 {
            return Err(Error::other(
                "Command buffer capacity must be > 0".to_string(),
            ));
        }

        if self.machine.default_speed_factor <= 0.0 || self.machine.default_speed_factor > 1.0 {
            return Err(Error::other(
                "Default speed factor must be in (0, 1]".to_string(),
            ));
        }

        Ok(())
    }

    /// Default configuration file path in the platform config directory
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::other("Could not determine config directory".to_string()))?;
        Ok(dir.join("plotkit").join("plotter.toml"))
    }
}
