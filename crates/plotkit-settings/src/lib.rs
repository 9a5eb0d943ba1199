//! # PlotKit Settings
//!
//! Configuration management for the plotter driver: per-axis machine
//! parameters, global speed and buffer limits, and serial connection
//! settings. Files are read and written as TOML or JSON.

pub mod config;

pub use config::{
    AxesConfig, AxisConfig, ConnectionSettings, MachineConfig, PlotterConfig,
};
