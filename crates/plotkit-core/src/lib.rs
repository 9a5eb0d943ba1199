//! # PlotKit Core
//!
//! Core types, errors, and unit conversion shared by the PlotKit crates.
//! Contains no I/O: the serial transport and motion control live in
//! `plotkit-communication`, configuration in `plotkit-settings`.

pub mod error;
pub mod position;
pub mod units;

pub use error::{
    ConnectionError, DeviceError, Error, MotionError, ProtocolError, Result,
};
pub use position::Position;
