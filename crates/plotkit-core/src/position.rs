//! Machine position tracking

use serde::{Deserialize, Serialize};
use std::fmt;

/// An absolute machine position in millimeters.
///
/// Tracks the last commanded (not measured) location of the tool head.
/// Accepted positions always satisfy `0 <= coordinate <= axis length` on
/// every axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate in millimeters
    pub x: f64,
    /// Y coordinate in millimeters
    pub y: f64,
    /// Z coordinate in millimeters
    pub z: f64,
}

impl Position {
    /// Create a position from explicit coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The machine origin
    pub fn origin() -> Self {
        Self::default()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X{:.3} Y{:.3} Z{:.3}", self.x, self.y, self.z)
    }
}
