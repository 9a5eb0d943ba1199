//! Bounded FIFO of pending moves
//!
//! Pure in-memory structure, no I/O. Insertion order is flush order.
//! Reaching capacity is the controller's trigger for an automatic flush,
//! never an overflow condition; a push that actually finds the buffer full
//! means the flush discipline was broken upstream.

use plotkit_core::{MotionError, Result};
use std::collections::VecDeque;

/// A queued absolute target position in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingMove {
    /// Target X coordinate in millimeters
    pub x: f64,
    /// Target Y coordinate in millimeters
    pub y: f64,
    /// Target Z coordinate in millimeters
    pub z: f64,
}

impl PendingMove {
    /// Create a pending move from target coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Bounded FIFO of pending moves.
#[derive(Debug)]
pub struct MotionBuffer {
    moves: VecDeque<PendingMove>,
    capacity: usize,
}

impl MotionBuffer {
    /// Create a buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            moves: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a move.
    ///
    /// Fails with `MotionError::BufferFull` if the buffer is already at
    /// capacity.
    pub fn push(&mut self, mv: PendingMove) -> Result<()> {
        if self.moves.len() >= self.capacity {
            return Err(MotionError::BufferFull {
                capacity: self.capacity,
            }
            .into());
        }
        self.moves.push_back(mv);
        Ok(())
    }

    /// Remove and return the oldest move.
    pub fn pop_front(&mut self) -> Result<PendingMove> {
        self.moves
            .pop_front()
            .ok_or_else(|| MotionError::BufferEmpty.into())
    }

    /// Number of queued moves
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Whether the buffer holds no moves
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Whether the buffer has reached capacity
    pub fn is_full(&self) -> bool {
        self.moves.len() >= self.capacity
    }

    /// The configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all queued moves
    pub fn clear(&mut self) {
        self.moves.clear();
    }
}
