//! Motion controller
//!
//! Owns the machine configuration, the tracked position, and the pending
//! move buffer, and orchestrates the protocol traffic: bounds validation,
//! batched flushes, speed-limit enforcement, homing, and position query
//! with unit conversion.
//!
//! All validation happens locally before any transmission - a request the
//! controller can reject cheaply never costs a device round trip.

use crate::buffer::{MotionBuffer, PendingMove};
use crate::protocol::{self, CommandCode};
use crate::session::Session;
use plotkit_core::{units, MotionError, Position, Result};
use plotkit_settings::{ConnectionSettings, MachineConfig};

/// Synchronous motion controller for a 3-axis plotter.
///
/// Single-owner handle; every operation blocks until the device answers
/// or the configured read timeout expires.
pub struct MotionController {
    session: Session,
    machine: MachineConfig,
    position: Position,
    buffer: MotionBuffer,
    shut_down: bool,
}

impl MotionController {
    /// Create a controller over an already-connected session.
    ///
    /// The tracked position starts at the origin; call
    /// [`MotionController::initialize`] (or use
    /// [`MotionController::connect`]) to home the machine and establish
    /// real position tracking.
    pub fn new(session: Session, machine: MachineConfig) -> Self {
        let buffer = MotionBuffer::new(machine.cmd_buffer_max_size);
        Self {
            session,
            machine,
            position: Position::origin(),
            buffer,
            shut_down: false,
        }
    }

    /// Full bring-up: open the port, handshake, home, and apply the
    /// configured default move speed.
    pub fn connect(settings: &ConnectionSettings, machine: MachineConfig) -> Result<Self> {
        let mut session = Session::open(settings)?;
        session.connect()?;

        let mut controller = Self::new(session, machine);
        controller.initialize()?;
        Ok(controller)
    }

    /// Home the machine and apply the default move speed.
    pub fn initialize(&mut self) -> Result<()> {
        self.home()?;
        let speed = self.machine.max_speed * self.machine.default_speed_factor;
        self.set_move_speed(speed)
    }

    /// The last commanded (not measured) position
    pub fn position(&self) -> Position {
        self.position
    }

    /// Number of moves waiting in the buffer
    pub fn pending_moves(&self) -> usize {
        self.buffer.len()
    }

    /// The machine configuration
    pub fn machine(&self) -> &MachineConfig {
        &self.machine
    }

    /// Queue an absolute move to `(x, y, z)` millimeters.
    ///
    /// Each coordinate is validated against `[0, axis.length]`; violations
    /// fail with `MotionError::OutOfRange` before anything is sent. When
    /// the buffer reaches `cmd_buffer_max_size` the batch is flushed
    /// synchronously.
    pub fn set_position(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        self.ensure_active()?;
        self.validate_target(x, y, z)?;

        self.buffer.push(PendingMove::new(x, y, z))?;
        if self.buffer.is_full() {
            self.flush()?;
        }
        Ok(())
    }

    /// Transmit all buffered moves as one batched command.
    ///
    /// No-op on an empty buffer. Sends SEND_BUFFER, the move count, then
    /// each move's per-axis step deltas in FIFO order, updating the
    /// tracked position as it goes. Waits once for a single
    /// acknowledgement covering the whole batch; the buffer is cleared
    /// regardless of what the acknowledgement says.
    pub fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let n = self.buffer.len();
        tracing::debug!("Flushing {} buffered moves", n);

        self.session.send_command_nonblocking(CommandCode::SendBuffer)?;
        self.session.send_integer("n", n as i64)?;

        for _ in 0..n {
            let mv = self.buffer.pop_front()?;
            self.send_move_deltas(&mv)?;
            self.position = Position::new(mv.x, mv.y, mv.z);
        }

        let ack = self.wait_ack();
        self.buffer.clear();
        ack.map(|_| ())
    }

    /// Query the device's raw step counters and convert to millimeters.
    ///
    /// Does not mutate the tracked position.
    pub fn get_position(&mut self) -> Result<Position> {
        let payload = self.session.send_command(CommandCode::GetPos)?;
        let steps = protocol::parse_position_payload(&payload)?;

        let axes = &self.machine.axes;
        Ok(Position::new(
            units::steps_to_mm(steps[0], axes.x.steps_per_mm),
            units::steps_to_mm(steps[1], axes.y.steps_per_mm),
            units::steps_to_mm(steps[2], axes.z.steps_per_mm),
        ))
    }

    /// Set the feed speed in mm/s.
    ///
    /// Fails with `MotionError::SpeedExceeded` above the configured
    /// maximum. The step period is derived from the X axis step density
    /// only; the firmware uses it as the shared timing base for all axes.
    pub fn set_move_speed(&mut self, mm_per_s: f64) -> Result<()> {
        if mm_per_s > self.machine.max_speed {
            return Err(MotionError::SpeedExceeded {
                requested: mm_per_s,
                max: self.machine.max_speed,
            }
            .into());
        }

        let period = units::step_period_us(self.machine.axes.x.steps_per_mm, mm_per_s);
        tracing::debug!("Setting move speed {}mm/s (step period {}us)", mm_per_s, period);

        self.session
            .send_command_nonblocking(CommandCode::SetMoveSpeed)?;
        self.session.send_integer("p", period)?;
        self.wait_ack().map(|_| ())
    }

    /// Run the homing cycle, then refresh the tracked position from the
    /// device.
    pub fn home(&mut self) -> Result<()> {
        tracing::info!("Homing all axes");
        self.session.send_command(CommandCode::Home)?;
        self.position = self.get_position()?;
        Ok(())
    }

    /// Send one immediate move, bypassing the buffer.
    ///
    /// Same bounds validation and delta encoding as a buffered move, but
    /// transmitted at once and acknowledged individually. Useful for
    /// latency-sensitive single moves such as pen lifts.
    pub fn send_single_move(&mut self, x: f64, y: f64, z: f64) -> Result<()> {
        self.ensure_active()?;
        self.validate_target(x, y, z)?;

        self.session.send_command_nonblocking(CommandCode::SetPos)?;
        let mv = PendingMove::new(x, y, z);
        self.send_move_deltas(&mv)?;
        self.position = Position::new(x, y, z);
        self.wait_ack().map(|_| ())
    }

    /// Flush remaining moves, home, and close the session.
    ///
    /// Explicit and idempotent: a second call is a no-op, and the session
    /// is closed even when the final flush or homing fails.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }

        tracing::info!("Shutting down plotter driver");
        let result = self.flush().and_then(|_| self.home());
        let close_result = self.session.close();
        self.shut_down = true;

        result.and(close_result)
    }

    /// Whether `shutdown()` has completed
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Convert a move's per-axis millimeter deltas against the tracked
    /// position into signed step counts and write the three parameters.
    fn send_move_deltas(&mut self, mv: &PendingMove) -> Result<()> {
        let axes = &self.machine.axes;
        let dx = units::mm_to_steps(mv.x - self.position.x, axes.x.steps_per_mm);
        let dy = units::mm_to_steps(mv.y - self.position.y, axes.y.steps_per_mm);
        let dz = units::mm_to_steps(mv.z - self.position.z, axes.z.steps_per_mm);

        self.session.send_integer("dX", dx)?;
        self.session.send_integer("dY", dy)?;
        self.session.send_integer("dZ", dz)
    }

    /// Wait for an acknowledgement and decode a device-error prefix.
    fn wait_ack(&mut self) -> Result<String> {
        let response = self.session.wait_for_response()?;
        if let Some(device_err) = protocol::decode_device_error(&response) {
            tracing::error!("Device rejected batch: {}", device_err);
            return Err(device_err.into());
        }
        Ok(response)
    }

    /// Reject operations after `shutdown()` has completed.
    fn ensure_active(&self) -> Result<()> {
        if self.shut_down {
            return Err(plotkit_core::ConnectionError::SessionClosed.into());
        }
        Ok(())
    }

    fn validate_target(&self, x: f64, y: f64, z: f64) -> Result<()> {
        let axes = &self.machine.axes;
        Self::check_axis('X', x, axes.x.length)?;
        Self::check_axis('Y', y, axes.y.length)?;
        Self::check_axis('Z', z, axes.z.length)
    }

    fn check_axis(axis: char, requested: f64, limit: f64) -> Result<()> {
        if !(0.0..=limit).contains(&requested) {
            return Err(MotionError::OutOfRange {
                axis,
                requested,
                limit,
            }
            .into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for MotionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionController")
            .field("position", &self.position)
            .field("pending_moves", &self.buffer.len())
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
