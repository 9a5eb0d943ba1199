//! Transport session: handshake, framing, and response decoding
//!
//! The session owns the byte stream exclusively and enforces the
//! connection state machine:
//!
//! ```text
//! Disconnected --connect()--> Connected --close()--> Closed
//! ```
//!
//! Only `Connected` permits commands other than PING and CONNECT. Every
//! blocking wait is bounded by the configured read timeout; expiry
//! surfaces as `ConnectionError::ReadTimeout` rather than blocking
//! forever.

use crate::protocol::{self, CommandCode};
use crate::transport::{SerialLink, SerialPortLink};
use plotkit_core::{ConnectionError, Result};
use plotkit_settings::ConnectionSettings;
use std::time::Duration;

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Port open, handshake not yet performed
    Disconnected,
    /// Handshake complete, all commands permitted
    Connected,
    /// Explicitly shut down; no further traffic
    Closed,
}

/// A synchronous command session over a serial link.
///
/// Exclusive single-owner handle: callers that share a session across
/// tasks must serialize access themselves.
pub struct Session {
    link: Box<dyn SerialLink>,
    state: SessionState,
    read_timeout: Duration,
}

impl Session {
    /// Create a session over an already-open link.
    ///
    /// The session starts `Disconnected`; call [`Session::connect`] to
    /// perform the handshake.
    pub fn new(link: Box<dyn SerialLink>, read_timeout: Duration) -> Self {
        Self {
            link,
            state: SessionState::Disconnected,
            read_timeout,
        }
    }

    /// Open the configured serial port and create a session over it.
    ///
    /// Waits `reset_delay_ms` after opening: boards with auto-reset on
    /// DTR reboot when the port opens and drop anything sent meanwhile.
    pub fn open(settings: &ConnectionSettings) -> Result<Self> {
        let link = SerialPortLink::open(settings)?;
        if settings.reset_delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(settings.reset_delay_ms));
        }
        Ok(Self::new(
            Box::new(link),
            Duration::from_millis(settings.timeout_ms),
        ))
    }

    /// Current state of the session
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Perform the connect handshake.
    ///
    /// Sends PING and returns the device's identification payload, then
    /// sends CONNECT and waits for its acknowledgement.
    pub fn connect(&mut self) -> Result<String> {
        match self.state {
            SessionState::Connected => return Err(ConnectionError::AlreadyConnected.into()),
            SessionState::Closed => return Err(ConnectionError::SessionClosed.into()),
            SessionState::Disconnected => {}
        }

        let identity = self.send_command(CommandCode::Ping)?;
        tracing::info!("Connected to device: {}", identity);

        self.send_command(CommandCode::Connect)?;
        self.state = SessionState::Connected;
        Ok(identity)
    }

    /// Send a command and wait for its response (blocking).
    ///
    /// Stale unread input is discarded before the opcode is written. The
    /// response line is decoded for a device error prefix; rejections fail
    /// with the matching `DeviceError`, anything else is returned as the
    /// payload.
    pub fn send_command(&mut self, code: CommandCode) -> Result<String> {
        self.send_command_nonblocking(code)?;
        let response = self.wait_for_response()?;

        if let Some(device_err) = protocol::decode_device_error(&response) {
            tracing::error!("Device rejected {:?}: {}", code, device_err);
            return Err(device_err.into());
        }
        Ok(response)
    }

    /// Write a command opcode without waiting for a response.
    ///
    /// Used when the caller will write further parameters and wait
    /// itself.
    pub fn send_command_nonblocking(&mut self, code: CommandCode) -> Result<()> {
        self.ensure_permitted(code)?;
        self.link.discard_input()?;
        tracing::debug!("Serial TX: {:?}", code);
        self.link.write_bytes(&protocol::encode_command(code))
    }

    /// Write a named integer parameter. No response is read.
    pub fn send_integer(&mut self, label: &str, value: i64) -> Result<()> {
        self.ensure_open()?;
        tracing::trace!("Serial TX param: {}{}", label, value);
        self.link.write_bytes(&protocol::encode_integer(label, value))
    }

    /// Block until one response line arrives, decode and return it.
    ///
    /// No error interpretation is applied; callers that need device-error
    /// decoding use [`Session::send_command`].
    pub fn wait_for_response(&mut self) -> Result<String> {
        self.ensure_open()?;
        let line = self.link.read_line(self.read_timeout)?;
        Ok(protocol::decode_response(&line).to_string())
    }

    /// Close the session. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.state != SessionState::Closed {
            self.link.close()?;
            self.state = SessionState::Closed;
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(ConnectionError::SessionClosed.into());
        }
        Ok(())
    }

    fn ensure_permitted(&self, code: CommandCode) -> Result<()> {
        match self.state {
            SessionState::Closed => Err(ConnectionError::SessionClosed.into()),
            SessionState::Disconnected if !code.allowed_before_connect() => {
                Err(ConnectionError::NotConnected.into())
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}
