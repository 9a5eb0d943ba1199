//! Wire protocol codec for the plotter firmware
//!
//! Requests are a single opcode byte, optionally followed by parameter
//! tokens. A parameter token is an ASCII label immediately followed by the
//! signed decimal digits of its value - no delimiter between label and
//! digits, none between successive tokens. The framing is not
//! self-delimiting: the receiver can only parse a request because the
//! parameter count and labels of every command are fixed. Fragile, but
//! preserved byte-for-byte for compatibility with deployed firmware.
//!
//! Responses are ASCII lines. A line whose first two characters are `E0`
//! through `E3` is a rejection; anything else is a successful payload.

use plotkit_core::{DeviceError, ProtocolError, Result};

/// Protocol opcodes, values defined by the device firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandCode {
    /// Identity query; answered even before CONNECT
    Ping = 0,
    /// Establish the session
    Connect = 1,
    /// Run the homing cycle
    Home = 2,
    /// Query raw step counters
    GetPos = 16,
    /// Single immediate move (three delta parameters)
    SetPos = 17,
    /// Batched moves (count parameter, then delta triples)
    SendBuffer = 18,
    /// Set the step period (one parameter)
    SetMoveSpeed = 19,
    /// No-op, reserved
    Null = 127,
}

impl CommandCode {
    /// The single opcode byte sent on the wire
    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// Whether this command is permitted before the CONNECT handshake
    /// completes
    pub fn allowed_before_connect(self) -> bool {
        matches!(self, CommandCode::Ping | CommandCode::Connect)
    }
}

/// Encode a command as its wire form.
pub fn encode_command(code: CommandCode) -> [u8; 1] {
    [code.opcode()]
}

/// Encode a named integer parameter: label then decimal digits, no
/// delimiter.
pub fn encode_integer(label: &str, value: i64) -> Vec<u8> {
    format!("{}{}", label, value).into_bytes()
}

/// Decode a raw response line: strip the trailing line terminator.
pub fn decode_response(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line)
}

/// Decode a device error from a response prefix.
///
/// Returns `None` for any response that is not a rejection; such responses
/// are successful payloads.
pub fn decode_device_error(response: &str) -> Option<DeviceError> {
    match response.get(..2) {
        Some("E0") => Some(DeviceError::InvalidCommand),
        Some("E1") => Some(DeviceError::AlreadyConnected),
        Some("E2") => Some(DeviceError::OutOfRange),
        Some("E3") => Some(DeviceError::BufferTooLarge),
        _ => None,
    }
}

/// Parse a GET_POS payload: three slash-separated raw step counts.
pub fn parse_position_payload(payload: &str) -> Result<[i64; 3]> {
    let mut parts = payload.split('/');
    let mut steps = [0i64; 3];
    for slot in steps.iter_mut() {
        *slot = parts
            .next()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .ok_or_else(|| ProtocolError::MalformedPosition {
                payload: payload.to_string(),
            })?;
    }
    if parts.next().is_some() {
        return Err(ProtocolError::MalformedPosition {
            payload: payload.to_string(),
        }
        .into());
    }
    Ok(steps)
}
