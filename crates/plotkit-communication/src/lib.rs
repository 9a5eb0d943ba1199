//! # PlotKit Communication
//!
//! Serial protocol and motion control for a 3-axis pen plotter.
//! Converts millimeter coordinates into stepper pulse counts, batches
//! motion commands to amortize transmission overhead, enforces travel and
//! speed limits, and decodes device acknowledgements and error codes.
//!
//! Layering, leaf-first: [`protocol`] (wire codec), [`transport`] (byte
//! stream and port discovery), [`session`] (handshake and framing),
//! [`buffer`] (pending move FIFO), [`controller`] (orchestration).

pub mod buffer;
pub mod controller;
pub mod protocol;
pub mod session;
pub mod transport;

pub use buffer::{MotionBuffer, PendingMove};
pub use controller::MotionController;
pub use protocol::CommandCode;
pub use session::{Session, SessionState};
pub use transport::{list_ports, SerialLink, SerialPortInfo, SerialPortLink};
