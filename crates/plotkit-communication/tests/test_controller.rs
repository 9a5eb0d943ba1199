use plotkit_communication::{MotionController, SerialLink, Session};
use plotkit_core::{ConnectionError, DeviceError, Error, Result};
use plotkit_settings::{AxesConfig, AxisConfig, MachineConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the emulated firmware expects next on the wire.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Opcode,
    BufferCount,
    /// Remaining delta tokens (three per move)
    Deltas(usize),
    Period,
}

/// Emulated plotter firmware state.
struct DeviceState {
    steps: [i64; 3],
    expect: Expect,
    responses: VecDeque<String>,
    /// Every write call as text; opcodes rendered as `<op:N>`
    tokens: Vec<String>,
    connected: bool,
    /// Override for the next acknowledgement (e.g., an error line)
    next_ack: Option<String>,
    last_period: Option<i64>,
    home_count: usize,
}

impl DeviceState {
    fn respond(&mut self, line: &str) {
        self.responses.push_back(format!("{}\n", line));
    }

    fn ack(&mut self) {
        match self.next_ack.take() {
            Some(line) => self.respond(&line),
            None => self.respond("ok"),
        }
    }

    fn apply_delta(&mut self, token: &str) {
        let (axis, digits) = if let Some(d) = token.strip_prefix("dX") {
            (0, d)
        } else if let Some(d) = token.strip_prefix("dY") {
            (1, d)
        } else if let Some(d) = token.strip_prefix("dZ") {
            (2, d)
        } else {
            panic!("unexpected delta token {:?}", token);
        };
        self.steps[axis] += digits.parse::<i64>().unwrap();
    }
}

/// Mock serial link emulating the plotter firmware.
///
/// Each `write_bytes` call carries one wire token (an opcode byte or one
/// label+digits parameter), mirroring how the session writes them.
struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                steps: [0, 0, 0],
                expect: Expect::Opcode,
                responses: VecDeque::new(),
                tokens: Vec::new(),
                connected: false,
                next_ack: None,
                last_period: None,
                home_count: 0,
            })),
        }
    }
}

impl SerialLink for MockDevice {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let mut st = self.state.lock().unwrap();

        let text = match st.expect {
            Expect::Opcode => format!("<op:{}>", data[0]),
            _ => String::from_utf8(data.to_vec()).unwrap(),
        };
        st.tokens.push(text.clone());

        match st.expect {
            Expect::Opcode => match data[0] {
                0 => st.respond("OSA Plotter Mk2"),
                1 => {
                    if st.connected {
                        st.respond("E1");
                    } else {
                        st.connected = true;
                        st.respond("ok");
                    }
                }
                2 => {
                    st.steps = [0, 0, 0];
                    st.home_count += 1;
                    st.ack();
                }
                16 => {
                    let line = format!("{}/{}/{}", st.steps[0], st.steps[1], st.steps[2]);
                    st.respond(&line);
                }
                17 => st.expect = Expect::Deltas(3),
                18 => st.expect = Expect::BufferCount,
                19 => st.expect = Expect::Period,
                _ => st.respond("E0"),
            },
            Expect::BufferCount => {
                let n: usize = text.strip_prefix('n').unwrap().parse().unwrap();
                st.expect = Expect::Deltas(n * 3);
            }
            Expect::Deltas(remaining) => {
                st.apply_delta(&text);
                if remaining == 1 {
                    st.expect = Expect::Opcode;
                    st.ack();
                } else {
                    st.expect = Expect::Deltas(remaining - 1);
                }
            }
            Expect::Period => {
                st.last_period = Some(text.strip_prefix('p').unwrap().parse().unwrap());
                st.expect = Expect::Opcode;
                st.ack();
            }
        }
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .responses
            .pop_front()
            .ok_or_else(|| {
                ConnectionError::ReadTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into()
            })
    }

    fn discard_input(&mut self) -> Result<()> {
        self.state.lock().unwrap().responses.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn test_machine() -> MachineConfig {
    MachineConfig {
        axes: AxesConfig {
            x: AxisConfig {
                steps_per_mm: 10.0,
                length: 200.0,
            },
            y: AxisConfig {
                steps_per_mm: 10.0,
                length: 200.0,
            },
            z: AxisConfig {
                steps_per_mm: 10.0,
                length: 50.0,
            },
        },
        max_speed: 50.0,
        cmd_buffer_max_size: 5,
        default_speed_factor: 0.666,
    }
}

fn connected_controller(
    machine: MachineConfig,
) -> (MotionController, Arc<Mutex<DeviceState>>) {
    let device = MockDevice::new();
    let state = device.state.clone();
    let mut session = Session::new(Box::new(device), Duration::from_millis(100));
    session.connect().unwrap();
    (MotionController::new(session, machine), state)
}

fn tokens(state: &Arc<Mutex<DeviceState>>) -> Vec<String> {
    state.lock().unwrap().tokens.clone()
}

#[test]
fn test_move_delta_on_wire() {
    // steps_per_mm_x = 10, move to x=5 from origin -> dX50
    let (mut ctl, state) = connected_controller(test_machine());

    ctl.set_position(5.0, 0.0, 0.0).unwrap();
    ctl.flush().unwrap();

    let toks = tokens(&state);
    let tail = &toks[toks.len() - 5..];
    assert_eq!(tail, ["<op:18>", "n1", "dX50", "dY0", "dZ0"]);
    assert_eq!(state.lock().unwrap().steps, [50, 0, 0]);
    assert_eq!(ctl.position().x, 5.0);
}

#[test]
fn test_auto_flush_exactly_at_capacity() {
    let (mut ctl, state) = connected_controller(test_machine());

    for i in 1..=4 {
        ctl.set_position(i as f64, 0.0, 0.0).unwrap();
        assert_eq!(ctl.pending_moves(), i);
    }
    // Four queued moves, nothing transmitted yet
    assert!(!tokens(&state).iter().any(|t| t == "<op:18>"));

    // Fifth move reaches capacity and triggers the batch
    ctl.set_position(5.0, 0.0, 0.0).unwrap();
    assert_eq!(ctl.pending_moves(), 0);

    let toks = tokens(&state);
    assert_eq!(toks.iter().filter(|t| *t == "<op:18>").count(), 1);
    assert!(toks.iter().any(|t| t == "n5"));
    // Five delta triples
    assert_eq!(toks.iter().filter(|t| t.starts_with("dX")).count(), 5);
    // Deltas are between successive targets: 1,2,3,4,5mm -> 10 steps each
    assert_eq!(
        toks.iter().filter(|t| *t == "dX10").count(),
        5,
        "each move advances one millimeter"
    );
    assert_eq!(state.lock().unwrap().steps, [50, 0, 0]);
    // One acknowledgement consumed, none left over
    assert!(state.lock().unwrap().responses.is_empty());
}

#[test]
fn test_round_trip_within_one_step() {
    let (mut ctl, _) = connected_controller(test_machine());
    let step_mm = 0.1; // 1 / steps_per_mm

    let target = (3.77, 2.22, 1.19);
    ctl.set_position(target.0, target.1, target.2).unwrap();
    ctl.flush().unwrap();

    let pos = ctl.get_position().unwrap();
    assert!((pos.x - target.0).abs() <= step_mm);
    assert!((pos.y - target.1).abs() <= step_mm);
    assert!((pos.z - target.2).abs() <= step_mm);
}

#[test]
fn test_get_position_decodes_steps_without_tracking() {
    let (mut ctl, state) = connected_controller(test_machine());
    state.lock().unwrap().steps = [100, 200, 300];

    let pos = ctl.get_position().unwrap();
    assert_eq!((pos.x, pos.y, pos.z), (10.0, 20.0, 30.0));

    // Tracked position is untouched by the query
    assert_eq!(ctl.position().x, 0.0);
}

#[test]
fn test_out_of_range_rejected_before_transmission() {
    let (mut ctl, state) = connected_controller(test_machine());
    let wire_before = tokens(&state).len();

    let err = ctl.set_position(250.0, 0.0, 0.0).unwrap_err();
    assert!(err.is_motion_error());
    let err = ctl.set_position(0.0, -1.0, 0.0).unwrap_err();
    assert!(err.is_motion_error());
    let err = ctl.set_position(0.0, 0.0, 50.1).unwrap_err();
    assert!(err.is_motion_error());

    assert_eq!(ctl.pending_moves(), 0);
    assert_eq!(tokens(&state).len(), wire_before, "nothing reached the wire");
}

#[test]
fn test_set_move_speed_validation() {
    let (mut ctl, state) = connected_controller(test_machine());

    let err = ctl.set_move_speed(50.1).unwrap_err();
    assert!(matches!(
        err,
        Error::Motion(plotkit_core::MotionError::SpeedExceeded { .. })
    ));
    assert!(state.lock().unwrap().last_period.is_none());

    // At the limit is allowed: 1e6 / (10 * 50) = 2000us
    ctl.set_move_speed(50.0).unwrap();
    assert_eq!(state.lock().unwrap().last_period, Some(2000));

    // 10mm/s at 10 steps/mm -> 10000us
    ctl.set_move_speed(10.0).unwrap();
    assert_eq!(state.lock().unwrap().last_period, Some(10_000));
}

#[test]
fn test_flush_empty_buffer_is_noop() {
    let (mut ctl, state) = connected_controller(test_machine());
    let wire_before = tokens(&state).len();

    ctl.flush().unwrap();
    assert_eq!(tokens(&state).len(), wire_before);
}

#[test]
fn test_batch_rejection_surfaces_and_clears_buffer() {
    let (mut ctl, state) = connected_controller(test_machine());
    state.lock().unwrap().next_ack = Some("E2 out of range".to_string());

    ctl.set_position(1.0, 0.0, 0.0).unwrap();
    ctl.set_position(2.0, 0.0, 0.0).unwrap();
    let err = ctl.flush().unwrap_err();

    assert!(matches!(err, Error::Device(DeviceError::OutOfRange)));
    // Buffer is cleared regardless of acknowledgement content
    assert_eq!(ctl.pending_moves(), 0);
}

#[test]
fn test_home_refreshes_tracked_position() {
    let (mut ctl, state) = connected_controller(test_machine());

    ctl.send_single_move(5.0, 5.0, 0.0).unwrap();
    assert_eq!(ctl.position().x, 5.0);

    ctl.home().unwrap();
    assert_eq!(state.lock().unwrap().home_count, 1);
    assert_eq!(ctl.position(), plotkit_core::Position::origin());
}

#[test]
fn test_single_move_bypasses_buffer() {
    let (mut ctl, state) = connected_controller(test_machine());

    ctl.send_single_move(2.5, 0.0, 1.0).unwrap();

    let toks = tokens(&state);
    let tail = &toks[toks.len() - 4..];
    assert_eq!(tail, ["<op:17>", "dX25", "dY0", "dZ10"]);
    assert_eq!(ctl.pending_moves(), 0);
    assert_eq!(ctl.position().x, 2.5);
    assert_eq!(state.lock().unwrap().steps, [25, 0, 10]);
}

#[test]
fn test_initialize_homes_and_sets_default_speed() {
    let (mut ctl, state) = connected_controller(test_machine());

    ctl.initialize().unwrap();

    let st = state.lock().unwrap();
    assert_eq!(st.home_count, 1);
    // 50 * 0.666 = 33.3mm/s -> 1e6 / (10 * 33.3) = 3003us
    assert_eq!(st.last_period, Some(3003));
}

#[test]
fn test_shutdown_flushes_homes_and_closes() {
    let (mut ctl, state) = connected_controller(test_machine());

    ctl.set_position(3.0, 0.0, 0.0).unwrap();
    ctl.shutdown().unwrap();

    let st = state.lock().unwrap();
    assert!(st.tokens.iter().any(|t| t == "<op:18>"), "final flush sent");
    assert_eq!(st.home_count, 1, "parked at home");
    drop(st);

    assert!(ctl.is_shut_down());
    // Idempotent
    ctl.shutdown().unwrap();

    let err = ctl.set_position(1.0, 0.0, 0.0).unwrap_err();
    assert!(matches!(
        err,
        Error::Connection(ConnectionError::SessionClosed)
    ));
}
