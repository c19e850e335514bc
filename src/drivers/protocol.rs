//! Framed ASCII protocol spoken by the bench controller over a serial link.
//!
//! Requests are `":" + COMMAND + "\r"`, replies end with a literal `Z`. Only one command
//! is ever outstanding; every request discards stale input before it is written.
//!
//! Commands used here:
//! - `C00Z` handshake, answered with `C99Z` or `C88Z`
//! - `C15D<hh>Z` start the motor at `hh = round(hz * 10)` (two uppercase hex digits)
//! - `C16Z` stop the motor
//! - `C04Z` read the load-cell converter, answered with `:C04D<hhhhhh>Z`
use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};
use log::{debug, info, warn};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use crate::drivers::BenchError;
/// Read and write budget for a single command.
pub const LINK_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Mid-scale of the 24-bit converter, i.e. zero force.
pub const FORCE_MIDSCALE: u32 = 8_388_608;
/// Converter counts per kilogram-force.
pub const FORCE_COUNTS_PER_KGF: f64 = 100.0;
pub const MIN_MOTOR_HZ: f64 = 0.1;
pub const MAX_MOTOR_HZ: f64 = 10.0;
const CMD_HANDSHAKE: &str = "C00Z";
const CMD_MOTOR_OFF: &str = "C16Z";
const CMD_READ_FORCE: &str = "C04Z";
const FORCE_REPLY_PREFIX: &str = ":C04D";
const HANDSHAKE_ACCEPTED: [&str; 2] = ["C99Z", "C88Z"];
const REPLY_TERMINATOR: u8 = b'Z';
// Longest reply we are willing to buffer while waiting for the terminator.
const MAX_REPLY_LEN: usize = 256;
/// Byte pipe underneath the protocol.
pub trait LinkTransport: Send {
    fn discard_input(&mut self) -> io::Result<()>;
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
    /// Read whatever is available; `ErrorKind::TimedOut` once the port timeout expires.
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// Bound the next `read_chunk` to `timeout`.
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}
/// Physical serial port, 8N1 with the protocol timeouts.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}
impl SerialTransport {
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, BenchError> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(LINK_TIMEOUT)
            .open()?;
        Ok(Self { port })
    }
}
impl LinkTransport for SerialTransport {
    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }
    fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::from)
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    /// Handshake accepted, motor never started.
    Connected,
    /// Motor running, force is being polled.
    Polling,
    /// Motor stopped after having run.
    Idle,
}
/// Outcome of one request/response exchange.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkReply {
    /// Everything read up to and including the `Z` terminator.
    Frame(String),
    Timeout,
    LinkError(String),
}
/// Why a force poll produced no sample.
#[derive(Clone, Debug, PartialEq)]
pub enum DroppedSample {
    Timeout,
    Malformed(String),
    Link(String),
}
pub struct ProtocolLink {
    transport: Option<Box<dyn LinkTransport>>,
    state: LinkState,
    timeout: Duration,
}
impl ProtocolLink {
    pub fn new() -> Self {
        Self {
            transport: None,
            state: LinkState::Disconnected,
            timeout: LINK_TIMEOUT,
        }
    }
    /// Shorter budgets are only useful against in-memory transports.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::new()
        }
    }
    pub fn state(&self) -> LinkState {
        self.state
    }
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state,
            LinkState::Connected | LinkState::Polling | LinkState::Idle
        )
    }
    /// Open `port_name` and perform the handshake.
    pub fn connect(&mut self, port_name: &str, baud_rate: u32) -> Result<(), BenchError> {
        self.disconnect();
        self.state = LinkState::Connecting;
        info!("opening {port_name} at {baud_rate} baud");
        match SerialTransport::open(port_name, baud_rate) {
            Ok(transport) => self.connect_with(Box::new(transport)),
            Err(err) => {
                warn!("could not open {port_name}: {err}");
                self.state = LinkState::Disconnected;
                Err(err)
            }
        }
    }
    /// Handshake over an already opened transport.
    pub fn connect_with(&mut self, transport: Box<dyn LinkTransport>) -> Result<(), BenchError> {
        self.transport = Some(transport);
        self.state = LinkState::Connecting;
        let reply = self.send_command(CMD_HANDSHAKE);
        match &reply {
            LinkReply::Frame(frame) if HANDSHAKE_ACCEPTED.iter().any(|ok| frame.contains(ok)) => {
                info!("handshake accepted ({})", frame.trim());
                self.state = LinkState::Connected;
                Ok(())
            }
            _ => {
                warn!("handshake rejected: {reply:?}");
                self.close();
                Err(BenchError::Handshake(describe(&reply)))
            }
        }
    }
    /// Send one command and wait for its terminated reply.
    pub fn send_command(&mut self, command: &str) -> LinkReply {
        let timeout = self.timeout;
        let Some(transport) = self.transport.as_mut() else {
            return LinkReply::LinkError("link is not open".into());
        };
        if let Err(err) = transport.discard_input() {
            return io_reply(err);
        }
        let frame = format!(":{command}\r");
        if let Err(err) = transport.write_frame(frame.as_bytes()) {
            return io_reply(err);
        }
        read_reply(transport.as_mut(), timeout)
    }
    pub fn enable_motor(&mut self, hz: f64) -> Result<(), BenchError> {
        if !self.is_connected() {
            return Err(BenchError::LinkDown);
        }
        let command = motor_command(hz)?;
        match self.send_command(&command) {
            LinkReply::LinkError(err) => return Err(BenchError::Link(err)),
            LinkReply::Timeout => warn!("no reply to {command}, assuming the motor started"),
            LinkReply::Frame(frame) => debug!("{command} -> {}", frame.trim()),
        }
        self.state = LinkState::Polling;
        Ok(())
    }
    pub fn disable_motor(&mut self) -> Result<(), BenchError> {
        if !self.is_connected() {
            return Err(BenchError::LinkDown);
        }
        if let LinkReply::LinkError(err) = self.send_command(CMD_MOTOR_OFF) {
            return Err(BenchError::Link(err));
        }
        self.state = LinkState::Idle;
        Ok(())
    }
    /// Read the force channel once.
    pub fn poll_data(&mut self) -> Result<f64, DroppedSample> {
        match self.send_command(CMD_READ_FORCE) {
            LinkReply::Frame(frame) => decode_force(&frame).ok_or(DroppedSample::Malformed(frame)),
            LinkReply::Timeout => Err(DroppedSample::Timeout),
            LinkReply::LinkError(err) => Err(DroppedSample::Link(err)),
        }
    }
    /// Close the link. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if self.transport.is_some() {
            info!("link closed");
        }
        self.close();
    }
    fn close(&mut self) {
        self.transport = None;
        self.state = LinkState::Disconnected;
    }
}
impl Default for ProtocolLink {
    fn default() -> Self {
        Self::new()
    }
}
/// `C15D<hh>Z` for a frequency in Hz.
pub fn motor_command(hz: f64) -> Result<String, BenchError> {
    if !hz.is_finite() || !(MIN_MOTOR_HZ..=MAX_MOTOR_HZ).contains(&hz) {
        return Err(BenchError::InvalidFrequency(hz));
    }
    let code = (hz * 10.0).round() as u8;
    Ok(format!("C15D{code:02X}Z"))
}
/// Decode `:C04D<hhhhhh>Z` into kilogram-force, `None` for any other shape.
pub fn decode_force(reply: &str) -> Option<f64> {
    let digits = reply
        .trim_start()
        .strip_prefix(FORCE_REPLY_PREFIX)?
        .strip_suffix(char::from(REPLY_TERMINATOR))?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let raw = u32::from_str_radix(digits, 16).ok()?;
    Some((f64::from(raw) - f64::from(FORCE_MIDSCALE)) / FORCE_COUNTS_PER_KGF)
}
fn read_reply(transport: &mut dyn LinkTransport, timeout: Duration) -> LinkReply {
    let deadline = Instant::now() + timeout;
    let mut reply = Vec::with_capacity(16);
    let mut byte = [0u8; 1];
    loop {
        // no single read may outlive the command budget
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return LinkReply::Timeout;
        }
        if let Err(err) = transport.set_read_timeout(remaining) {
            return io_reply(err);
        }
        match transport.read_chunk(&mut byte) {
            Ok(0) => thread::sleep(Duration::from_millis(1)),
            Ok(_) => {
                reply.push(byte[0]);
                if byte[0] == REPLY_TERMINATOR {
                    return LinkReply::Frame(String::from_utf8_lossy(&reply).into_owned());
                }
                if reply.len() > MAX_REPLY_LEN {
                    return LinkReply::LinkError(format!(
                        "no terminator within {MAX_REPLY_LEN} bytes"
                    ));
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return io_reply(err),
        }
    }
}
fn io_reply(err: io::Error) -> LinkReply {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => LinkReply::Timeout,
        _ => LinkReply::LinkError(err.to_string()),
    }
}
fn describe(reply: &LinkReply) -> String {
    match reply {
        LinkReply::Frame(frame) => frame.trim().to_string(),
        LinkReply::Timeout => "timeout".into(),
        LinkReply::LinkError(err) => err.clone(),
    }
}
