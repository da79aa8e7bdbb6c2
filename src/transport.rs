//! TCP transport layer for Modbus communication.
//!
//! The [`Transport`] trait is the boundary the register engines are
//! written against: connect on demand, report connection state, and move
//! whole register transactions. [`TcpTransport`] is the production
//! implementation over a blocking [`TcpStream`]; tests substitute their
//! own implementations.
//!
//! # Design
//!
//! - **Synchronous** - blocking send/receive with configurable timeout
//! - **One transaction in flight** - requests and responses strictly
//!   alternate on the single stream
//! - **Reconnect on demand** - a failed exchange drops the stream and the
//!   caller's retry loop decides when to reconnect
//!
//! # Constants
//!
//! - [`DEFAULT_MODBUS_PORT`] - Default Modbus TCP port (502)
//! - [`DEFAULT_TIMEOUT`] - Default connect/read/write timeout (2 seconds)

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::catalog::RegisterClass;
use crate::error::{EveError, Result};
use crate::frame::{self, ResponseFrame, MBAP_HEADER_SIZE};

/// Default Modbus TCP port.
pub const DEFAULT_MODBUS_PORT: u16 = 502;

/// Default timeout for socket operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Request/response transport the register engines run on.
///
/// Implementations exchange whole transactions: one register read or
/// write per call, blocking until the response arrives or the attempt
/// fails. The engines never retry inside the transport; retry policy
/// lives in [`Client`](crate::Client).
pub trait Transport {
    /// Attempts to establish the connection. Returns whether the
    /// transport is connected afterwards.
    fn connect(&mut self) -> bool;

    /// Returns whether the transport currently holds a connection.
    fn is_connected(&self) -> bool;

    /// Reads `count` registers of `class` starting at `address` from the
    /// given unit.
    fn read_registers(
        &mut self,
        unit: u8,
        class: RegisterClass,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>>;

    /// Writes `words` starting at `address` on the given unit.
    fn write_registers(&mut self, unit: u8, address: u16, words: &[u16]) -> Result<()>;
}

/// Modbus TCP transport over a blocking stream.
///
/// Created unconnected; [`Transport::connect`] dials the station. Any
/// I/O failure during an exchange drops the stream so that
/// `is_connected` reports the truth to the retry loop.
pub struct TcpTransport {
    addr: SocketAddr,
    timeout: Duration,
    stream: Option<TcpStream>,
    next_tid: u16,
}

impl TcpTransport {
    /// Creates an unconnected transport for the given station address.
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        Self {
            addr,
            timeout,
            stream: None,
            next_tid: 0,
        }
    }

    /// Creates an unconnected transport with the default timeout.
    pub fn with_default_timeout(addr: SocketAddr) -> Self {
        Self::new(addr, DEFAULT_TIMEOUT)
    }

    /// Returns the station address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn next_tid(&mut self) -> u16 {
        self.next_tid = self.next_tid.wrapping_add(1);
        self.next_tid
    }

    /// Sends one request frame and reads the matching response frame.
    ///
    /// Drops the stream on any I/O failure so the connection state stays
    /// honest.
    fn exchange(&mut self, request: &[u8], tid: u16, unit: u8) -> Result<ResponseFrame> {
        let result = self.exchange_inner(request, tid, unit);
        if result.is_err() {
            self.stream = None;
        }
        result
    }

    fn exchange_inner(&mut self, request: &[u8], tid: u16, unit: u8) -> Result<ResponseFrame> {
        let stream = self.stream.as_mut().ok_or(EveError::NotConnected)?;

        stream.write_all(request).map_err(map_io)?;

        let mut header = [0u8; MBAP_HEADER_SIZE];
        stream.read_exact(&mut header).map_err(map_io)?;

        let pending = frame::pending_length(&header)?;
        let mut bytes = header.to_vec();
        bytes.resize(MBAP_HEADER_SIZE + pending, 0);
        stream
            .read_exact(&mut bytes[MBAP_HEADER_SIZE..])
            .map_err(map_io)?;

        let response = ResponseFrame::from_bytes(&bytes)?;
        if response.tid != tid {
            return Err(EveError::invalid_response(format!(
                "transaction ID mismatch: sent {}, received {}",
                tid, response.tid
            )));
        }
        // Both slave units share the connection, so the unit echo matters
        // for correlation as much as the transaction ID.
        if response.unit != unit {
            return Err(EveError::invalid_response(format!(
                "unit ID mismatch: sent 0x{unit:02X}, received 0x{:02X}",
                response.unit
            )));
        }
        Ok(response)
    }
}

fn map_io(e: std::io::Error) -> EveError {
    match e.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => EveError::Timeout,
        _ => EveError::Io(e),
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> bool {
        if self.stream.is_some() {
            return true;
        }

        match TcpStream::connect_timeout(&self.addr, self.timeout) {
            Ok(stream) => {
                let configured = stream
                    .set_read_timeout(Some(self.timeout))
                    .and_then(|_| stream.set_write_timeout(Some(self.timeout)))
                    .and_then(|_| stream.set_nodelay(true));
                match configured {
                    Ok(()) => {
                        self.stream = Some(stream);
                        true
                    }
                    Err(e) => {
                        log::debug!("socket setup for {} failed: {e}", self.addr);
                        false
                    }
                }
            }
            Err(e) => {
                log::debug!("connect to {} failed: {e}", self.addr);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn read_registers(
        &mut self,
        unit: u8,
        class: RegisterClass,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>> {
        let tid = self.next_tid();
        let request = frame::read_request(tid, unit, class.read_function(), address, count)?;

        let response = self.exchange(&request, tid, unit)?;
        response.check_exception()?;
        response.registers()
    }

    fn write_registers(&mut self, unit: u8, address: u16, words: &[u16]) -> Result<()> {
        let tid = self.next_tid();
        let request = frame::write_request(tid, unit, address, words)?;

        let response = self.exchange(&request, tid, unit)?;
        response.check_exception()?;
        response.check_write_echo(address, words.len() as u16)
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("addr", &self.addr)
            .field("connected", &self.stream.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Accepts one connection, consumes one read request and answers with
    /// the given raw frame.
    fn one_shot_server(response: Vec<u8>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = [0u8; 12];
            stream.read_exact(&mut request).unwrap();
            stream.write_all(&response).unwrap();
        });
        addr
    }

    fn connected_transport(addr: SocketAddr) -> TcpTransport {
        let mut transport = TcpTransport::new(addr, Duration::from_millis(500));
        assert!(transport.connect());
        transport
    }

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_MODBUS_PORT, 502);
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(2));
    }

    #[test]
    fn test_transport_starts_disconnected() {
        let addr: SocketAddr = "127.0.0.1:502".parse().unwrap();
        let transport = TcpTransport::new(addr, Duration::from_millis(100));
        assert!(!transport.is_connected());
        assert_eq!(transport.addr(), addr);
    }

    #[test]
    fn test_connect_refused() {
        // Port 1 on loopback is closed; connect reports failure instead
        // of erroring.
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let mut transport = TcpTransport::new(addr, Duration::from_millis(100));
        assert!(!transport.connect());
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_read_without_connection() {
        let addr: SocketAddr = "127.0.0.1:502".parse().unwrap();
        let mut transport = TcpTransport::new(addr, Duration::from_millis(100));
        let err = transport
            .read_registers(1, RegisterClass::Holding, 0, 1)
            .unwrap_err();
        assert!(matches!(err, EveError::NotConnected));
    }

    #[test]
    fn test_read_over_socket() {
        // Station answers tid 1, unit 0xC8, one word 0x41BC.
        let addr = one_shot_server(hex::decode("000100000005c8030241bc").unwrap());
        let mut transport = connected_transport(addr);

        let words = transport
            .read_registers(0xC8, RegisterClass::Holding, 0x44e, 1)
            .unwrap();
        assert_eq!(words, vec![0x41BC]);
    }

    #[test]
    fn test_tid_mismatch_rejected() {
        // Well-formed frame, wrong transaction ID (0x99 instead of 1).
        let addr = one_shot_server(hex::decode("009900000005c8030241bc").unwrap());
        let mut transport = connected_transport(addr);

        let err = transport
            .read_registers(0xC8, RegisterClass::Holding, 0x44e, 1)
            .unwrap_err();
        assert!(matches!(err, EveError::InvalidResponse { .. }));
        // Correlation failure drops the stream.
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_unit_mismatch_rejected() {
        // Correct transaction ID, but the socket unit answers instead of
        // the station unit.
        let addr = one_shot_server(hex::decode("00010000000501030241bc").unwrap());
        let mut transport = connected_transport(addr);

        let err = transport
            .read_registers(0xC8, RegisterClass::Holding, 0x44e, 1)
            .unwrap_err();
        assert!(matches!(err, EveError::InvalidResponse { .. }));
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_transport_debug() {
        let addr: SocketAddr = "127.0.0.1:502".parse().unwrap();
        let transport = TcpTransport::new(addr, Duration::from_millis(100));
        let debug_str = format!("{transport:?}");
        assert!(debug_str.contains("TcpTransport"));
        assert!(debug_str.contains("127.0.0.1:502"));
    }
}
