//! Modbus TCP framing: MBAP header plus register PDUs.
//!
//! This module builds request frames and parses response frames for the
//! three functions the register engine needs. It knows nothing about
//! sockets; the transport layer moves the bytes.
//!
//! # Frame Structure
//!
//! Every Modbus TCP frame starts with the 7-byte MBAP header:
//!
//! | Bytes | Field | Description |
//! |-------|----------------|----------------------------------------|
//! | 0-1 | Transaction ID | Echoed by the server, matches responses |
//! | 2-3 | Protocol ID | Always 0x0000 |
//! | 4-5 | Length | Byte count of unit ID + PDU |
//! | 6 | Unit ID | Sub-device address on the bus |
//!
//! The PDU follows: one function code byte and function-specific data.
//!
//! # Functions
//!
//! - [`FC_READ_HOLDING`] (0x03) — Read Holding Registers
//! - [`FC_READ_INPUT`] (0x04) — Read Input Registers
//! - [`FC_WRITE_MULTIPLE`] (0x10) — Write Multiple Registers
//!
//! An exception response sets the high bit of the function code and
//! carries a single exception-code byte.
//!
//! # Example
//!
//! ```
//! use alfen_eve::frame::{read_request, ResponseFrame, FC_READ_HOLDING};
//!
//! // Request two words at 0x44e from unit 0xC8.
//! let request = read_request(1, 0xC8, FC_READ_HOLDING, 0x44e, 2).unwrap();
//! assert_eq!(request.len(), 12);
//!
//! // Parse the station's answer.
//! let bytes = [0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0xC8, 0x03, 0x04, 0x41, 0xBC, 0x00, 0x00];
//! let response = ResponseFrame::from_bytes(&bytes).unwrap();
//! assert_eq!(response.registers().unwrap(), vec![0x41BC, 0x0000]);
//! ```

use crate::error::{EveError, Result};

/// MBAP header size in bytes.
pub const MBAP_HEADER_SIZE: usize = 7;

/// Modbus TCP protocol identifier, always zero.
pub const PROTOCOL_ID: u16 = 0x0000;

/// Read Holding Registers function code.
pub const FC_READ_HOLDING: u8 = 0x03;

/// Read Input Registers function code.
pub const FC_READ_INPUT: u8 = 0x04;

/// Write Multiple Registers function code.
pub const FC_WRITE_MULTIPLE: u8 = 0x10;

/// Maximum registers per read request (Modbus specification).
pub const MAX_READ_COUNT: u16 = 125;

/// Maximum registers per write request (Modbus specification).
pub const MAX_WRITE_COUNT: u16 = 123;

fn mbap(tid: u16, unit: u8, pdu_len: usize) -> Vec<u8> {
    let length = (pdu_len + 1) as u16; // unit ID + PDU
    let mut header = Vec::with_capacity(MBAP_HEADER_SIZE + pdu_len);
    header.extend_from_slice(&tid.to_be_bytes());
    header.extend_from_slice(&PROTOCOL_ID.to_be_bytes());
    header.extend_from_slice(&length.to_be_bytes());
    header.push(unit);
    header
}

/// Builds a register read request frame.
///
/// # Errors
///
/// Returns `EveError::InvalidParameter` if `function` is not a register
/// read or `count` is zero or above [`MAX_READ_COUNT`].
pub fn read_request(tid: u16, unit: u8, function: u8, address: u16, count: u16) -> Result<Vec<u8>> {
    if function != FC_READ_HOLDING && function != FC_READ_INPUT {
        return Err(EveError::invalid_parameter(
            "function",
            format!("0x{function:02X} is not a register read"),
        ));
    }
    if count == 0 || count > MAX_READ_COUNT {
        return Err(EveError::invalid_parameter(
            "count",
            format!("must be 1-{MAX_READ_COUNT}, got {count}"),
        ));
    }

    let mut frame = mbap(tid, unit, 5);
    frame.push(function);
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&count.to_be_bytes());
    Ok(frame)
}

/// Builds a Write Multiple Registers request frame.
///
/// # Errors
///
/// Returns `EveError::InvalidParameter` if `words` is empty or longer
/// than [`MAX_WRITE_COUNT`].
pub fn write_request(tid: u16, unit: u8, address: u16, words: &[u16]) -> Result<Vec<u8>> {
    if words.is_empty() || words.len() > MAX_WRITE_COUNT as usize {
        return Err(EveError::invalid_parameter(
            "words",
            format!("must be 1-{MAX_WRITE_COUNT} registers, got {}", words.len()),
        ));
    }

    let count = words.len() as u16;
    let mut frame = mbap(tid, unit, 6 + words.len() * 2);
    frame.push(FC_WRITE_MULTIPLE);
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&count.to_be_bytes());
    frame.push((words.len() * 2) as u8);
    for word in words {
        frame.extend_from_slice(&word.to_be_bytes());
    }
    Ok(frame)
}

/// Returns how many bytes follow a 7-byte MBAP header on the wire.
///
/// # Errors
///
/// Returns `EveError::InvalidResponse` if the header is short, carries a
/// non-zero protocol ID, or declares a zero length.
pub fn pending_length(header: &[u8]) -> Result<usize> {
    if header.len() < MBAP_HEADER_SIZE {
        return Err(EveError::invalid_response(format!(
            "MBAP header needs {} bytes, got {}",
            MBAP_HEADER_SIZE,
            header.len()
        )));
    }

    let protocol = u16::from_be_bytes([header[2], header[3]]);
    if protocol != PROTOCOL_ID {
        return Err(EveError::invalid_response(format!(
            "unexpected protocol ID 0x{protocol:04X}"
        )));
    }

    let length = u16::from_be_bytes([header[4], header[5]]) as usize;
    if length == 0 {
        return Err(EveError::invalid_response("zero-length frame"));
    }
    // The length field counts the unit ID, which sits inside the header.
    Ok(length - 1)
}

/// Parsed Modbus TCP response frame.
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    /// Transaction identifier echoed by the server.
    pub tid: u16,
    /// Unit identifier echoed by the server.
    pub unit: u8,
    /// Function code, high bit set on exceptions.
    pub function: u8,
    /// PDU bytes after the function code.
    pub payload: Vec<u8>,
}

impl ResponseFrame {
    /// Parses a complete frame (MBAP header included).
    ///
    /// # Errors
    ///
    /// Returns `EveError::InvalidResponse` if the frame is truncated, the
    /// protocol ID is wrong, or the length field disagrees with the byte
    /// count actually received.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let pending = pending_length(bytes)?;
        if bytes.len() != MBAP_HEADER_SIZE + pending {
            return Err(EveError::invalid_response(format!(
                "length field declares {} bytes after the header, got {}",
                pending,
                bytes.len() - MBAP_HEADER_SIZE
            )));
        }
        if pending == 0 {
            return Err(EveError::invalid_response("frame has no function code"));
        }

        Ok(Self {
            tid: u16::from_be_bytes([bytes[0], bytes[1]]),
            unit: bytes[6],
            function: bytes[7],
            payload: bytes[MBAP_HEADER_SIZE + 1..].to_vec(),
        })
    }

    /// Returns whether this frame is an exception response.
    pub fn is_exception(&self) -> bool {
        self.function & 0x80 != 0
    }

    /// Fails with `EveError::Exception` if this frame is an exception
    /// response.
    pub fn check_exception(&self) -> Result<()> {
        if !self.is_exception() {
            return Ok(());
        }
        let code = self.payload.first().copied().unwrap_or(0);
        Err(EveError::exception(self.function & 0x7F, code))
    }

    /// Extracts register words from a read response payload.
    ///
    /// # Errors
    ///
    /// Returns `EveError::InvalidResponse` if the function is not a
    /// register read or the declared byte count disagrees with the
    /// payload.
    pub fn registers(&self) -> Result<Vec<u16>> {
        if self.function != FC_READ_HOLDING && self.function != FC_READ_INPUT {
            return Err(EveError::invalid_response(format!(
                "function 0x{:02X} carries no registers",
                self.function
            )));
        }

        let byte_count = self.payload.first().copied().ok_or_else(|| {
            EveError::invalid_response("read response missing byte count")
        })? as usize;
        let data = &self.payload[1..];
        if data.len() != byte_count || byte_count % 2 != 0 {
            return Err(EveError::invalid_response(format!(
                "byte count {} disagrees with {} payload bytes",
                byte_count,
                data.len()
            )));
        }

        Ok(data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Validates the address/quantity echo of a write response.
    ///
    /// # Errors
    ///
    /// Returns `EveError::InvalidResponse` if the echo disagrees with the
    /// request.
    pub fn check_write_echo(&self, address: u16, count: u16) -> Result<()> {
        if self.function != FC_WRITE_MULTIPLE || self.payload.len() != 4 {
            return Err(EveError::invalid_response("malformed write response"));
        }

        let echo_address = u16::from_be_bytes([self.payload[0], self.payload[1]]);
        let echo_count = u16::from_be_bytes([self.payload[2], self.payload[3]]);
        if echo_address != address || echo_count != count {
            return Err(EveError::invalid_response(format!(
                "write echo 0x{echo_address:04X}+{echo_count} disagrees with request 0x{address:04X}+{count}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_golden_frame() {
        let frame = read_request(1, 0xC8, FC_READ_HOLDING, 0x44e, 2).unwrap();
        assert_eq!(frame, hex::decode("000100000006c803044e0002").unwrap());
    }

    #[test]
    fn test_read_request_input_function() {
        let frame = read_request(7, 0x01, FC_READ_INPUT, 0x132, 20).unwrap();
        assert_eq!(frame, hex::decode("000700000006010401320014").unwrap());
    }

    #[test]
    fn test_read_request_rejects_bad_count() {
        assert!(read_request(1, 1, FC_READ_HOLDING, 0, 0).is_err());
        assert!(read_request(1, 1, FC_READ_HOLDING, 0, 126).is_err());
    }

    #[test]
    fn test_read_request_rejects_write_function() {
        assert!(read_request(1, 1, FC_WRITE_MULTIPLE, 0, 1).is_err());
    }

    #[test]
    fn test_write_request_golden_frame() {
        // Write 6.0f32 (0x40C00000) to modbus_slave_max_current at 0x4ba.
        let frame = write_request(2, 0x01, 0x4ba, &[0x40C0, 0x0000]).unwrap();
        assert_eq!(
            frame,
            hex::decode("00020000000b011004ba00020440c00000").unwrap()
        );
    }

    #[test]
    fn test_write_request_rejects_empty() {
        assert!(write_request(1, 1, 0, &[]).is_err());
    }

    #[test]
    fn test_pending_length() {
        let header = hex::decode("00010000000bc8").unwrap();
        assert_eq!(pending_length(&header).unwrap(), 10);
    }

    #[test]
    fn test_pending_length_rejects_protocol() {
        let header = hex::decode("000100010006c8").unwrap();
        assert!(pending_length(&header).is_err());
    }

    #[test]
    fn test_response_roundtrip() {
        let bytes = hex::decode("000100000007c8030441bc0000").unwrap();
        let response = ResponseFrame::from_bytes(&bytes).unwrap();

        assert_eq!(response.tid, 1);
        assert_eq!(response.unit, 0xC8);
        assert_eq!(response.function, FC_READ_HOLDING);
        assert!(response.check_exception().is_ok());
        assert_eq!(response.registers().unwrap(), vec![0x41BC, 0x0000]);
    }

    #[test]
    fn test_response_truncated() {
        let bytes = hex::decode("000100000007c80304").unwrap();
        assert!(ResponseFrame::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_response_exception() {
        let bytes = hex::decode("000100000003c88302").unwrap();
        let response = ResponseFrame::from_bytes(&bytes).unwrap();

        assert!(response.is_exception());
        let err = response.check_exception().unwrap_err();
        assert!(matches!(
            err,
            EveError::Exception {
                function: 0x03,
                code: 0x02
            }
        ));
    }

    #[test]
    fn test_registers_byte_count_mismatch() {
        let bytes = hex::decode("000100000005c8030441bc").unwrap();
        let response = ResponseFrame::from_bytes(&bytes).unwrap();
        assert!(response.registers().is_err());
    }

    #[test]
    fn test_write_echo() {
        let bytes = hex::decode("000200000006011004ba0002").unwrap();
        let response = ResponseFrame::from_bytes(&bytes).unwrap();

        assert!(response.check_write_echo(0x4ba, 2).is_ok());
        assert!(response.check_write_echo(0x4ba, 3).is_err());
        assert!(response.check_write_echo(0x4bb, 2).is_err());
    }
}
