//! Error types for the Alfen Eve register client.

use std::io;
use thiserror::Error;

/// Result type alias for register operations.
pub type Result<T> = std::result::Result<T, EveError>;

/// Errors that can occur while talking to a charging station.
///
/// Transient transport conditions (`Timeout`, `NotConnected`, `Io`,
/// `InvalidResponse`, `Exception`) are absorbed by the retry loop on the
/// read path and never reach the caller of [`Client::read`] or
/// [`Client::read_all`]; those methods report an exhausted field or batch
/// as "unavailable" instead. Structural errors (`UnknownRegister`,
/// `ReadOnlyRegister`, `DecodeError`, `EncodeError`) are always surfaced
/// immediately.
///
/// [`Client::read`]: crate::Client::read
/// [`Client::read_all`]: crate::Client::read_all
#[derive(Debug, Error)]
pub enum EveError {
    /// The requested logical name is not in the register catalog.
    #[error("unknown register '{name}'")]
    UnknownRegister {
        /// Name that was looked up.
        name: String,
    },

    /// A write was attempted on an input-class (read-only) register.
    #[error("register '{name}' is read-only")]
    ReadOnlyRegister {
        /// Name of the read-only register.
        name: String,
    },

    /// Retrieved words could not be interpreted per the descriptor.
    ///
    /// Indicates a mismatch between the catalog and the device data, such
    /// as a buffer shorter than the descriptor's word length.
    #[error("decode error: {reason}")]
    DecodeError {
        /// Description of the decode failure.
        reason: String,
    },

    /// A value is incompatible with the descriptor it was written through.
    #[error("encode error: {reason}")]
    EncodeError {
        /// Description of the encode failure.
        reason: String,
    },

    /// A write transaction failed at the transport level.
    ///
    /// Writes are never retried: a retried write risks double-applying a
    /// stateful command, so the failure is handed straight to the caller.
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of the underlying transport failure.
        reason: String,
    },

    /// The station answered with a Modbus exception response.
    #[error("modbus exception: function 0x{function:02X}, code 0x{code:02X} ({})", exception_description(*.code))]
    Exception {
        /// Function code of the rejected request.
        function: u8,
        /// Exception code from the response PDU.
        code: u8,
    },

    /// A response frame could not be parsed.
    #[error("invalid response: {reason}")]
    InvalidResponse {
        /// Description of the framing error.
        reason: String,
    },

    /// Invalid parameter provided by the caller.
    #[error("invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// Communication timeout.
    #[error("communication timeout")]
    Timeout,

    /// Operation attempted without an established connection.
    #[error("not connected")]
    NotConnected,

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EveError {
    /// Creates a new `UnknownRegister` error.
    pub fn unknown_register(name: impl Into<String>) -> Self {
        Self::UnknownRegister { name: name.into() }
    }

    /// Creates a new `ReadOnlyRegister` error.
    pub fn read_only_register(name: impl Into<String>) -> Self {
        Self::ReadOnlyRegister { name: name.into() }
    }

    /// Creates a new `DecodeError`.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::DecodeError {
            reason: reason.into(),
        }
    }

    /// Creates a new `EncodeError`.
    pub fn encode(reason: impl Into<String>) -> Self {
        Self::EncodeError {
            reason: reason.into(),
        }
    }

    /// Creates a new `WriteFailed` error.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }

    /// Creates a new `Exception` error from the rejected function and code.
    pub fn exception(function: u8, code: u8) -> Self {
        Self::Exception { function, code }
    }

    /// Creates a new `InvalidResponse` error.
    pub fn invalid_response(reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidParameter` error.
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

/// Returns a human-readable description for a Modbus exception code.
///
/// # Example
///
/// ```
/// use alfen_eve::exception_description;
///
/// assert_eq!(exception_description(0x02), "illegal data address");
/// ```
pub fn exception_description(code: u8) -> &'static str {
    match code {
        0x01 => "illegal function",
        0x02 => "illegal data address",
        0x03 => "illegal data value",
        0x04 => "server device failure",
        0x05 => "acknowledge",
        0x06 => "server device busy",
        0x08 => "memory parity error",
        0x0A => "gateway path unavailable",
        0x0B => "gateway target device failed to respond",
        _ => "unknown exception",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_register_display() {
        let err = EveError::unknown_register("bogus");
        assert_eq!(err.to_string(), "unknown register 'bogus'");
    }

    #[test]
    fn test_read_only_register_display() {
        let err = EveError::read_only_register("meter_state");
        assert_eq!(err.to_string(), "register 'meter_state' is read-only");
    }

    #[test]
    fn test_exception_display() {
        let err = EveError::exception(0x03, 0x02);
        assert_eq!(
            err.to_string(),
            "modbus exception: function 0x03, code 0x02 (illegal data address)"
        );
    }

    #[test]
    fn test_write_failed_display() {
        let err = EveError::write_failed("connection reset");
        assert_eq!(err.to_string(), "write failed: connection reset");
    }

    #[test]
    fn test_timeout_display() {
        let err = EveError::Timeout;
        assert_eq!(err.to_string(), "communication timeout");
    }

    #[test]
    fn test_exception_descriptions() {
        assert_eq!(exception_description(0x01), "illegal function");
        assert_eq!(exception_description(0x06), "server device busy");
        assert_eq!(exception_description(0xFF), "unknown exception");
    }
}
