//! Modbus TCP client for Alfen Eve charging stations.
//!
//! This crate reads and writes the registers an Alfen Eve station exposes
//! over Modbus TCP, addressed by logical name instead of raw address. A
//! built-in catalog describes every register's wire contract (address,
//! length, encoding, value type, polling batch), and the client turns the
//! catalog into transactions: single-field reads, bulk snapshots of
//! everything the station publishes, and setpoint writes.
//!
//! # Features
//!
//! - **Named registers** - read `"temperature"` or `"voltage_phase_L1N"`
//!   instead of remembering word addresses and encodings
//! - **Bulk snapshots** - one minimal span per batch, decoded field by
//!   field; a failed batch is omitted, never fails the whole poll
//! - **Retry policy** - bounded attempts with reconnect-on-demand for
//!   reads; writes are issued exactly once
//! - **Domain helpers** - charging current, pause, phase switching
//!
//! # Quick start
//!
//! ```no_run
//! use alfen_eve::{Client, ClientConfig, RegisterClass, Value};
//! use std::net::Ipv4Addr;
//!
//! fn main() -> alfen_eve::Result<()> {
//!     let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 100));
//!     let mut client = Client::new(config);
//!
//!     // Poll everything the station exposes.
//!     let snapshot = client.read_all(RegisterClass::Holding)?;
//!     for (name, value) in &snapshot {
//!         println!("{name} = {value}");
//!     }
//!
//!     // Limit the socket to 10 A.
//!     client.write("modbus_slave_max_current", Value::Float(10.0))?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`catalog`] - register descriptors and the station catalog
//! - [`codec`] - word-stream decoding and value encoding
//! - [`batch`] - span planning for bulk reads
//! - [`client`] - the read/write engines and retry policy
//! - [`transport`] - the Modbus TCP session
//! - [`frame`] - MBAP framing and protocol constants
//! - [`error`] - the crate error type

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod batch;
pub mod catalog;
pub mod client;
pub mod codec;
pub mod error;
pub mod frame;
pub mod transport;

pub use batch::{plan, Span};
pub use catalog::{
    Encoding, RegisterCatalog, RegisterClass, RegisterDescriptor, TargetType,
};
pub use client::{Client, ClientConfig, Snapshot, DEFAULT_BACKOFF, DEFAULT_RETRIES};
pub use codec::{encode, Cursor, Value};
pub use error::{exception_description, EveError, Result};
pub use transport::{TcpTransport, Transport, DEFAULT_MODBUS_PORT, DEFAULT_TIMEOUT};
