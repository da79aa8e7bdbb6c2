//! High-level client: single-field reads, bulk snapshots and writes.
//!
//! This module provides the [`Client`] struct, the primary interface for
//! polling and updating a charging station's registers by logical name.
//!
//! # Overview
//!
//! The client ties the other modules together:
//! - the [`RegisterCatalog`] maps a name to its wire contract
//! - the batch planner computes one minimal span per batch
//! - the codec walks returned word streams and encodes written values
//! - a [`Transport`] carries one blocking transaction at a time
//!
//! # Read policy
//!
//! Reads retry up to a configured bound (default 3 attempts). An attempt
//! finding the transport disconnected reconnects, backs off briefly and
//! counts as spent; a response whose word count differs from the request
//! is discarded and counts as a failed attempt. Exhausting the attempts
//! yields "unavailable" (`None` for a single field, an omitted batch for
//! a snapshot), never an error: a caller polling telemetry needs partial
//! data more than an all-or-nothing read.
//!
//! Writes never retry. A retried write risks applying a stateful command
//! twice, so transport failures surface directly as `WriteFailed`.
//!
//! # Concurrency
//!
//! Every operation is a blocking round trip holding `&mut self`; the
//! borrow checker enforces the single-transaction discipline the shared
//! connection requires. Callers that poll periodically own their own
//! loop.
//!
//! # Example
//!
//! ```no_run
//! use alfen_eve::{Client, ClientConfig, RegisterClass};
//! use std::net::Ipv4Addr;
//!
//! let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 100));
//! let mut client = Client::new(config);
//!
//! // One field.
//! if let Some(temperature) = client.read("temperature")? {
//!     println!("board temperature: {temperature}");
//! }
//!
//! // Everything the station exposes, best effort.
//! let snapshot = client.read_all(RegisterClass::Holding)?;
//! for (name, value) in &snapshot {
//!     println!("{name} = {value}");
//! }
//! # Ok::<(), alfen_eve::EveError>(())
//! ```

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::batch::{self, Span};
use crate::catalog::{RegisterCatalog, RegisterClass};
use crate::codec::{self, Cursor, Value};
use crate::error::{EveError, Result};
use crate::transport::{TcpTransport, Transport, DEFAULT_MODBUS_PORT, DEFAULT_TIMEOUT};

/// Default number of read attempts before a field is reported
/// unavailable.
pub const DEFAULT_RETRIES: u32 = 3;

/// Default pause between a reconnect and the next attempt.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

/// One complete best-effort result set from a bulk read.
///
/// Batches whose transaction failed are simply absent: a missing key
/// means "unknown", never zero.
pub type Snapshot = BTreeMap<&'static str, Value>;

/// Configuration for creating a TCP-backed client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Station socket address.
    pub addr: SocketAddr,
    /// Socket timeout for connect/read/write.
    pub timeout: Duration,
    /// Read attempts before reporting a field unavailable.
    pub retries: u32,
    /// Pause after a reconnect before the next attempt.
    pub backoff: Duration,
}

impl ClientConfig {
    /// Creates a configuration for a station at the default Modbus port.
    ///
    /// # Example
    ///
    /// ```
    /// use alfen_eve::ClientConfig;
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 100));
    /// assert_eq!(config.addr.port(), 502);
    /// ```
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            addr: SocketAddr::from((ip, DEFAULT_MODBUS_PORT)),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Sets a custom port (default is 502).
    pub fn with_port(mut self, port: u16) -> Self {
        self.addr.set_port(port);
        self
    }

    /// Sets a custom socket timeout (default is 2 seconds).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets a custom read retry bound (default is 3).
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets a custom reconnect backoff (default is 100 ms).
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Register client for an Alfen Eve charging station.
///
/// Generic over the [`Transport`] so that engines and tests can run
/// against anything that moves register transactions; production code
/// uses [`Client::new`] and gets a [`TcpTransport`].
pub struct Client<T: Transport> {
    transport: T,
    catalog: RegisterCatalog,
    retries: u32,
    backoff: Duration,
}

impl Client<TcpTransport> {
    /// Creates a client for a station, using the car charger catalog.
    ///
    /// The transport starts disconnected; the first read connects on
    /// demand.
    ///
    /// # Example
    ///
    /// ```
    /// use alfen_eve::{Client, ClientConfig};
    /// use std::net::Ipv4Addr;
    ///
    /// let config = ClientConfig::new(Ipv4Addr::new(192, 168, 1, 100));
    /// let client = Client::new(config);
    /// ```
    pub fn new(config: ClientConfig) -> Self {
        Self {
            transport: TcpTransport::new(config.addr, config.timeout),
            catalog: RegisterCatalog::car_charger(),
            retries: config.retries,
            backoff: config.backoff,
        }
    }
}

impl<T: Transport> Client<T> {
    /// Creates a client over an existing transport and catalog.
    ///
    /// Useful for sharing a session with another engine or substituting
    /// a transport in tests.
    pub fn with_transport(transport: T, catalog: RegisterCatalog) -> Self {
        Self {
            transport,
            catalog,
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Sets a custom read retry bound.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets a custom reconnect backoff.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns the register catalog this client reads from.
    pub fn catalog(&self) -> &RegisterCatalog {
        &self.catalog
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issues one read transaction for a span, with the retry policy.
    ///
    /// Returns `None` once the attempts are exhausted. A response with
    /// the wrong word count is a failed attempt, never decoded.
    fn read_span(&mut self, slave: u8, class: RegisterClass, span: Span) -> Option<Vec<u16>> {
        for attempt in 1..=self.retries {
            if !self.transport.is_connected() {
                debug!("attempt {attempt}: transport disconnected, reconnecting");
                self.transport.connect();
                thread::sleep(self.backoff);
                continue;
            }

            match self.transport.read_registers(slave, class, span.start, span.count) {
                Ok(words) if words.len() == span.count as usize => return Some(words),
                Ok(words) => {
                    debug!(
                        "attempt {attempt}: span {span} answered {} words, expected {}",
                        words.len(),
                        span.count
                    );
                }
                Err(e) => {
                    debug!("attempt {attempt}: span {span} failed: {e}");
                }
            }
        }
        None
    }

    /// Reads a single field by logical name.
    ///
    /// Issues one transaction spanning exactly the field's registers and
    /// decodes it with a fresh cursor. Returns `Ok(None)` when the
    /// transport could not produce a usable response within the retry
    /// bound, so that pollers can treat a transient miss as "no value
    /// yet".
    ///
    /// # Errors
    ///
    /// Returns `EveError::UnknownRegister` for a name outside the
    /// catalog, or `EveError::DecodeError` on a catalog/device mismatch.
    pub fn read(&mut self, name: &str) -> Result<Option<Value>> {
        let desc = self.catalog.lookup(name)?;
        let span = Span::new(desc.address, desc.word_length);

        let Some(words) = self.read_span(desc.slave, desc.class, span) else {
            warn!("register '{name}' unavailable after {} attempts", self.retries);
            return Ok(None);
        };

        let mut cursor = Cursor::new(&words, desc.address);
        Ok(Some(cursor.decode_next(desc)?))
    }

    /// Reads every catalog field of a register class, best effort.
    ///
    /// Batches are fetched in catalog-declared order, one minimal span
    /// per batch; fields within a batch decode sequentially in ascending
    /// address order, skipping gaps. A batch whose transaction fails
    /// after retries is logged and omitted from the snapshot; the read
    /// carries on with the next batch.
    ///
    /// # Errors
    ///
    /// Returns `EveError::DecodeError` only on a catalog/device
    /// mismatch; transport trouble alone never fails a snapshot.
    pub fn read_all(&mut self, class: RegisterClass) -> Result<Snapshot> {
        let mut snapshot = Snapshot::new();

        for tag in self.catalog.batch_tags(class) {
            let descriptors = self.catalog.by_class_and_batch(class, tag);
            let Some(span) = batch::plan(&descriptors) else {
                continue;
            };

            let slave = descriptors[0].slave;
            let Some(words) = self.read_span(slave, class, span) else {
                warn!("batch {tag} (span {span}) unavailable, omitting its fields");
                continue;
            };

            let mut cursor = Cursor::new(&words, span.start);
            for desc in descriptors {
                snapshot.insert(desc.name, cursor.decode_next(desc)?);
            }
        }

        Ok(snapshot)
    }

    /// Writes a value to a holding register by logical name.
    ///
    /// Encodes the value per the field's wire contract and issues exactly
    /// one write transaction covering the field's registers. No retry.
    ///
    /// # Errors
    ///
    /// - `EveError::UnknownRegister` for a name outside the catalog
    /// - `EveError::ReadOnlyRegister` for an input-class field; no
    ///   transport call is made
    /// - `EveError::EncodeError` if the value does not fit the field
    /// - `EveError::WriteFailed` if the transaction fails
    pub fn write(&mut self, name: &str, value: Value) -> Result<()> {
        let desc = self.catalog.lookup(name)?;
        if !desc.class.is_writable() {
            return Err(EveError::read_only_register(name));
        }

        let words = codec::encode(desc, &value)?;
        self.transport
            .write_registers(desc.slave, desc.address, &words)
            .map_err(|e| EveError::write_failed(e.to_string()))
    }

    /// Sets the socket's maximum charging current in amperes.
    pub fn set_current(&mut self, amps: f64) -> Result<()> {
        self.write("modbus_slave_max_current", Value::Float(amps))
    }

    /// Drops the charging current to the pause level.
    ///
    /// Reads the current setpoint first and leaves the station untouched
    /// when it is already at or below the pause threshold, or when the
    /// setpoint is unavailable.
    pub fn pause_charging(&mut self) -> Result<()> {
        const PAUSE_CURRENT: f64 = 5.0;
        const PAUSE_THRESHOLD: f64 = 5.5;

        let Some(value) = self.read("modbus_slave_max_current")? else {
            warn!("max current unavailable, leaving charger untouched");
            return Ok(());
        };
        let amps = value.as_f64().unwrap_or(0.0);

        if amps > PAUSE_THRESHOLD {
            info!("pausing charging: {amps} A -> {PAUSE_CURRENT} A");
            self.set_current(PAUSE_CURRENT)
        } else {
            info!("charging already paused at {amps} A");
            Ok(())
        }
    }

    /// Switches the socket between single- and three-phase charging.
    ///
    /// Skips the write when the station already charges with the
    /// requested phase count, and reads the setting back afterwards.
    ///
    /// # Errors
    ///
    /// Returns `EveError::InvalidParameter` for any phase count other
    /// than 1 or 3.
    pub fn switch_phase(&mut self, phases: u64) -> Result<()> {
        if phases != 1 && phases != 3 {
            return Err(EveError::invalid_parameter(
                "phases",
                format!("must be 1 or 3, got {phases}"),
            ));
        }

        if let Some(current) = self.read("charge_using_1_or_3_phases")? {
            if current.as_u64() == Some(phases) {
                info!("already charging with {phases} phase(s)");
                return Ok(());
            }
            info!("switching from {current} to {phases} phase(s)");
        }

        self.write("charge_using_1_or_3_phases", Value::Unsigned(phases))?;

        match self.read("charge_using_1_or_3_phases")? {
            Some(current) => info!("now charging with {current} phase(s)"),
            None => warn!("phase count not readable after switch"),
        }
        Ok(())
    }
}

impl<T: Transport + std::fmt::Debug> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("transport", &self.transport)
            .field("registers", &self.catalog.len())
            .field("retries", &self.retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Encoding, RegisterDescriptor, TargetType};
    use std::collections::{BTreeMap, HashSet};

    /// Word-addressed fake station: a register memory per (slave, addr),
    /// scripted failures per span start, recorded transactions.
    #[derive(Debug, Default)]
    struct MockTransport {
        connected: bool,
        accept_connect: bool,
        connect_calls: usize,
        reads: Vec<(u8, u16, u16)>,
        writes: Vec<(u8, u16, Vec<u16>)>,
        memory: BTreeMap<(u8, u16), u16>,
        fail_reads_at: HashSet<u16>,
        short_responses: bool,
        fail_writes: bool,
    }

    impl MockTransport {
        fn connected() -> Self {
            Self {
                connected: true,
                accept_connect: true,
                ..Self::default()
            }
        }

        fn unreachable() -> Self {
            Self::default()
        }

        fn load_words(&mut self, slave: u8, address: u16, words: &[u16]) {
            for (i, &word) in words.iter().enumerate() {
                self.memory.insert((slave, address + i as u16), word);
            }
        }

        fn load_f32(&mut self, slave: u8, address: u16, value: f32) {
            let bits = value.to_bits();
            self.load_words(slave, address, &[(bits >> 16) as u16, bits as u16]);
        }
    }

    impl Transport for MockTransport {
        fn connect(&mut self) -> bool {
            self.connect_calls += 1;
            if self.accept_connect {
                self.connected = true;
            }
            self.connected
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn read_registers(
            &mut self,
            unit: u8,
            _class: RegisterClass,
            address: u16,
            count: u16,
        ) -> crate::Result<Vec<u16>> {
            self.reads.push((unit, address, count));
            if self.fail_reads_at.contains(&address) {
                return Err(EveError::Timeout);
            }
            if self.short_responses {
                return Ok(vec![0; count as usize - 1]);
            }
            Ok((address..address + count)
                .map(|a| self.memory.get(&(unit, a)).copied().unwrap_or(0))
                .collect())
        }

        fn write_registers(&mut self, unit: u8, address: u16, words: &[u16]) -> crate::Result<()> {
            self.writes.push((unit, address, words.to_vec()));
            if self.fail_writes {
                return Err(EveError::Timeout);
            }
            self.load_words(unit, address, words);
            Ok(())
        }
    }

    fn client(transport: MockTransport) -> Client<MockTransport> {
        Client::with_transport(transport, RegisterCatalog::car_charger())
            .with_backoff(Duration::ZERO)
    }

    // Two-field catalog with a three-word gap, for gap-skip checks.
    static GAP_REGS: &[RegisterDescriptor] = &[
        RegisterDescriptor {
            name: "low",
            slave: 1,
            address: 10,
            word_length: 2,
            class: RegisterClass::Holding,
            encoding: Encoding::UInt32,
            target: TargetType::Unsigned,
            label: "",
            unit: "",
            batch: 1,
        },
        RegisterDescriptor {
            name: "high",
            slave: 1,
            address: 15,
            word_length: 2,
            class: RegisterClass::Holding,
            encoding: Encoding::Float32,
            target: TargetType::Float,
            label: "",
            unit: "",
            batch: 1,
        },
    ];

    static INPUT_REGS: &[RegisterDescriptor] = &[RegisterDescriptor {
        name: "sensor",
        slave: 1,
        address: 0,
        word_length: 1,
        class: RegisterClass::Input,
        encoding: Encoding::UInt16,
        target: TargetType::Unsigned,
        label: "",
        unit: "",
        batch: 1,
    }];

    #[test]
    fn test_read_temperature_end_to_end() {
        let mut transport = MockTransport::connected();
        transport.load_f32(0xc8, 0x44e, 23.5);

        let mut client = client(transport);
        let value = client.read("temperature").unwrap();

        assert_eq!(value, Some(Value::Float(23.5)));
        assert_eq!(client.transport().reads, vec![(0xc8, 0x44e, 2)]);
    }

    #[test]
    fn test_read_unknown_register() {
        let mut client = client(MockTransport::connected());
        let err = client.read("flux_capacitor").unwrap_err();
        assert!(matches!(err, EveError::UnknownRegister { .. }));
    }

    #[test]
    fn test_read_retry_bound_when_unreachable() {
        // A transport that never connects: exactly `retries` attempts,
        // each spent on a reconnect, then the unavailable sentinel.
        let mut client = client(MockTransport::unreachable());
        let value = client.read("temperature").unwrap();

        assert_eq!(value, None);
        assert_eq!(client.transport().connect_calls, 3);
        assert!(client.transport().reads.is_empty());
    }

    #[test]
    fn test_read_short_response_retried_not_decoded() {
        let mut transport = MockTransport::connected();
        transport.short_responses = true;

        let mut client = client(transport);
        let value = client.read("temperature").unwrap();

        assert_eq!(value, None);
        assert_eq!(client.transport().reads.len(), 3);
    }

    #[test]
    fn test_read_all_partial_failure_isolated() {
        let mut transport = MockTransport::connected();
        transport.load_f32(0xc8, 0x44e, 23.5);
        transport.load_f32(0x1, 0x132, 230.0);
        // Batch 6 (cumulative energy) fails its transaction.
        transport.fail_reads_at.insert(0x16a);

        let mut client = client(transport);
        let snapshot = client.read_all(RegisterClass::Holding).unwrap();

        assert_eq!(snapshot.get("temperature"), Some(&Value::Float(23.5)));
        assert_eq!(
            snapshot.get("voltage_phase_L1N"),
            Some(&Value::Float(230.0))
        );
        // The failed batch's keys are absent, not zeroed.
        assert!(!snapshot.contains_key("real_energy_delivered_sum"));
        assert!(!snapshot.contains_key("apparent_energy_phase_L2"));
        let catalog = RegisterCatalog::car_charger();
        let energy_fields = catalog
            .by_class_and_batch(RegisterClass::Holding, 6)
            .len();
        assert_eq!(snapshot.len(), catalog.len() - energy_fields);
    }

    #[test]
    fn test_read_all_gap_skip_matches_single_reads() {
        let mut transport = MockTransport::connected();
        transport.load_words(1, 10, &[0x0000, 0x0001]);
        transport.load_words(1, 13, &[0xDEAD, 0xBEEF]); // gap filler
        transport.load_f32(1, 15, 23.5);

        let mut bulk = Client::with_transport(transport, RegisterCatalog::new(GAP_REGS))
            .with_backoff(Duration::ZERO);
        let snapshot = bulk.read_all(RegisterClass::Holding).unwrap();

        // One transaction covering the whole span, gap included.
        assert_eq!(bulk.transport().reads, vec![(1, 10, 7)]);

        let low = bulk.read("low").unwrap().unwrap();
        let high = bulk.read("high").unwrap().unwrap();
        assert_eq!(snapshot.get("low"), Some(&low));
        assert_eq!(snapshot.get("high"), Some(&high));
        assert_eq!(low, Value::Unsigned(1));
        assert_eq!(high, Value::Float(23.5));
    }

    #[test]
    fn test_write_encodes_and_issues_one_transaction() {
        let mut client = client(MockTransport::connected());
        client
            .write("modbus_slave_max_current", Value::Float(6.0))
            .unwrap();

        assert_eq!(
            client.transport().writes,
            vec![(0x1, 0x4ba, vec![0x40C0, 0x0000])]
        );
    }

    #[test]
    fn test_write_rejected_on_input_register() {
        let mut client =
            Client::with_transport(MockTransport::connected(), RegisterCatalog::new(INPUT_REGS));
        let err = client.write("sensor", Value::Unsigned(1)).unwrap_err();

        assert!(matches!(err, EveError::ReadOnlyRegister { .. }));
        assert!(client.transport().writes.is_empty());
    }

    #[test]
    fn test_write_type_mismatch_skips_transport() {
        let mut client = client(MockTransport::connected());
        let err = client
            .write("modbus_slave_max_current", Value::Text("6".into()))
            .unwrap_err();

        assert!(matches!(err, EveError::EncodeError { .. }));
        assert!(client.transport().writes.is_empty());
    }

    #[test]
    fn test_write_failure_surfaces_without_retry() {
        let mut transport = MockTransport::connected();
        transport.fail_writes = true;

        let mut client = client(transport);
        let err = client
            .write("modbus_slave_max_current", Value::Float(6.0))
            .unwrap_err();

        assert!(matches!(err, EveError::WriteFailed { .. }));
        assert_eq!(client.transport().writes.len(), 1);
    }

    #[test]
    fn test_pause_charging_above_threshold() {
        let mut transport = MockTransport::connected();
        transport.load_f32(0x1, 0x4ba, 16.0);

        let mut client = client(transport);
        client.pause_charging().unwrap();

        // 5.0f32 big-endian.
        assert_eq!(
            client.transport().writes,
            vec![(0x1, 0x4ba, vec![0x40A0, 0x0000])]
        );
    }

    #[test]
    fn test_pause_charging_already_paused() {
        let mut transport = MockTransport::connected();
        transport.load_f32(0x1, 0x4ba, 5.0);

        let mut client = client(transport);
        client.pause_charging().unwrap();

        assert!(client.transport().writes.is_empty());
    }

    #[test]
    fn test_switch_phase_writes_and_verifies() {
        let mut transport = MockTransport::connected();
        transport.load_words(0x1, 0x4bf, &[1]);

        let mut client = client(transport);
        client.switch_phase(3).unwrap();

        assert_eq!(client.transport().writes, vec![(0x1, 0x4bf, vec![3])]);
    }

    #[test]
    fn test_switch_phase_skips_redundant_write() {
        let mut transport = MockTransport::connected();
        transport.load_words(0x1, 0x4bf, &[3]);

        let mut client = client(transport);
        client.switch_phase(3).unwrap();

        assert!(client.transport().writes.is_empty());
    }

    #[test]
    fn test_switch_phase_rejects_invalid_count() {
        let mut client = client(MockTransport::connected());
        let err = client.switch_phase(2).unwrap_err();

        assert!(matches!(err, EveError::InvalidParameter { .. }));
        assert!(client.transport().reads.is_empty());
    }

    #[test]
    fn test_client_config_builders() {
        let config = ClientConfig::new(Ipv4Addr::new(10, 0, 0, 7))
            .with_port(1502)
            .with_timeout(Duration::from_secs(5))
            .with_retries(5)
            .with_backoff(Duration::from_millis(250));

        assert_eq!(config.addr.port(), 1502);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retries, 5);
        assert_eq!(config.backoff, Duration::from_millis(250));
    }

    #[test]
    fn test_client_debug() {
        let client = client(MockTransport::connected());
        let debug_str = format!("{client:?}");
        assert!(debug_str.contains("Client"));
    }
}
