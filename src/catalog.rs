//! Register catalog: the wire contract of every named field.
//!
//! This module defines [`RegisterDescriptor`] (one field's location and
//! encoding in the station's register space) and [`RegisterCatalog`] (the
//! immutable name → descriptor mapping built once at startup).
//!
//! # Register Classes
//!
//! | Class | Access | Modbus function |
//! |---------|------------|-----------------|
//! | Input | read-only | 0x04 |
//! | Holding | read/write | 0x03 / 0x10 |
//!
//! # Batches
//!
//! Every descriptor carries a batch tag. Fields sharing a tag are fetched
//! in one bulk transaction by [`Client::read_all`](crate::Client::read_all);
//! the tag follows the vendor's functional grouping of the register table,
//! not raw address adjacency. Gaps between fields of one batch are legal.
//!
//! # Example
//!
//! ```
//! use alfen_eve::{Encoding, RegisterCatalog};
//!
//! let catalog = RegisterCatalog::car_charger();
//! let desc = catalog.lookup("temperature").unwrap();
//!
//! assert_eq!(desc.address, 0x44e);
//! assert_eq!(desc.word_length, 2);
//! assert_eq!(desc.encoding, Encoding::Float32);
//! ```

use crate::error::{EveError, Result};

/// Register class: which register space a field lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    /// Input registers, read-only.
    Input,
    /// Holding registers, read/write.
    Holding,
}

impl RegisterClass {
    /// Returns the Modbus function code used to read this register class.
    pub(crate) fn read_function(self) -> u8 {
        match self {
            RegisterClass::Input => crate::frame::FC_READ_INPUT,
            RegisterClass::Holding => crate::frame::FC_READ_HOLDING,
        }
    }

    /// Returns whether registers of this class accept writes.
    pub fn is_writable(self) -> bool {
        matches!(self, RegisterClass::Holding)
    }
}

impl std::fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterClass::Input => write!(f, "input"),
            RegisterClass::Holding => write!(f, "holding"),
        }
    }
}

/// Wire representation of a field.
///
/// Multi-word encodings are big-endian at both the byte and the word level:
/// the first word holds the most significant 16 bits. This is fixed for the
/// Alfen register table and not configurable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Encoding {
    /// One word, unsigned.
    UInt16,
    /// Two words, unsigned.
    UInt32,
    /// Four words, unsigned.
    UInt64,
    /// One word, two's-complement signed.
    Int16,
    /// Two words, IEEE 754 single precision.
    Float32,
    /// Four words, IEEE 754 double precision.
    Float64,
    /// Raw bytes, two per word, decoded as UTF-8.
    String,
    /// One signed word scaled by a fixed decimal exponent.
    ///
    /// A raw value of 235 with exponent -1 decodes to 23.5. The exponent is
    /// part of the catalog entry rather than discovered from a companion
    /// register at runtime.
    ScaledInt {
        /// Decimal exponent applied to the raw word.
        exponent: i8,
    },
}

impl Encoding {
    /// Returns the word length this encoding requires, or `None` for
    /// `String`, whose length is declared per descriptor.
    pub fn fixed_word_length(self) -> Option<u16> {
        match self {
            Encoding::UInt16 | Encoding::Int16 | Encoding::ScaledInt { .. } => Some(1),
            Encoding::UInt32 | Encoding::Float32 => Some(2),
            Encoding::UInt64 | Encoding::Float64 => Some(4),
            Encoding::String => None,
        }
    }
}

/// Application-side type a decoded field is cast to.
///
/// Unsigned and signed integers are separate targets so that the full
/// `u64` range survives a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    /// Unsigned integer, up to 64 bits.
    Unsigned,
    /// Signed integer, up to 64 bits.
    Integer,
    /// Double-precision floating point.
    Float,
    /// UTF-8 text.
    Text,
}

/// One field's complete wire contract.
///
/// Descriptors are plain immutable values; the catalog hands out
/// `&'static` references to them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterDescriptor {
    /// Logical field name, unique within a catalog.
    pub name: &'static str,
    /// Sub-device address on the bus (Modbus unit identifier).
    pub slave: u8,
    /// Zero-based word offset into the register space.
    pub address: u16,
    /// Number of 16-bit words occupied.
    pub word_length: u16,
    /// Register class the field lives in.
    pub class: RegisterClass,
    /// Wire representation.
    pub encoding: Encoding,
    /// Decoded application type.
    pub target: TargetType,
    /// Human-readable description. No behavioral effect.
    pub label: &'static str,
    /// Measurement unit. No behavioral effect.
    pub unit: &'static str,
    /// Batch tag grouping fields fetched in one transaction.
    pub batch: u8,
}

/// Shorthand constructor for holding-register table entries.
const fn reg(
    name: &'static str,
    slave: u8,
    address: u16,
    word_length: u16,
    encoding: Encoding,
    target: TargetType,
    label: &'static str,
    unit: &'static str,
    batch: u8,
) -> RegisterDescriptor {
    RegisterDescriptor {
        name,
        slave,
        address,
        word_length,
        class: RegisterClass::Holding,
        encoding,
        target,
        label,
        unit,
        batch,
    }
}

use Encoding::{Float32, Float64, Int16, String as Str, UInt16, UInt32, UInt64};
use TargetType::{Float, Integer, Text, Unsigned};

/// Alfen Eve (Single Pro-line) register table.
///
/// Ported field-for-field from the vendor's Modbus table: slave unit,
/// address, word count, encoding, target type and batch tag. Batches 1-2
/// and 8 live on the station unit (0xC8), batches 3-7 on socket 1 (0x01).
static CAR_CHARGER: &[RegisterDescriptor] = &[
    // Batch 1: station identity and clock.
    reg("c_name", 0xc8, 0x64, 17, Str, Text, "ALF_1000", "", 1),
    reg("c_manufacturer", 0xc8, 0x75, 5, Str, Text, "Alfen NV", "", 1),
    reg("c_modbus_table_version", 0xc8, 0x7a, 1, Int16, Integer, "1", "", 1),
    reg("c_firmware_version", 0xc8, 0x7b, 17, Str, Text, "3.4.0-2990", "", 1),
    reg("c_platform_type", 0xc8, 0x8c, 17, Str, Text, "NG910", "", 1),
    reg("c_station_serial_number", 0xc8, 0x9d, 11, Str, Text, "00000R000", "", 1),
    reg("c_date_year", 0xc8, 0xa8, 1, Int16, Integer, "2019", "1yr", 1),
    reg("c_date_month", 0xc8, 0xa9, 1, Int16, Integer, "03", "1mon", 1),
    reg("c_date_day", 0xc8, 0xaa, 1, Int16, Integer, "11", "1d", 1),
    reg("c_time_hour", 0xc8, 0xab, 1, Int16, Integer, "12", "1hr", 1),
    reg("c_time_minute", 0xc8, 0xac, 1, Int16, Integer, "01", "1min", 1),
    reg("c_time_second", 0xc8, 0xad, 1, Int16, Integer, "04", "1s", 1),
    reg("c_uptime", 0xc8, 0xae, 4, UInt64, Unsigned, "100", "0.001s", 1),
    reg("c_time_zone", 0xc8, 0xb2, 1, Int16, Integer, "Time zone offset to UTC in minutes", "1min", 1),
    // Batch 2: station status.
    reg("station_active_max_current", 0xc8, 0x44c, 2, Float32, Integer, "The Actual Max Current", "A", 2),
    reg("temperature", 0xc8, 0x44e, 2, Float32, Float, "Board Temperature", "degrees Celsius", 2),
    reg("ocpp_state", 0xc8, 0x450, 1, UInt16, Unsigned, "Back Office Connected", "", 2),
    reg("nr_of_sockets", 0xc8, 0x451, 1, UInt16, Unsigned, "Number of Sockets", "", 2),
    // Batch 3: meter state.
    reg("meter_state", 0x1, 0x12c, 1, UInt16, Unsigned, "Bitmask with state", "", 3),
    reg("meter_last_value_timestamp", 0x1, 0x12d, 4, UInt64, Unsigned, "Milliseconds since last received measurement", "0.001s", 3),
    reg("meter_type", 0x1, 0x131, 1, UInt16, Unsigned, "0:RTU, 1:TCP/IP, 2:UDP, 3:P1, 4:other", "", 3),
    // Batch 4: voltages and currents per phase.
    reg("voltage_phase_L1N", 0x1, 0x132, 2, Float32, Float, "Voltage Phase L1N", "V", 4),
    reg("voltage_phase_L2N", 0x1, 0x134, 2, Float32, Float, "Voltage Phase L2N", "V", 4),
    reg("voltage_phase_L3N", 0x1, 0x136, 2, Float32, Float, "Voltage Phase L3N", "V", 4),
    reg("voltage_phase_L1L2", 0x1, 0x138, 2, Float32, Float, "Voltage Phase L1L2", "V", 4),
    reg("voltage_phase_L2L3", 0x1, 0x13a, 2, Float32, Float, "Voltage Phase L2L3", "V", 4),
    reg("voltage_phase_L3L1", 0x1, 0x13c, 2, Float32, Float, "Voltage Phase L3L1", "V", 4),
    reg("current_N", 0x1, 0x13e, 2, Float32, Float, "Current through N", "A", 4),
    reg("current_phase_L1", 0x1, 0x140, 2, Float32, Float, "Current Phase L1", "A", 4),
    reg("current_phase_L2", 0x1, 0x142, 2, Float32, Float, "Current Phase L2", "A", 4),
    reg("current_phase_L3", 0x1, 0x144, 2, Float32, Float, "Current Phase L3", "A", 4),
    reg("current_sum", 0x1, 0x146, 2, Float32, Float, "Current Sum", "A", 4),
    // Batch 5: power and power quality per phase.
    reg("power_factor_phase_L1", 0x1, 0x148, 2, Float32, Float, "Power Factor Phase L1", "", 5),
    reg("power_factor_phase_L2", 0x1, 0x14a, 2, Float32, Float, "Power Factor Phase L2", "", 5),
    reg("power_factor_phase_L3", 0x1, 0x14c, 2, Float32, Float, "Power Factor Phase L3", "", 5),
    reg("power_factor_sum", 0x1, 0x14e, 2, Float32, Float, "Power Factor Sum", "", 5),
    reg("frequency", 0x1, 0x150, 2, Float32, Float, "Frequency", "Hz", 5),
    reg("real_power_phase_L1", 0x1, 0x152, 2, Float32, Float, "Real Power Phase L1", "W", 5),
    reg("real_power_phase_L2", 0x1, 0x154, 2, Float32, Float, "Real Power Phase L2", "W", 5),
    reg("real_power_phase_L3", 0x1, 0x156, 2, Float32, Float, "Real Power Phase L3", "W", 5),
    reg("real_power_sum", 0x1, 0x158, 2, Float32, Float, "Real Power Sum", "W", 5),
    reg("apparent_power_phase_L1", 0x1, 0x15a, 2, Float32, Float, "Apparent Power Phase L1", "VA", 5),
    reg("apparent_power_phase_L2", 0x1, 0x15c, 2, Float32, Float, "Apparent Power Phase L2", "VA", 5),
    reg("apparent_power_phase_L3", 0x1, 0x15e, 2, Float32, Float, "Apparent Power Phase L3", "VA", 5),
    reg("apparent_power_sum", 0x1, 0x160, 2, Float32, Float, "Apparent Power Sum", "VA", 5),
    reg("reactive_power_phase_L1", 0x1, 0x162, 2, Float32, Float, "Reactive Power Phase L1", "VAr", 5),
    reg("reactive_power_phase_L2", 0x1, 0x164, 2, Float32, Float, "Reactive Power Phase L2", "VAr", 5),
    reg("reactive_power_phase_L3", 0x1, 0x166, 2, Float32, Float, "Reactive Power Phase L3", "VAr", 5),
    reg("reactive_power_sum", 0x1, 0x168, 2, Float32, Float, "Reactive Power Sum", "VAr", 5),
    // Batch 6: cumulative energy per phase.
    reg("real_energy_delivered_phase_L1", 0x1, 0x16a, 4, Float64, Float, "Real Energy Delivered Phase L1", "Wh", 6),
    reg("real_energy_delivered_phase_L2", 0x1, 0x16e, 4, Float64, Float, "Real Energy Delivered Phase L2", "Wh", 6),
    reg("real_energy_delivered_phase_L3", 0x1, 0x172, 4, Float64, Float, "Real Energy Delivered Phase L3", "Wh", 6),
    reg("real_energy_delivered_sum", 0x1, 0x176, 4, Float64, Float, "Real Energy Delivered Sum", "Wh", 6),
    reg("real_energy_consumed_phase_L1", 0x1, 0x17a, 4, Float64, Float, "Real Energy Consumed Phase L1", "Wh", 6),
    reg("real_energy_consumed_phase_L2", 0x1, 0x17e, 4, Float64, Float, "Real Energy Consumed Phase L2", "Wh", 6),
    reg("real_energy_consumed_phase_L3", 0x1, 0x182, 4, Float64, Float, "Real Energy Consumed Phase L3", "Wh", 6),
    reg("real_energy_consumed_sum", 0x1, 0x186, 4, Float64, Float, "Real Energy Consumed Sum", "Wh", 6),
    reg("apparent_energy_phase_L1", 0x1, 0x18a, 4, Float64, Float, "Apparent Energy Phase L1", "VAh", 6),
    reg("apparent_energy_phase_L2", 0x1, 0x18e, 4, Float64, Float, "Apparent Energy Phase L2", "VAh", 6),
    reg("apparent_energy_phase_L3", 0x1, 0x192, 4, Float64, Float, "Apparent Energy Phase L3", "VAh", 6),
    reg("apparent_energy_sum", 0x1, 0x196, 4, Float64, Float, "Apparent Energy Sum", "VAh", 6),
    reg("reactive_energy_phase_L1", 0x1, 0x19a, 4, Float64, Float, "Reactive Energy Phase L1", "VArh", 6),
    reg("reactive_energy_phase_L2", 0x1, 0x19e, 4, Float64, Float, "Reactive Energy Phase L2", "VArh", 6),
    reg("reactive_energy_phase_L3", 0x1, 0x1a2, 4, Float64, Float, "Reactive Energy Phase L3", "VArh", 6),
    reg("reactive_energy_sum", 0x1, 0x1a6, 4, Float64, Float, "Reactive Energy Sum", "VArh", 6),
    // Batch 7: socket status and charging control.
    reg("availability", 0x1, 0x4b0, 1, UInt16, Unsigned, "1: Operative; 0: Inoperative", "", 7),
    reg("mode_3_state", 0x1, 0x4b1, 5, Str, Text, "61851 states", "", 7),
    reg("actual_applied_max_current", 0x1, 0x4b6, 2, Float32, Float, "Actual Applied Max Current for Socket", "A", 7),
    reg("modbus_slave_max_current_valid_time", 0x1, 0x4b8, 2, UInt32, Unsigned, "Remaining time before fallback to safe current", "1s", 7),
    reg("modbus_slave_max_current", 0x1, 0x4ba, 2, Float32, Float, "Modbus Slave Max Current", "A", 7),
    reg("active_load_balancing_safe_current", 0x1, 0x4bc, 2, Float32, Float, "Active Load Balancing Safe Current", "A", 7),
    reg("modbus_slave_received_setpoint_accounted_for", 0x1, 0x4be, 1, UInt16, Unsigned, "Modbus Slave Received Setpoint Accounted For", "", 7),
    reg("charge_using_1_or_3_phases", 0x1, 0x4bf, 1, UInt16, Unsigned, "Phases used for charging", "phases", 7),
    // Batch 8: Smart Charging Network (group coordination).
    reg("scn_name", 0xc8, 0x578, 4, Str, Text, "", "", 8),
    reg("scn_sockets", 0xc8, 0x57c, 1, UInt16, Unsigned, "", "1A", 8),
    reg("scn_total_consumption_phase_l1", 0xc8, 0x57d, 2, Float32, Float, "", "1A", 8),
    reg("scn_total_consumption_phase_l2", 0xc8, 0x57f, 2, Float32, Float, "", "1A", 8),
    reg("scn_total_consumption_phase_l3", 0xc8, 0x581, 2, Float32, Float, "", "1A", 8),
    reg("scn_actual_max_current_phase_l1", 0xc8, 0x583, 2, Float32, Float, "", "1A", 8),
    reg("scn_actual_max_current_phase_l2", 0xc8, 0x585, 2, Float32, Float, "", "1A", 8),
    reg("scn_actual_max_current_phase_l3", 0xc8, 0x587, 2, Float32, Float, "", "1A", 8),
    reg("scn_max_current_phase_l1", 0xc8, 0x589, 2, Float32, Float, "", "1A", 8),
    reg("scn_max_current_phase_l2", 0xc8, 0x58b, 2, Float32, Float, "", "1A", 8),
    reg("scn_max_current_phase_l3", 0xc8, 0x58d, 2, Float32, Float, "", "1A", 8),
    reg("remaining_valid_time_max_current_phase_l1", 0xc8, 0x58f, 2, UInt32, Unsigned, "Max current valid time", "1s", 8),
    reg("remaining_valid_time_max_current_phase_l2", 0xc8, 0x591, 2, UInt32, Unsigned, "Max current valid time", "1s", 8),
    reg("remaining_valid_time_max_current_phase_l3", 0xc8, 0x593, 2, UInt32, Unsigned, "Max current valid time", "1s", 8),
    reg("scn_safe_current", 0xc8, 0x595, 2, Float32, Float, "Configured SCN safe current", "1A", 8),
    reg("scn_modbus_slave_max_current_enable", 0xc8, 0x597, 1, UInt16, Unsigned, "1: Enabled; 0: Disabled", "1A", 8),
];

/// Immutable, ordered mapping of logical name to [`RegisterDescriptor`].
///
/// A catalog is built once and never mutated; it is safe to share
/// read-only across any number of concurrent callers.
///
/// # Example
///
/// ```
/// use alfen_eve::RegisterCatalog;
///
/// let catalog = RegisterCatalog::car_charger();
/// assert!(catalog.lookup("frequency").is_ok());
/// assert!(catalog.lookup("flux_capacitor").is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RegisterCatalog {
    entries: &'static [RegisterDescriptor],
}

impl RegisterCatalog {
    /// Creates a catalog over a static descriptor table.
    pub const fn new(entries: &'static [RegisterDescriptor]) -> Self {
        Self { entries }
    }

    /// Returns the Alfen Eve car charger catalog.
    pub const fn car_charger() -> Self {
        Self::new(CAR_CHARGER)
    }

    /// Looks up a descriptor by logical name.
    ///
    /// # Errors
    ///
    /// Returns `EveError::UnknownRegister` if the name is not present.
    pub fn lookup(&self, name: &str) -> Result<&'static RegisterDescriptor> {
        self.entries
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| EveError::unknown_register(name))
    }

    /// Returns all descriptors matching a class and batch tag, ordered by
    /// ascending address.
    ///
    /// The ordering is what makes sequential cursor decoding correct, so
    /// the result is sorted even though the table is declared in address
    /// order.
    pub fn by_class_and_batch(
        &self,
        class: RegisterClass,
        batch: u8,
    ) -> Vec<&'static RegisterDescriptor> {
        let mut matches: Vec<_> = self
            .entries
            .iter()
            .filter(|d| d.class == class && d.batch == batch)
            .collect();
        matches.sort_by_key(|d| d.address);
        matches
    }

    /// Returns the distinct batch tags for a class, in catalog-declared
    /// order.
    pub fn batch_tags(&self, class: RegisterClass) -> Vec<u8> {
        let mut tags = Vec::new();
        for d in self.entries.iter().filter(|d| d.class == class) {
            if !tags.contains(&d.batch) {
                tags.push(d.batch);
            }
        }
        tags
    }

    /// Iterates over all descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'static RegisterDescriptor> {
        self.entries.iter()
    }

    /// Returns the number of catalog entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
