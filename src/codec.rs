//! Type-directed encoding and decoding of register words.
//!
//! The codec translates between the 16-bit word stream retrieved from a
//! station and strongly-typed [`Value`]s, driven entirely by the
//! [`RegisterDescriptor`] of each field. Multi-word values are big-endian
//! at both the byte and the word level; this is fixed for the Alfen
//! register table.
//!
//! Decoding a batch walks the retrieved buffer with a [`Cursor`]: fields
//! are decoded in ascending address order and the cursor skips over any
//! unoccupied words between them.
//!
//! # Example
//!
//! ```
//! use alfen_eve::{Cursor, RegisterCatalog, Value};
//!
//! let catalog = RegisterCatalog::car_charger();
//! let desc = catalog.lookup("temperature").unwrap();
//!
//! // 23.5f32 as two big-endian words, as returned by the station.
//! let words = [0x41BC, 0x0000];
//! let mut cursor = Cursor::new(&words, desc.address);
//!
//! assert_eq!(cursor.decode_next(desc).unwrap(), Value::Float(23.5));
//! ```

use crate::catalog::{Encoding, RegisterDescriptor, TargetType};
use crate::error::{EveError, Result};

/// A decoded register value.
///
/// The variant mirrors the descriptor's [`TargetType`]: callers can rely
/// on a field always decoding to the same variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unsigned integer.
    Unsigned(u64),
    /// Signed integer.
    Integer(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
        }
    }
}

impl Value {
    /// Returns the value as `f64` if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Unsigned(v) => Some(v as f64),
            Value::Integer(v) => Some(v as f64),
            Value::Float(v) => Some(v),
            Value::Text(_) => None,
        }
    }

    /// Returns the value as `u64` if it is a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Unsigned(v) => Some(v),
            Value::Integer(v) if v >= 0 => Some(v as u64),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Unsigned(v) if v <= i64::MAX as u64 => Some(v as i64),
            Value::Integer(v) => Some(v),
            _ => None,
        }
    }
}

/// Decode-time position tracker within one retrieved word buffer.
///
/// A cursor is created fresh for every transaction and advances
/// monotonically as fields are decoded; it is never shared across
/// transactions. Positions are absolute register addresses, so a cursor
/// over a span starting at 0x132 begins at position 0x132.
#[derive(Debug)]
pub struct Cursor<'a> {
    words: &'a [u16],
    start: u16,
    position: u32,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor over `words`, where `words[0]` holds the register
    /// at address `start`.
    pub fn new(words: &'a [u16], start: u16) -> Self {
        Self {
            words,
            start,
            position: u32::from(start),
        }
    }

    /// Returns the current absolute word address.
    ///
    /// Positions are 32-bit so that a field ending exactly at the top of
    /// the 16-bit address space leaves the cursor at 0x10000 instead of
    /// wrapping.
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Decodes the next field from the buffer.
    ///
    /// If the descriptor starts past the current position, the gap is
    /// skipped without producing a value. Exactly `word_length` words are
    /// then consumed, interpreted per the descriptor's encoding and cast
    /// to its target type.
    ///
    /// # Errors
    ///
    /// Returns `EveError::DecodeError` if the descriptor lies behind the
    /// cursor (fields decoded out of address order), the buffer is too
    /// short, or the decoded value cannot be cast to the target type.
    pub fn decode_next(&mut self, desc: &RegisterDescriptor) -> Result<Value> {
        let address = u32::from(desc.address);
        if address > self.position {
            // Gap between the previous field and this one: skip it.
            self.position = address;
        } else if address < self.position {
            return Err(EveError::decode(format!(
                "field '{}' at 0x{:x} lies behind cursor position 0x{:x}",
                desc.name, desc.address, self.position
            )));
        }

        let offset = (self.position - u32::from(self.start)) as usize;
        let end = offset + desc.word_length as usize;
        if end > self.words.len() {
            return Err(EveError::decode(format!(
                "buffer too short for field '{}': need {} words at offset {}, have {}",
                desc.name,
                desc.word_length,
                offset,
                self.words.len()
            )));
        }

        let raw = decode_words(desc.encoding, &self.words[offset..end])?;
        self.position += u32::from(desc.word_length);
        cast(raw, desc.target, desc.name)
    }
}

/// Interprets a word slice per the wire encoding.
fn decode_words(encoding: Encoding, words: &[u16]) -> Result<Value> {
    if let Some(expected) = encoding.fixed_word_length() {
        if words.len() != expected as usize {
            return Err(EveError::decode(format!(
                "{:?} takes {} words, got {}",
                encoding,
                expected,
                words.len()
            )));
        }
    }

    let value = match encoding {
        Encoding::UInt16 => Value::Unsigned(u64::from(words[0])),
        Encoding::UInt32 => Value::Unsigned(u64::from(words[0]) << 16 | u64::from(words[1])),
        Encoding::UInt64 => Value::Unsigned(fold_u64(words)),
        Encoding::Int16 => Value::Integer(i64::from(words[0] as i16)),
        Encoding::Float32 => {
            let bits = u32::from(words[0]) << 16 | u32::from(words[1]);
            Value::Float(f64::from(f32::from_bits(bits)))
        }
        Encoding::Float64 => Value::Float(f64::from_bits(fold_u64(words))),
        Encoding::String => Value::Text(decode_string(words)),
        Encoding::ScaledInt { exponent } => {
            Value::Float(f64::from(words[0] as i16) * 10f64.powi(i32::from(exponent)))
        }
    };
    Ok(value)
}

fn fold_u64(words: &[u16]) -> u64 {
    words.iter().fold(0u64, |acc, &w| acc << 16 | u64::from(w))
}

/// Decodes string registers: big-endian bytes, invalid UTF-8 sequences
/// dropped, NUL bytes removed, trailing whitespace trimmed.
fn decode_string(words: &[u16]) -> String {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in words {
        bytes.push((word >> 8) as u8);
        bytes.push((word & 0xFF) as u8);
    }

    let text: String = String::from_utf8_lossy(&bytes)
        .chars()
        .filter(|&c| c != '\u{FFFD}' && c != '\0')
        .collect();
    text.trim_end().to_string()
}

/// Casts a raw decoded value to the descriptor's target type.
///
/// Float-to-integer casts truncate toward zero, matching the target's
/// semantics rather than rounding.
fn cast(raw: Value, target: TargetType, name: &str) -> Result<Value> {
    let value = match (raw, target) {
        (Value::Unsigned(v), TargetType::Unsigned) => Value::Unsigned(v),
        (Value::Unsigned(v), TargetType::Integer) => Value::Integer(v as i64),
        (Value::Unsigned(v), TargetType::Float) => Value::Float(v as f64),
        (Value::Integer(v), TargetType::Unsigned) => Value::Unsigned(v as u64),
        (Value::Integer(v), TargetType::Integer) => Value::Integer(v),
        (Value::Integer(v), TargetType::Float) => Value::Float(v as f64),
        (Value::Float(v), TargetType::Unsigned) => Value::Unsigned(v as u64),
        (Value::Float(v), TargetType::Integer) => Value::Integer(v as i64),
        (Value::Float(v), TargetType::Float) => Value::Float(v),
        (Value::Text(v), TargetType::Text) => Value::Text(v),
        (raw, target) => {
            return Err(EveError::decode(format!(
                "field '{name}': cannot cast {raw:?} to {target:?}"
            )))
        }
    };
    Ok(value)
}

/// Encodes an application value into wire words for a write.
///
/// The value must match the descriptor's target type; mismatches are a
/// programming error and surface as `EveError::EncodeError` rather than
/// being coerced. String values are padded with NUL to the descriptor's
/// full word length, since a write always covers the whole span.
///
/// # Errors
///
/// Returns `EveError::EncodeError` if the value's variant does not match
/// the target type, an integer is out of range for the encoding, or a
/// string does not fit the declared word length.
///
/// # Example
///
/// ```
/// use alfen_eve::{encode, RegisterCatalog, Value};
///
/// let catalog = RegisterCatalog::car_charger();
/// let desc = catalog.lookup("modbus_slave_max_current").unwrap();
///
/// let words = encode(desc, &Value::Float(6.0)).unwrap();
/// assert_eq!(words, vec![0x40C0, 0x0000]);
/// ```
pub fn encode(desc: &RegisterDescriptor, value: &Value) -> Result<Vec<u16>> {
    if !matches(value, desc.target) {
        return Err(EveError::encode(format!(
            "field '{}': value {:?} does not match target {:?}",
            desc.name, value, desc.target
        )));
    }

    let words = match desc.encoding {
        Encoding::UInt16 => {
            let v = int_in_range(desc, value, 0, u64::from(u16::MAX))?;
            vec![v as u16]
        }
        Encoding::UInt32 => {
            let v = int_in_range(desc, value, 0, u64::from(u32::MAX))?;
            vec![(v >> 16) as u16, v as u16]
        }
        Encoding::UInt64 => {
            let v = int_in_range(desc, value, 0, u64::MAX)?;
            split_u64(v)
        }
        Encoding::Int16 => {
            let v = value.as_i64().ok_or_else(|| range_error(desc, value))?;
            if v < i64::from(i16::MIN) || v > i64::from(i16::MAX) {
                return Err(range_error(desc, value));
            }
            vec![v as i16 as u16]
        }
        Encoding::Float32 => {
            let bits = (float_of(desc, value)? as f32).to_bits();
            vec![(bits >> 16) as u16, bits as u16]
        }
        Encoding::Float64 => split_u64(float_of(desc, value)?.to_bits()),
        Encoding::String => {
            let Value::Text(text) = value else {
                return Err(range_error(desc, value));
            };
            encode_string(desc, text)?
        }
        Encoding::ScaledInt { exponent } => {
            let scaled = (float_of(desc, value)? * 10f64.powi(-i32::from(exponent))).round();
            if scaled < f64::from(i16::MIN) || scaled > f64::from(i16::MAX) {
                return Err(range_error(desc, value));
            }
            vec![scaled as i16 as u16]
        }
    };
    Ok(words)
}

fn matches(value: &Value, target: TargetType) -> bool {
    matches!(
        (value, target),
        (Value::Unsigned(_), TargetType::Unsigned)
            | (Value::Integer(_), TargetType::Integer)
            | (Value::Float(_), TargetType::Float)
            | (Value::Text(_), TargetType::Text)
    )
}

fn range_error(desc: &RegisterDescriptor, value: &Value) -> EveError {
    EveError::encode(format!(
        "field '{}': value {:?} not representable as {:?}",
        desc.name, value, desc.encoding
    ))
}

fn int_in_range(desc: &RegisterDescriptor, value: &Value, min: u64, max: u64) -> Result<u64> {
    let v = value.as_u64().ok_or_else(|| range_error(desc, value))?;
    if v < min || v > max {
        return Err(range_error(desc, value));
    }
    Ok(v)
}

fn float_of(desc: &RegisterDescriptor, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| range_error(desc, value))
}

fn split_u64(v: u64) -> Vec<u16> {
    vec![(v >> 48) as u16, (v >> 32) as u16, (v >> 16) as u16, v as u16]
}

fn encode_string(desc: &RegisterDescriptor, text: &str) -> Result<Vec<u16>> {
    let bytes = text.as_bytes();
    let capacity = desc.word_length as usize * 2;
    if bytes.len() > capacity {
        return Err(EveError::encode(format!(
            "field '{}': string of {} bytes exceeds {} register bytes",
            desc.name,
            bytes.len(),
            capacity
        )));
    }

    let mut padded = bytes.to_vec();
    padded.resize(capacity, 0);
    Ok(padded
        .chunks_exact(2)
        .map(|pair| u16::from(pair[0]) << 8 | u16::from(pair[1]))
        .collect())
}
