//! Batch planning: minimal contiguous spans for bulk reads.
//!
//! A batch of descriptors need not be contiguous in address space. Rather
//! than issuing one transaction per field, the planner computes the single
//! smallest span covering every field of the batch and accepts the gap
//! words as wasted bandwidth. One bulk transaction is cheaper than many
//! small ones and yields a single point-in-time snapshot of the batch.

use crate::catalog::RegisterDescriptor;

/// The minimal contiguous register range covering one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First word address of the range.
    pub start: u16,
    /// Number of words in the range.
    pub count: u16,
}

impl Span {
    /// Creates a span from a start address and word count.
    pub fn new(start: u16, count: u16) -> Self {
        Self { start, count }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}+{}", self.start, self.count)
    }
}

/// Plans the minimal span covering every descriptor in the batch.
///
/// Returns `None` for an empty batch, or for a batch whose span would
/// not fit the 16-bit register address space: no transaction is issued
/// in either case. Spans are computed in 32-bit arithmetic so a
/// descriptor ending exactly at 0x10000 cannot overflow.
///
/// # Example
///
/// ```
/// use alfen_eve::{plan, RegisterCatalog, RegisterClass};
///
/// let catalog = RegisterCatalog::car_charger();
/// let batch = catalog.by_class_and_batch(RegisterClass::Holding, 2);
///
/// let span = plan(&batch).unwrap();
/// assert_eq!(span.start, 0x44c);
/// assert_eq!(span.count, 6);
/// ```
pub fn plan(descriptors: &[&RegisterDescriptor]) -> Option<Span> {
    let start = descriptors.iter().map(|d| d.address).min()?;
    let end = descriptors
        .iter()
        .map(|d| u32::from(d.address) + u32::from(d.word_length))
        .max()?;
    let count = u16::try_from(end - u32::from(start)).ok()?;
    Some(Span::new(start, count))
}
