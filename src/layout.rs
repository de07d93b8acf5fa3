//! Bit layout of a 64-bit flake and the shift-and-mask arithmetic around it.
//!
//! ```text
//!  63  62                                      22 21    17 16    12 11          0
//! +---+------------------------------------------+--------+--------+-------------+
//! | 0 |   elapsed ms since EPOCH_MS (41 bits)    |  room  | worker |  sequence   |
//! +---+------------------------------------------+--------+--------+-------------+
//! ```
//!
//! Every node issuing ids into the same namespace must agree on this table.
//! The widths are build-time constants; change them here, never at runtime.

use crate::error::{FlakeError, Result};

/// Custom epoch: 2021-02-21 09:15:48.942 UTC (milliseconds since UNIX_EPOCH).
///
/// Ids already issued are measured from this instant. Moving it breaks
/// ordering across deployments.
pub const EPOCH_MS: u64 = 1_613_898_948_942;

/// Width of the primary location code (room / datacenter).
pub const PRIMARY_BITS: u32 = 5;
/// Width of the secondary location code (worker / node).
pub const SECONDARY_BITS: u32 = 5;
/// Width of the per-millisecond sequence.
pub const SEQUENCE_BITS: u32 = 12;
/// Residual width left for the elapsed milliseconds, keeping the sign bit clear.
pub const TIMESTAMP_BITS: u32 = 63 - PRIMARY_BITS - SECONDARY_BITS - SEQUENCE_BITS;

/// The four fields packed into a flake, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlakeParts {
    /// Milliseconds since the layout's epoch.
    pub elapsed_ms: u64,
    /// Primary location code.
    pub primary: u64,
    /// Secondary location code.
    pub secondary: u64,
    /// Sequence within the millisecond slot.
    pub sequence: u64,
}

/// A concrete bit layout: field widths plus the epoch they are measured from.
///
/// [`Layout::DEFAULT`] is the layout used by [`crate::IdGenerator`]. Other
/// layouts exist so ids issued under a different agreed table can still be
/// decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    epoch_ms: u64,
    primary_bits: u32,
    secondary_bits: u32,
    sequence_bits: u32,
}

impl Layout {
    /// The build-time layout described in the module docs.
    pub const DEFAULT: Layout =
        Layout::new(EPOCH_MS, PRIMARY_BITS, SECONDARY_BITS, SEQUENCE_BITS);

    /// Build a layout from its field widths.
    ///
    /// # Panics
    /// If the three widths leave no room for the timestamp below the sign
    /// bit. In a `const` context this is a compile error.
    pub const fn new(
        epoch_ms: u64,
        primary_bits: u32,
        secondary_bits: u32,
        sequence_bits: u32,
    ) -> Self {
        assert!(
            primary_bits + secondary_bits + sequence_bits < 63,
            "field widths must leave at least one timestamp bit below the sign bit"
        );
        Self {
            epoch_ms,
            primary_bits,
            secondary_bits,
            sequence_bits,
        }
    }

    pub const fn epoch_ms(&self) -> u64 {
        self.epoch_ms
    }

    pub const fn timestamp_bits(&self) -> u32 {
        63 - self.primary_bits - self.secondary_bits - self.sequence_bits
    }

    pub const fn max_primary(&self) -> u64 {
        mask(self.primary_bits)
    }

    pub const fn max_secondary(&self) -> u64 {
        mask(self.secondary_bits)
    }

    /// Mask of the sequence field; also its largest value.
    pub const fn sequence_mask(&self) -> u64 {
        mask(self.sequence_bits)
    }

    pub const fn max_elapsed_ms(&self) -> u64 {
        mask(self.timestamp_bits())
    }

    pub const fn secondary_shift(&self) -> u32 {
        self.sequence_bits
    }

    pub const fn primary_shift(&self) -> u32 {
        self.sequence_bits + self.secondary_bits
    }

    pub const fn timestamp_shift(&self) -> u32 {
        self.sequence_bits + self.secondary_bits + self.primary_bits
    }

    /// Reject a location code pair or initial sequence that does not fit.
    pub fn check_identity(&self, primary: u64, secondary: u64, sequence: u64) -> Result<()> {
        check_field("primary", primary, self.max_primary())?;
        check_field("secondary", secondary, self.max_secondary())?;
        check_field("sequence", sequence, self.sequence_mask())
    }

    /// Milliseconds between the epoch and `now_ms`, if they fit the timestamp field.
    pub fn elapsed_since_epoch(&self, now_ms: u64) -> Result<u64> {
        now_ms
            .checked_sub(self.epoch_ms)
            .filter(|elapsed| *elapsed <= self.max_elapsed_ms())
            .ok_or(FlakeError::TimestampOverflow {
                now_ms,
                epoch_ms: self.epoch_ms,
            })
    }

    /// Pack four fields into an id.
    ///
    /// Every field is range-checked first, so a successful encode always
    /// decodes back to `parts`.
    pub fn encode(&self, parts: FlakeParts) -> Result<u64> {
        if parts.elapsed_ms > self.max_elapsed_ms() {
            return Err(FlakeError::TimestampOverflow {
                now_ms: self.epoch_ms.saturating_add(parts.elapsed_ms),
                epoch_ms: self.epoch_ms,
            });
        }
        self.check_identity(parts.primary, parts.secondary, parts.sequence)?;
        Ok(self.pack(parts))
    }

    /// Split an id into its four fields.
    ///
    /// Any `u64` decodes; bit 63 is ignored since no encoder ever sets it.
    pub const fn decode(&self, id: u64) -> FlakeParts {
        FlakeParts {
            elapsed_ms: (id >> self.timestamp_shift()) & self.max_elapsed_ms(),
            primary: (id >> self.primary_shift()) & self.max_primary(),
            secondary: (id >> self.secondary_shift()) & self.max_secondary(),
            sequence: id & self.sequence_mask(),
        }
    }

    /// Pack fields already known to be in range.
    pub(crate) const fn pack(&self, parts: FlakeParts) -> u64 {
        (parts.elapsed_ms << self.timestamp_shift())
            | (parts.primary << self.primary_shift())
            | (parts.secondary << self.secondary_shift())
            | parts.sequence
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decode an id issued under [`Layout::DEFAULT`].
pub const fn decode(id: u64) -> FlakeParts {
    Layout::DEFAULT.decode(id)
}

/// Encode parts under [`Layout::DEFAULT`].
pub fn encode(parts: FlakeParts) -> Result<u64> {
    Layout::DEFAULT.encode(parts)
}

const fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

fn check_field(field: &'static str, value: u64, max: u64) -> Result<()> {
    if value > max {
        return Err(FlakeError::InvalidConfiguration { field, value, max });
    }
    Ok(())
}
