//! # roomflake
//!
//! Time-ordered, globally unique 64-bit ids for nodes that cannot talk to a
//! central allocator. Inspired by Snowflake: every id packs the milliseconds
//! since a fixed epoch, the issuing node's room and worker codes, and a
//! per-millisecond sequence.
//!
//! ## Features
//! - **Strictly Increasing**: Ids from one generator are unique and ordered.
//! - **Thread-Safe**: One lock per generator; share it behind an `Arc`.
//! - **Clock Aware**: Backwards clock jumps are reported, never papered over.
//! - **Decodable**: Any id splits back into the fields that produced it.
//! - **Flexible Encodings**: Render ids in base36, base58, base91, or hexadecimal.
//!
//! ## Feature Flags
//! - `serde`: Derives `Serialize`/`Deserialize` for [`Flake`], [`FlakeParts`] and [`TieBreak`].
//!
//! ## Quick Start
//!
//! ```rust
//! use roomflake::{Flake, IdGenerator};
//!
//! // room 1, worker 3, initial sequence 0
//! let generator = IdGenerator::new(1, 3, 0).unwrap();
//! let id = Flake::from(generator.next().unwrap());
//!
//! assert_eq!(id.parts().primary, 1);
//! assert_eq!(id.parts().secondary, 3);
//! println!("{id} / {}", id.base58());
//! ```
//!
//! ## ID Structure
//!
//! `0 | 41-bit elapsed ms | 5-bit room | 5-bit worker | 12-bit sequence`
//!
//! - **Elapsed**: Milliseconds since [`EPOCH_MS`] (2021-02-21), about 69 years of range.
//! - **Room / Worker**: Up to 32 × 32 nodes.
//! - **Sequence**: Up to 4096 ids per millisecond per node. A caller that
//!   runs a slot dry waits for the next millisecond.
//!
//! The top bit is always clear, so ids stay positive as `i64`.
//!
//! ## Deterministic Time
//!
//! ```rust
//! use roomflake::{decode, IdGenerator, ManualClock, EPOCH_MS};
//!
//! let generator = IdGenerator::with_clock(0, 0, 0, ManualClock::new(EPOCH_MS + 10)).unwrap();
//! let a = decode(generator.next().unwrap());
//! let b = decode(generator.next().unwrap());
//! assert_eq!((a.elapsed_ms, a.sequence), (10, 0));
//! assert_eq!((b.elapsed_ms, b.sequence), (10, 1));
//! ```

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

pub mod clock;
pub mod error;
pub mod generator;
pub mod layout;
mod render;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{FlakeError, Result};
pub use generator::{IdGenerator, Identity, TieBreak};
pub use layout::{EPOCH_MS, FlakeParts, Layout, decode, encode};

/// An issued id, with helpers to inspect and render it.
///
/// Ordering and hashing follow the numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Flake(u64);

impl Flake {
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Split into fields under [`Layout::DEFAULT`].
    pub const fn parts(self) -> FlakeParts {
        layout::decode(self.0)
    }

    /// Issue time in milliseconds since UNIX_EPOCH.
    pub const fn timestamp_ms(self) -> u64 {
        self.parts().elapsed_ms + EPOCH_MS
    }

    /// Encode as a 13-character base36 string.
    ///
    /// # Example
    /// ```
    /// use roomflake::Flake;
    /// assert_eq!(Flake::from(705_700_640_722_944).base36(), "0006y5eecu39c");
    /// ```
    pub fn base36(self) -> String {
        render::base36(self.0)
    }

    /// Encode as an 11-character base58 string.
    pub fn base58(self) -> String {
        render::base58(self.0)
    }

    /// Encode as a 10-character base91 string.
    pub fn base91(self) -> String {
        render::base91(self.0)
    }

    /// Encode as a 16-character hexadecimal string.
    pub fn hex(self) -> String {
        render::hex(self.0)
    }

    /// Parse the output of [`Flake::hex`].
    pub fn from_hex(s: &str) -> std::result::Result<Self, ParseIntError> {
        u64::from_str_radix(s, 16).map(Self)
    }
}

impl From<u64> for Flake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<Flake> for u64 {
    fn from(flake: Flake) -> Self {
        flake.0
    }
}

impl fmt::Display for Flake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Flake {
    type Err = ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}
