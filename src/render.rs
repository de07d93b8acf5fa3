//! Textual renderings of a 64-bit flake.
//!
//! Supported encodings:
//! - `base36`: `[0-9a-z]`
//! - `base58`: Bitcoin alphabet (e.g., for short URLs)
//! - `base91`: ASCII-safe and URL-safe
//! - `hex`: `[0-9a-f]`
//!
//! Outputs are left-padded to the width of the largest 63-bit value, so the
//! base36, base58 and hex forms sort the same way as the numbers.

/// Bitcoin-style base58 alphabet (no `0`, `O`, `I`, `l`).
const BASE58: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
/// Base91 alphabet (ASCII-safe, URL-safe).
const BASE91: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!#$%&()*+,./:;<=>?@[]^_`{|}~\"";
/// Base36 alphabet (0-9, a-z).
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub(crate) const BASE36_WIDTH: usize = 13;
pub(crate) const BASE58_WIDTH: usize = 11;
pub(crate) const BASE91_WIDTH: usize = 10;
pub(crate) const HEX_WIDTH: usize = 16;

/// Render `n` in the base given by `alphabet`, padded with its first symbol.
fn to_base(mut n: u64, alphabet: &[u8], min_width: usize) -> String {
    let base = alphabet.len() as u64;
    let mut digits = Vec::with_capacity(min_width);
    while n > 0 {
        digits.push(alphabet[(n % base) as usize]);
        n /= base;
    }
    while digits.len() < min_width {
        digits.push(alphabet[0]);
    }
    digits.iter().rev().map(|&b| char::from(b)).collect()
}

pub(crate) fn base58(n: u64) -> String {
    to_base(n, BASE58, BASE58_WIDTH)
}

pub(crate) fn base91(n: u64) -> String {
    to_base(n, BASE91, BASE91_WIDTH)
}

pub(crate) fn base36(n: u64) -> String {
    to_base(n, BASE36, BASE36_WIDTH)
}

pub(crate) fn hex(n: u64) -> String {
    format!("{n:0width$x}", width = HEX_WIDTH)
}
