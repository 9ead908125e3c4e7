//! Hex helpers for logging and troubleshooting raw frames.

use crate::error::HexError;

/// Format bytes as lowercase, space separated hex (`3b 03 20 12 fe cd`).
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a hex string back into bytes.
///
/// Whitespace anywhere in the input is ignored and digits may be either case,
/// so the output of [`to_hex`] and a compact `3B032012FECD` both parse.
pub fn from_hex(text: &str) -> Result<Vec<u8>, HexError> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(digits)?)
}
