// Licensed under the Apache-2.0 license

//! Numeric literal codec for hardware-description notations.
//!
//! Fuse catalogs and patch files mix several textual encodings for the same
//! integer: plain decimal, `0x`/`x` hex, `h`/`b`/`d` prefix or suffix radix
//! markers, verilog-style sized literals (`4'hF`), brace-wrapped
//! concatenations, and a handful of placeholder tokens that decode to zero.
//! Every address, width, and value in the subsystem flows through
//! [`parse_literal`], so its behavior gates everything downstream.

use log::warn;

use crate::error::{FusegenError, FusegenResult};

/// Parse a heterogeneous numeric literal into an unsigned integer.
///
/// Recognized forms, in processing order:
/// - `0/0/0`, `None`, and the empty string decode to 0
/// - underscores (digit grouping) are stripped
/// - one enclosing `{ }` pair is stripped, contents used verbatim
/// - a verilog size prefix (`5'b10111`) is dropped; only the component after
///   the quote is parsed
/// - radix markers: `0x`/`x` prefix and `h` prefix/suffix select hex,
///   `b` selects binary, `d` selects decimal; bare digit strings are decimal
/// - placeholder tokens: `S`/`s`, `-`, and `F` outside a hex context
///   decode to 0; `'1` decodes to 1
///
/// Anything else is an error carrying the offending literal.
///
/// # Examples
/// ```
/// use fusegen::value::parse_literal;
/// assert_eq!(parse_literal("0x1F").unwrap(), 31);
/// assert_eq!(parse_literal("101b").unwrap(), 5);
/// assert_eq!(parse_literal("4'hF").unwrap(), 15);
/// assert_eq!(parse_literal("0/0/0").unwrap(), 0);
/// ```
pub fn parse_literal(text: &str) -> FusegenResult<u64> {
    if text == "0/0/0" {
        return Ok(0);
    }
    if text.is_empty() || text == "None" {
        return Ok(0);
    }

    let original = text;
    let mut text = text.replace('_', "");

    if text.len() >= 2 && text.starts_with('{') && text.ends_with('}') {
        text = text[1..text.len() - 1].to_string();
    }

    // sized literals: in input like 5'b10111 take just b10111
    if let Some((_, tail)) = text.split_once('\'') {
        text = tail.to_string();
    }

    let mut radix = 0;
    if let Some(stripped) = text.strip_prefix("0x") {
        text = stripped.to_string();
        radix = 16;
    } else if text.starts_with('x') {
        text = text.trim_matches('x').to_string();
        radix = 16;
    } else if text.ends_with('h') || text.starts_with('h') {
        text = text.trim_matches('h').to_string();
        radix = 16;
    } else if text.ends_with('b') || text.starts_with('b') {
        text = text.trim_matches('b').to_string();
        radix = 2;
    } else if text.ends_with('d') || text.starts_with('d') {
        text = text.trim_matches('d').to_string();
        radix = 10;
    } else if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        radix = 10;
    }

    match text.as_str() {
        "S" | "s" => return Ok(0),
        "F" if radix != 16 => return Ok(0),
        "-" => return Ok(0),
        _ => {}
    }

    let parsed = if radix == 0 {
        parse_auto_radix(&text)
    } else {
        u64::from_str_radix(&text, radix)
    };
    parsed.map_err(|source| FusegenError::Value {
        literal: original.to_string(),
        source,
    })
}

/// Parse a literal and warn when the value does not fit `expected_bits`.
///
/// The warning is a data-quality diagnostic only; the parsed value is
/// returned unchanged. An `expected_bits` of 0 disables the check.
pub fn parse_literal_checked(text: &str, expected_bits: u32, context: &str) -> FusegenResult<u64> {
    let value = parse_literal(text)?;
    if expected_bits > 0 && bit_length(value) > expected_bits {
        warn!(
            "defined field value too long: bit length {expected_bits} cannot fit value {value:#x} ({context})"
        );
    }
    Ok(value)
}

/// Minimum number of bits needed to represent `value`; zero needs one bit.
pub fn bit_length(value: u64) -> u32 {
    if value == 0 {
        1
    } else {
        64 - value.leading_zeros()
    }
}

fn parse_auto_radix(text: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2)
    } else if let Some(oct) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        u64::from_str_radix(oct, 8)
    } else {
        text.parse::<u64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_forms() {
        assert_eq!(parse_literal("0x1F").unwrap(), 31);
        assert_eq!(parse_literal("x7c").unwrap(), 0x7c);
        assert_eq!(parse_literal("1Fh").unwrap(), 31);
        assert_eq!(parse_literal("h1F").unwrap(), 31);
    }

    #[test]
    fn test_binary_and_decimal_forms() {
        assert_eq!(parse_literal("0b101").unwrap(), 5);
        assert_eq!(parse_literal("101b").unwrap(), 5);
        assert_eq!(parse_literal("b101").unwrap(), 5);
        assert_eq!(parse_literal("d19").unwrap(), 19);
        assert_eq!(parse_literal("99d").unwrap(), 99);
        assert_eq!(parse_literal("42").unwrap(), 42);
    }

    #[test]
    fn test_sized_literals() {
        assert_eq!(parse_literal("4'hF").unwrap(), 15);
        assert_eq!(parse_literal("5'b10111").unwrap(), 23);
        assert_eq!(parse_literal("8'd200").unwrap(), 200);
        assert_eq!(parse_literal("{32'h0}").unwrap(), 0);
        assert_eq!(parse_literal("{8'hFF}").unwrap(), 255);
    }

    #[test]
    fn test_underscore_grouping() {
        assert_eq!(parse_literal("0x1234_5678").unwrap(), 0x1234_5678);
        assert_eq!(parse_literal("1_000").unwrap(), 1000);
    }

    #[test]
    fn test_placeholder_tokens() {
        assert_eq!(parse_literal("0/0/0").unwrap(), 0);
        assert_eq!(parse_literal("").unwrap(), 0);
        assert_eq!(parse_literal("None").unwrap(), 0);
        assert_eq!(parse_literal("S").unwrap(), 0);
        assert_eq!(parse_literal("s").unwrap(), 0);
        assert_eq!(parse_literal("-").unwrap(), 0);
        assert_eq!(parse_literal("'1").unwrap(), 1);
        // F is a valid digit only in a hex context
        assert_eq!(parse_literal("F").unwrap(), 0);
        assert_eq!(parse_literal("Fh").unwrap(), 15);
    }

    #[test]
    fn test_unparseable_literal() {
        let err = parse_literal("not a number").unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn test_bit_length() {
        assert_eq!(bit_length(0), 1);
        assert_eq!(bit_length(1), 1);
        assert_eq!(bit_length(2), 2);
        assert_eq!(bit_length(0xFF), 8);
        assert_eq!(bit_length(0x100), 9);
    }

    #[test]
    fn test_checked_value_passes_through() {
        // too wide for the declared field, but still returned as parsed
        assert_eq!(parse_literal_checked("0xFF", 4, "test").unwrap(), 0xFF);
        assert_eq!(parse_literal_checked("0xF", 4, "test").unwrap(), 0xF);
    }
}
