//! Recursive-descent bencode decoder
//!
//! Every routine advances a shared cursor, so a container always knows
//! exactly how many bytes each nested value consumed.

use tracing::trace;

use crate::bencode::value::{Dict, Value};
use crate::error::{Result, TorrentError};

/// Maximum container nesting accepted by the decoder
pub const MAX_DEPTH: usize = 64;

/// Decode exactly one value spanning the whole input.
pub fn decode(data: &[u8]) -> Result<Value> {
    let (value, consumed) = decode_at(data, 0)?;
    if consumed != data.len() {
        return Err(TorrentError::malformed_input(
            format!("{} trailing bytes after value", data.len() - consumed),
            consumed,
        ));
    }
    Ok(value)
}

/// Decode one value starting at `offset`.
///
/// Returns the value and the number of bytes it occupied, so that
/// `offset + consumed` is the first byte after it.
pub fn decode_at(data: &[u8], offset: usize) -> Result<(Value, usize)> {
    trace!("Decoding bencode value at offset {} of {} bytes", offset, data.len());
    let mut idx = offset;
    let value = parse_value(data, &mut idx, 0)?;
    Ok((value, idx - offset))
}

fn parse_value(data: &[u8], idx: &mut usize, depth: usize) -> Result<Value> {
    if depth > MAX_DEPTH {
        return Err(TorrentError::malformed_input("nesting too deep", *idx));
    }

    let byte = *data
        .get(*idx)
        .ok_or_else(|| TorrentError::malformed_input("unexpected end of input", *idx))?;

    match byte {
        b'i' => parse_integer(data, idx),
        b'l' => parse_list(data, idx, depth),
        b'd' => parse_dict(data, idx, depth),
        b'0'..=b'9' => parse_bytes(data, idx),
        other => Err(TorrentError::malformed_input(
            format!("unexpected byte 0x{:02x}", other),
            *idx,
        )),
    }
}

fn parse_integer(data: &[u8], idx: &mut usize) -> Result<Value> {
    let start = *idx + 1;
    let end = data[start..]
        .iter()
        .position(|&b| b == b'e')
        .map(|p| p + start)
        .ok_or_else(|| TorrentError::malformed_input("unterminated integer", *idx))?;

    let digits = &data[start..end];
    let unsigned = digits.strip_prefix(b"-").unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.iter().all(u8::is_ascii_digit) {
        return Err(TorrentError::malformed_input("invalid integer digits", start));
    }
    if unsigned.len() > 1 && unsigned[0] == b'0' {
        return Err(TorrentError::malformed_input("integer has leading zeros", start));
    }
    if digits == b"-0" {
        return Err(TorrentError::malformed_input("negative zero", start));
    }

    // Digits are ASCII at this point
    let text = std::str::from_utf8(digits)
        .map_err(|_| TorrentError::malformed_input("invalid integer digits", start))?;
    let value: i64 = text
        .parse()
        .map_err(|_| TorrentError::malformed_input("integer out of range", start))?;

    *idx = end + 1;
    Ok(Value::Integer(value))
}

fn parse_bytes(data: &[u8], idx: &mut usize) -> Result<Value> {
    let start = *idx;
    let colon = data[start..]
        .iter()
        .position(|&b| b == b':')
        .map(|p| p + start)
        .ok_or_else(|| TorrentError::malformed_input("unterminated string length", start))?;

    let len_digits = &data[start..colon];
    if !len_digits.iter().all(u8::is_ascii_digit) {
        return Err(TorrentError::malformed_input("invalid string length", start));
    }
    let length: usize = std::str::from_utf8(len_digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| TorrentError::malformed_input("invalid string length", start))?;

    let body = colon + 1;
    let end = body
        .checked_add(length)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| TorrentError::malformed_input(
            format!("string of {} bytes runs past end of input", length),
            start,
        ))?;

    *idx = end;
    Ok(Value::Bytes(data[body..end].to_vec()))
}

fn parse_list(data: &[u8], idx: &mut usize, depth: usize) -> Result<Value> {
    let start = *idx;
    *idx += 1;
    let mut list = Vec::new();
    loop {
        match data.get(*idx) {
            Some(b'e') => break,
            Some(_) => list.push(parse_value(data, idx, depth + 1)?),
            None => return Err(TorrentError::malformed_input("unterminated list", start)),
        }
    }
    *idx += 1; // skip 'e'
    Ok(Value::List(list))
}

fn parse_dict(data: &[u8], idx: &mut usize, depth: usize) -> Result<Value> {
    let start = *idx;
    *idx += 1;
    let mut dict = Dict::new();
    loop {
        match data.get(*idx) {
            Some(b'e') => break,
            Some(b'0'..=b'9') => {
                let key_offset = *idx;
                let key = match parse_bytes(data, idx)? {
                    Value::Bytes(b) => b,
                    _ => unreachable!("parse_bytes always yields a byte string"),
                };
                if dict.contains_key(&key) {
                    return Err(TorrentError::malformed_input("duplicate dictionary key", key_offset));
                }
                let value = parse_value(data, idx, depth + 1)?;
                dict.insert(key, value);
            }
            Some(_) => {
                return Err(TorrentError::malformed_input("dictionary key must be a byte string", *idx));
            }
            None => return Err(TorrentError::malformed_input("unterminated dictionary", start)),
        }
    }
    *idx += 1; // skip 'e'
    Ok(Value::Dict(dict))
}
