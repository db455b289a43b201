//! Binary-coded decimal digit strings.
//!
//! Each byte carries two digits, low nibble first. A `0xF` nibble marks the
//! end of an odd-length number. Dialing numbers additionally use `0xA`-`0xE`
//! for the extended characters of TS 51.011 (`*`, `#`, pause, wild, wait).

use crate::error::{DecodeError, EncodeError};

/// Filler nibble terminating a digit string.
const FILLER: u8 = 0x0F;

/// Map a dialing nibble to its character.
fn dialing_char(nibble: u8) -> Option<char> {
    match nibble {
        0..=9 => Some((b'0' + nibble) as char),
        0x0A => Some('*'),
        0x0B => Some('#'),
        0x0C => Some(','),
        0x0D => Some('N'),
        0x0E => Some(';'),
        _ => None,
    }
}

fn dialing_nibble(c: char) -> Result<u8, EncodeError> {
    match c {
        '0'..='9' => Ok(c as u8 - b'0'),
        '*' => Ok(0x0A),
        '#' => Ok(0x0B),
        ',' | 'p' | 'P' => Ok(0x0C),
        'N' | 'n' => Ok(0x0D),
        ';' | 'w' | 'W' => Ok(0x0E),
        other => Err(EncodeError::InvalidDigit(other)),
    }
}

fn nibbles(data: &[u8]) -> impl Iterator<Item = u8> + '_ {
    data.iter().flat_map(|b| [b & 0x0F, b >> 4])
}

/// Decode plain decimal digits, stopping at the first nibble above 9.
///
/// Used for identifiers (card serial, subscriber id) where only digits are
/// meaningful.
pub fn decode_digits(data: &[u8]) -> String {
    nibbles(data)
        .take_while(|n| *n <= 9)
        .map(|n| (b'0' + n) as char)
        .collect()
}

/// Decode a dialing-number digit string.
///
/// Stops at the `0xF` filler; extended nibbles map to their characters.
pub fn decode_dialing_digits(data: &[u8]) -> String {
    nibbles(data)
        .take_while(|n| *n != FILLER)
        .filter_map(dialing_char)
        .collect()
}

/// Encode a dialing-number digit string, padding odd counts with `0xF`.
pub fn encode_dialing_digits(digits: &str) -> Result<Vec<u8>, EncodeError> {
    let values = digits
        .chars()
        .map(dialing_nibble)
        .collect::<Result<Vec<u8>, _>>()?;

    Ok(values
        .chunks(2)
        .map(|pair| {
            let low = pair[0];
            let high = pair.get(1).copied().unwrap_or(FILLER);
            (high << 4) | low
        })
        .collect())
}

/// Decode the `EF_IMSI` layout: a length byte, then a first byte whose high
/// nibble is digit one (low nibble is the parity/type indicator), then BCD.
pub fn decode_imsi(data: &[u8]) -> Result<String, DecodeError> {
    let (&length, rest) = data.split_first().ok_or(DecodeError::Empty)?;
    let length = length as usize;
    if length == 0 || length == 0xFF {
        return Err(DecodeError::Uninitialized);
    }
    if rest.len() < length {
        return Err(DecodeError::truncated(length + 1, data.len()));
    }

    let body = &rest[..length];
    let first = body[0] >> 4;
    if first > 9 {
        return Err(DecodeError::Invalid {
            field: "IMSI",
            reason: "first digit is not decimal",
        });
    }

    let mut imsi = String::with_capacity(length * 2);
    imsi.push((b'0' + first) as char);
    imsi.push_str(&decode_digits(&body[1..]));
    Ok(imsi)
}

/// Encode digits into the `EF_IMSI` layout (inverse of [`decode_imsi`]).
pub fn encode_imsi(imsi: &str) -> Result<Vec<u8>, EncodeError> {
    let mut chars = imsi.chars();
    let first = match chars.next() {
        Some(c) if c.is_ascii_digit() => c as u8 - b'0',
        Some(c) => return Err(EncodeError::InvalidDigit(c)),
        None => return Err(EncodeError::Empty("IMSI")),
    };
    if imsi.len() > 15 {
        return Err(EncodeError::TooLong {
            field: "IMSI",
            length: imsi.len(),
            max: 15,
        });
    }
    let parity = if imsi.len() % 2 == 1 { 0x09 } else { 0x01 };
    let rest: String = chars.collect();
    if let Some(bad) = rest.chars().find(|c| !c.is_ascii_digit()) {
        return Err(EncodeError::InvalidDigit(bad));
    }

    let mut body = vec![(first << 4) | parity];
    body.extend(encode_dialing_digits(&rest)?);
    let mut out = vec![body.len() as u8];
    out.extend(body);
    Ok(out)
}
