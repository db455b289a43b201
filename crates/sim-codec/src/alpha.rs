//! Alpha-identifier fields (names stored next to numbers and provider names).
//!
//! A field is either GSM default alphabet text (one code per byte, `0xFF`
//! padded) or UCS2, selected by a leading marker byte (TS 51.011 Annex B):
//!
//! - `0x80`: UCS2 big-endian code units follow
//! - `0x81`: length, one base byte (`base << 7`), then one byte per character
//! - `0x82`: length, two base bytes, then one byte per character
//!
//! In the `0x81`/`0x82` forms a byte with the high bit set is an offset from
//! the base; otherwise it is a default-alphabet code.

use crate::error::{DecodeError, EncodeError};
use crate::gsm;

const UCS2_MARKER: u8 = 0x80;
const UCS2_BASE_BYTE: u8 = 0x81;
const UCS2_BASE_WORD: u8 = 0x82;

/// Decode a fixed-width alpha window.
pub fn decode_alpha(window: &[u8]) -> Result<String, DecodeError> {
    match window.first() {
        None => Ok(String::new()),
        Some(&UCS2_MARKER) => Ok(decode_ucs2(&window[1..])),
        Some(&UCS2_BASE_BYTE) => {
            let header = window
                .get(..3)
                .ok_or(DecodeError::truncated(3, window.len()))?;
            let count = header[1] as usize;
            let base = (header[2] as u32) << 7;
            decode_based(window, 3, count, base)
        }
        Some(&UCS2_BASE_WORD) => {
            let header = window
                .get(..4)
                .ok_or(DecodeError::truncated(4, window.len()))?;
            let count = header[1] as usize;
            let base = u16::from_be_bytes([header[2], header[3]]) as u32;
            decode_based(window, 4, count, base)
        }
        Some(_) => Ok(gsm::decode_unpacked(window)),
    }
}

/// Decode a length byte at `offset` followed by that many alpha bytes.
///
/// Returns the text and the offset just past the field.
pub fn decode_length_prefixed_alpha(
    data: &[u8],
    offset: usize,
) -> Result<(String, usize), DecodeError> {
    let length = *data
        .get(offset)
        .ok_or(DecodeError::truncated(offset + 1, data.len()))? as usize;
    if length == 0xFF {
        return Err(DecodeError::Uninitialized);
    }
    let start = offset + 1;
    let end = start + length;
    let window = data
        .get(start..end)
        .ok_or(DecodeError::truncated(end, data.len()))?;
    Ok((decode_alpha(window)?, end))
}

fn decode_ucs2(data: &[u8]) -> String {
    let units = data
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0xFFFF);
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

fn decode_based(
    window: &[u8],
    header_len: usize,
    count: usize,
    base: u32,
) -> Result<String, DecodeError> {
    let end = header_len + count;
    let body = window
        .get(header_len..end)
        .ok_or(DecodeError::truncated(end, window.len()))?;
    Ok(body
        .iter()
        .map(|b| {
            if b & 0x80 != 0 {
                char::from_u32(base + (b & 0x7F) as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
            } else {
                gsm::default_char(*b)
            }
        })
        .collect())
}

/// Encode `text` into a window of exactly `width` bytes, `0xFF` padded.
///
/// GSM default alphabet is used when every character is representable,
/// otherwise UCS2 with the `0x80` marker.
pub fn encode_alpha(text: &str, width: usize) -> Result<Vec<u8>, EncodeError> {
    let gsm: Option<Vec<u8>> = text
        .chars()
        .map(gsm::encode_char)
        .collect::<Option<Vec<Vec<u8>>>>()
        .map(|codes| codes.concat());

    let mut encoded = match gsm {
        Some(codes) => codes,
        None => {
            let mut out = vec![UCS2_MARKER];
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_be_bytes());
            }
            out
        }
    };

    if encoded.len() > width {
        return Err(EncodeError::TooLong {
            field: "alpha identifier",
            length: encoded.len(),
            max: width,
        });
    }
    encoded.resize(width, 0xFF);
    Ok(encoded)
}
