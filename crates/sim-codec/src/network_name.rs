//! Network name information element (TS 24.008 §10.5.3.5a), as stored in the
//! name fields of `EF_PNN`.
//!
//! The first byte carries the coding scheme (bits 7-5) and the number of spare
//! bits in the last octet (bits 3-1). Coding `000` is GSM 7-bit packed,
//! `001` is UCS2 big-endian.

use crate::error::{DecodeError, EncodeError};
use crate::gsm;

const CODING_MASK: u8 = 0x70;
const CODING_GSM7: u8 = 0x00;
const CODING_UCS2: u8 = 0x10;
const SPARE_MASK: u8 = 0x07;

/// Decode a network name information element value.
pub fn decode_network_name(data: &[u8]) -> Result<String, DecodeError> {
    let (&header, text) = data.split_first().ok_or(DecodeError::Empty)?;
    match header & CODING_MASK {
        CODING_GSM7 => {
            let spare = (header & SPARE_MASK) as usize;
            let bits = (text.len() * 8).saturating_sub(spare);
            let septets = gsm::unpack_septets(text, bits / 7);
            Ok(gsm::decode_septets(&septets))
        }
        CODING_UCS2 => {
            let units = text
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            Ok(char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect())
        }
        other => Err(DecodeError::UnsupportedCoding(other >> 4)),
    }
}

/// Encode `text` as a GSM 7-bit packed network name element value.
pub fn encode_network_name(text: &str) -> Result<Vec<u8>, EncodeError> {
    let mut septets = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let codes = gsm::encode_char(ch).ok_or(EncodeError::InvalidDigit(ch))?;
        septets.extend(codes);
    }
    let (packed, spare) = gsm::pack_septets(&septets);
    let mut out = Vec::with_capacity(packed.len() + 1);
    // extension bit set, GSM 7-bit coding, no country initials
    out.push(0x80 | CODING_GSM7 | spare);
    out.extend(packed);
    Ok(out)
}
