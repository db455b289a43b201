//! PLMN identities (MCC + MNC) in the three-byte BCD layout of TS 24.008.
//!
//! ```text
//! byte 0: MCC2 | MCC1
//! byte 1: MNC3 | MCC3     (MNC3 = 0xF for two-digit MNCs)
//! byte 2: MNC2 | MNC1
//! ```

use crate::error::{DecodeError, EncodeError};
use crate::tlv::TlvIter;

/// Service provider display information wrapper tag.
const TAG_SPDI: u8 = 0xA3;
/// PLMN list inside the service provider display information.
const TAG_PLMN_LIST: u8 = 0x80;

/// Decode one PLMN triplet to its 5 or 6 digit `MCC+MNC` string.
pub fn decode_plmn(bytes: &[u8; 3]) -> Result<String, DecodeError> {
    if bytes == &[0xFF, 0xFF, 0xFF] {
        return Err(DecodeError::Uninitialized);
    }
    let mcc = [bytes[0] & 0x0F, bytes[0] >> 4, bytes[1] & 0x0F];
    let mnc3 = bytes[1] >> 4;
    let mnc = [bytes[2] & 0x0F, bytes[2] >> 4];

    if mcc.iter().chain(mnc.iter()).any(|d| *d > 9) || (mnc3 > 9 && mnc3 != 0x0F) {
        return Err(DecodeError::Invalid {
            field: "PLMN",
            reason: "non-decimal digit",
        });
    }

    let mut out: String = mcc
        .iter()
        .chain(mnc.iter())
        .map(|d| (b'0' + d) as char)
        .collect();
    if mnc3 != 0x0F {
        out.push((b'0' + mnc3) as char);
    }
    Ok(out)
}

/// Encode a 5 or 6 digit `MCC+MNC` string.
pub fn encode_plmn(plmn: &str) -> Result<[u8; 3], EncodeError> {
    if plmn.len() != 5 && plmn.len() != 6 {
        return Err(EncodeError::TooLong {
            field: "PLMN",
            length: plmn.len(),
            max: 6,
        });
    }
    let digits = plmn
        .chars()
        .map(|c| {
            c.to_digit(10)
                .map(|d| d as u8)
                .ok_or(EncodeError::InvalidDigit(c))
        })
        .collect::<Result<Vec<u8>, _>>()?;
    let mnc3 = digits.get(5).copied().unwrap_or(0x0F);
    Ok([
        (digits[1] << 4) | digits[0],
        (mnc3 << 4) | digits[2],
        (digits[4] << 4) | digits[3],
    ])
}

/// Decode a packed list of PLMN triplets, skipping unused or invalid entries.
pub fn decode_plmn_list(data: &[u8]) -> Vec<String> {
    data.chunks_exact(3)
        .filter_map(|chunk| {
            let triplet: &[u8; 3] = chunk.try_into().ok()?;
            decode_plmn(triplet).ok()
        })
        .collect()
}

/// Equivalent home networks from `EF_SPDI`.
///
/// The PLMN list is normally wrapped in the `0xA3` display-information tag;
/// a bare `0x80` list at top level is accepted too.
pub fn decode_spdi(data: &[u8]) -> Vec<String> {
    let body = TlvIter::new(data)
        .find_tag(TAG_SPDI)
        .map(|wrapper| wrapper.data)
        .unwrap_or(data);
    TlvIter::new(body)
        .find_tag(TAG_PLMN_LIST)
        .map(|list| decode_plmn_list(list.data))
        .unwrap_or_default()
}
