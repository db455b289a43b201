//! Voicemail-waiting and call-forwarding indicator files.
//!
//! Two generations of each indicator exist on most cards: the 3GPP files
//! (`EF_MWIS`, `EF_CFIS`) and the CPHS ones (voicemail indicator, call-forward
//! flags). The encoders rewrite only the indicator bits of a previously read
//! record so that the remaining fields survive the update.

use crate::error::DecodeError;

/// CPHS nibble: line 1 flag set.
const CPHS_FLAG_SET: u8 = 0x0A;
/// CPHS nibble: line 1 flag clear.
const CPHS_FLAG_CLEAR: u8 = 0x05;

/// Message count from an `EF_MWIS` record.
///
/// Returns `-1` when the voicemail flag is set without a count.
pub fn decode_mwis(record: &[u8]) -> Result<i32, DecodeError> {
    let header = record
        .get(..2)
        .ok_or(DecodeError::truncated(2, record.len()))?;
    if header[0] == 0xFF {
        return Err(DecodeError::Uninitialized);
    }
    let waiting = header[0] & 0x01 != 0;
    let count = header[1] as i32;
    Ok(match (waiting, count) {
        (false, _) => 0,
        (true, 0) => -1,
        (true, n) => n,
    })
}

/// Rewrite the voicemail flag and count of an `EF_MWIS` record.
pub fn encode_mwis(existing: &[u8], count: i32) -> Result<Vec<u8>, DecodeError> {
    let mut record = existing.to_vec();
    if record.len() < 2 {
        return Err(DecodeError::truncated(2, record.len()));
    }
    record[0] = (record[0] & 0xFE) | u8::from(count != 0);
    record[1] = if count < 0 { 0 } else { count.min(255) as u8 };
    Ok(record)
}

/// Message count from the CPHS voicemail indicator (`-1` or `0`).
pub fn decode_cphs_mwi(data: &[u8]) -> Result<i32, DecodeError> {
    let first = data.first().ok_or(DecodeError::Empty)?;
    match first & 0x0F {
        CPHS_FLAG_SET => Ok(-1),
        CPHS_FLAG_CLEAR => Ok(0),
        _ => Err(DecodeError::Invalid {
            field: "CPHS voicemail indicator",
            reason: "unknown line 1 flag",
        }),
    }
}

pub fn encode_cphs_mwi(existing: &[u8], count: i32) -> Result<Vec<u8>, DecodeError> {
    let mut data = existing.to_vec();
    let first = data.first_mut().ok_or(DecodeError::Empty)?;
    let flag = if count == 0 {
        CPHS_FLAG_CLEAR
    } else {
        CPHS_FLAG_SET
    };
    *first = (*first & 0xF0) | flag;
    Ok(data)
}

/// Unconditional voice call-forwarding flag from an `EF_CFIS` record.
pub fn decode_cfis(record: &[u8]) -> Result<bool, DecodeError> {
    let header = record
        .get(..2)
        .ok_or(DecodeError::truncated(2, record.len()))?;
    // byte 0 is the MSP number, 1..=4
    if !(1..=4).contains(&header[0]) {
        return Err(DecodeError::Invalid {
            field: "EF_CFIS",
            reason: "MSP number out of range",
        });
    }
    Ok(header[1] & 0x01 != 0)
}

pub fn encode_cfis(existing: &[u8], enabled: bool) -> Result<Vec<u8>, DecodeError> {
    let mut record = existing.to_vec();
    let status = record
        .get_mut(1)
        .ok_or(DecodeError::truncated(2, existing.len()))?;
    *status = if enabled {
        *status | 0x01
    } else {
        *status & 0xFE
    };
    Ok(record)
}

/// Line 1 flag from the CPHS call-forward flags file.
pub fn decode_cff(data: &[u8]) -> Result<bool, DecodeError> {
    let first = data.first().ok_or(DecodeError::Empty)?;
    Ok(first & 0x0F == CPHS_FLAG_SET)
}

pub fn encode_cff(existing: &[u8], enabled: bool) -> Result<Vec<u8>, DecodeError> {
    let mut data = existing.to_vec();
    let first = data.first_mut().ok_or(DecodeError::Empty)?;
    let flag = if enabled {
        CPHS_FLAG_SET
    } else {
        CPHS_FLAG_CLEAR
    };
    *first = (*first & 0xF0) | flag;
    Ok(data)
}
