//! Administrative and service-table files.

use crate::error::DecodeError;

/// CPHS information byte 1: mailbox numbers service allocated and activated.
const CPHS_MAILBOX_SERVICE: u8 = 0x30;
/// Customer service profile group: value added services.
const CSP_VALUE_ADDED_SERVICES: u8 = 0xC0;
/// Value added services: PLMN (manual network selection) menu.
const CSP_PLMN_MODE: u8 = 0x80;

/// MNC length from the low nibble of `EF_AD` byte 3; `0` when the nibble is
/// the `0xF` filler.
pub fn decode_mnc_length(data: &[u8]) -> Result<u8, DecodeError> {
    let byte = data.get(3).ok_or(DecodeError::truncated(4, data.len()))?;
    Ok(match byte & 0x0F {
        0x0F => 0,
        len => len,
    })
}

/// 1-based `EF_MBDN` record index for voicemail from `EF_MBI` record 1.
pub fn decode_mailbox_index(record: &[u8]) -> Result<u8, DecodeError> {
    match record.first() {
        None => Err(DecodeError::Empty),
        Some(0x00) | Some(0xFF) => Err(DecodeError::Invalid {
            field: "EF_MBI",
            reason: "no voicemail mailbox index",
        }),
        Some(index) => Ok(*index),
    }
}

/// Whether the CPHS information file enables the CPHS mailbox numbers.
pub fn cphs_mailbox_enabled(info: &[u8]) -> bool {
    info.get(1)
        .map(|b| b & CPHS_MAILBOX_SERVICE == CPHS_MAILBOX_SERVICE)
        .unwrap_or(false)
}

/// Operator menu flag from the CPHS customer service profile, `None` when the
/// value-added-services group is not present.
pub fn decode_csp_operator_menu(data: &[u8]) -> Option<bool> {
    data.chunks_exact(2)
        .find(|entry| entry[0] == CSP_VALUE_ADDED_SERVICES)
        .map(|entry| entry[1] & CSP_PLMN_MODE != 0)
}
