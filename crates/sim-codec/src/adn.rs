//! Abbreviated dialing number records (`EF_MSISDN`, `EF_MBDN`, CPHS mailbox).
//!
//! Layout (TS 51.011 §10.5.1): an alpha window of `len - 14` bytes followed by
//! a 14 byte footer.
//!
//! | offset | content                                   |
//! |--------|-------------------------------------------|
//! | 0      | length of TON/NPI + BCD bytes             |
//! | 1      | TON/NPI                                   |
//! | 2..12  | BCD digits                                |
//! | 12     | capability/configuration identifier       |
//! | 13     | extension record identifier               |

use crate::alpha::{decode_alpha, encode_alpha};
use crate::bcd::{decode_dialing_digits, encode_dialing_digits};
use crate::error::{DecodeError, EncodeError};

pub const FOOTER_SIZE: usize = 14;
const MAX_NUMBER_BYTES: usize = 11;
const TON_INTERNATIONAL: u8 = 0x91;
const TON_UNKNOWN: u8 = 0x81;

/// A decoded dialing-number record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdnRecord {
    pub alpha: String,
    pub number: String,
}

impl AdnRecord {
    pub fn new(alpha: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            alpha: alpha.into(),
            number: number.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty() && self.number.is_empty()
    }

    pub fn decode(record: &[u8]) -> Result<Self, DecodeError> {
        if record.len() < FOOTER_SIZE {
            return Err(DecodeError::InvalidLength {
                field: "dialing number record",
                length: record.len(),
            });
        }
        let footer_at = record.len() - FOOTER_SIZE;
        let alpha = decode_alpha(&record[..footer_at])?;
        let footer = &record[footer_at..];

        let number_len = footer[0] as usize;
        let number = match number_len {
            0 | 0xFF => String::new(),
            n if n > MAX_NUMBER_BYTES => {
                return Err(DecodeError::InvalidLength {
                    field: "dialing number",
                    length: n,
                })
            }
            n => {
                let digits = decode_dialing_digits(&footer[2..1 + n]);
                if footer[1] == TON_INTERNATIONAL && !digits.is_empty() {
                    format!("+{digits}")
                } else {
                    digits
                }
            }
        };
        Ok(Self { alpha, number })
    }

    /// Encode into a record of exactly `width` bytes.
    pub fn encode(&self, width: usize) -> Result<Vec<u8>, EncodeError> {
        if width < FOOTER_SIZE {
            return Err(EncodeError::RecordTooSmall(width));
        }
        let mut record = encode_alpha(&self.alpha, width - FOOTER_SIZE)?;
        let mut footer = [0xFFu8; FOOTER_SIZE];

        if !self.number.is_empty() {
            let (ton, digits) = match self.number.strip_prefix('+') {
                Some(rest) => (TON_INTERNATIONAL, rest),
                None => (TON_UNKNOWN, self.number.as_str()),
            };
            let bcd = encode_dialing_digits(digits)?;
            if bcd.len() + 1 > MAX_NUMBER_BYTES {
                return Err(EncodeError::TooLong {
                    field: "dialing number",
                    length: digits.len(),
                    max: (MAX_NUMBER_BYTES - 1) * 2,
                });
            }
            footer[0] = (bcd.len() + 1) as u8;
            footer[1] = ton;
            footer[2..2 + bcd.len()].copy_from_slice(&bcd);
        }

        record.extend_from_slice(&footer);
        Ok(record)
    }
}
