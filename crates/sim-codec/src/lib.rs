//! SIM elementary file codecs.
//!
//! Pure functions decoding and encoding the fixed binary formats of the card's
//! files. Nothing here keeps state or performs I/O, and no decoder panics on
//! short or corrupt input: every failure is a [`DecodeError`] which callers
//! treat as "field absent".
//!
//! - [`bcd`]: BCD digit strings and the `EF_IMSI` layout
//! - [`gsm`]: GSM 03.38 default alphabet and 7-bit packing
//! - [`alpha`]: alpha identifiers (GSM default alphabet or UCS2)
//! - [`network_name`]: TS 24.008 network name elements
//! - [`tlv`]: simple-TLV iteration
//! - [`adn`]: dialing-number records
//! - [`plmn`]: PLMN triplets and `EF_SPDI`
//! - [`indicators`]: voicemail-waiting and call-forwarding flags
//! - [`service_info`]: `EF_AD`, `EF_MBI` and the CPHS service tables

pub mod adn;
pub mod alpha;
pub mod bcd;
pub mod error;
pub mod gsm;
pub mod indicators;
pub mod network_name;
pub mod plmn;
pub mod service_info;
pub mod tlv;

pub use adn::AdnRecord;
pub use alpha::{decode_alpha, decode_length_prefixed_alpha, encode_alpha};
pub use bcd::{decode_dialing_digits, decode_digits, decode_imsi, encode_dialing_digits};
pub use error::{DecodeError, EncodeError};
pub use network_name::decode_network_name;
pub use plmn::{decode_plmn, decode_spdi};
pub use tlv::{TlvIter, TlvObject};
