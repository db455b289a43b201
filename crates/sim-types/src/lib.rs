//! Shared types for the sim-records workspace.
//!
//! This crate provides the vocabulary used by every other crate in the
//! workspace, breaking circular dependency chains between the codecs, the
//! transport boundary, the resolvers and the engine:
//!
//! - [`files`]: elementary file identifiers of the card file system
//! - [`snapshot`]: the published [`CardRecordSnapshot`] and display-rule query
//!
//! The registration context lives here as well because both the
//! network-name resolver and the engine's public API need it.

pub mod files;
pub mod snapshot;

pub use files::FileId;
pub use snapshot::{CardRecordSnapshot, DialingNumber, DisplayRule};

use serde::{Deserialize, Serialize};

/// Where the device is currently registered, as reported by the network side.
///
/// The operator-list name algorithm cannot match any record without this, so
/// the resolver defers until one is available.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationContext {
    /// Registered operator code (MCC + MNC, 5 or 6 digits).
    pub operator: String,
    /// Current location area code.
    pub location_area: u16,
}

impl RegistrationContext {
    pub fn new(operator: impl Into<String>, location_area: u16) -> Self {
        Self {
            operator: operator.into(),
            location_area,
        }
    }

    /// A context is usable only when it names an operator.
    pub fn is_usable(&self) -> bool {
        !self.operator.trim().is_empty()
    }
}
