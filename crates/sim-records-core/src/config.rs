//! Engine configuration.

use serde::{Deserialize, Serialize};
use sim_records_types::DialingNumber;
use sim_resolver::network_name::DEFAULT_MAX_OPERATOR_RECORDS;
use sim_resolver::NameAlgorithm;
use std::collections::HashMap;

/// Per-operator values that replace what the card provides, keyed by the
/// home operator code (`MCC+MNC`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarrierOverrides {
    /// Voicemail numbers fixed by the operator.
    pub voicemail: HashMap<String, DialingNumber>,
    /// Provider names replacing the card's service provider name.
    pub provider_names: HashMap<String, String>,
}

impl CarrierOverrides {
    pub fn is_empty(&self) -> bool {
        self.voicemail.is_empty() && self.provider_names.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub name_algorithm: NameAlgorithm,
    /// Upper bound on `EF_OPL` records scanned by the operator-list algorithm.
    pub max_operator_records: u8,
    /// Read the CPHS customer service profile during the initial batch.
    pub load_csp: bool,
    pub carrier_overrides: CarrierOverrides,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name_algorithm: NameAlgorithm::NameList,
            max_operator_records: DEFAULT_MAX_OPERATOR_RECORDS,
            load_csp: false,
            carrier_overrides: CarrierOverrides::default(),
        }
    }
}
