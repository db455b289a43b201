//! Service configuration from `SIM_RECORDS_*` environment variables.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `SIM_RECORDS_NAME_ALGORITHM` | `list` or `operator-list` | `list` |
//! | `SIM_RECORDS_MAX_OPERATOR_RECORDS` | `EF_OPL` scan bound | `254` |
//! | `SIM_RECORDS_LOAD_CSP` | read the CPHS service profile | `false` |
//! | `SIM_RECORDS_CARRIER_OVERRIDES` | path to a carrier override JSON file | unset |
//!
//! Unset variables take their default; set but unparsable ones are errors
//! rather than silently ignored.

use sim_records_core::{CarrierOverrides, EngineConfig};
use sim_resolver::NameAlgorithm;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const ENV_NAME_ALGORITHM: &str = "SIM_RECORDS_NAME_ALGORITHM";
pub const ENV_MAX_OPERATOR_RECORDS: &str = "SIM_RECORDS_MAX_OPERATOR_RECORDS";
pub const ENV_LOAD_CSP: &str = "SIM_RECORDS_LOAD_CSP";
pub const ENV_CARRIER_OVERRIDES: &str = "SIM_RECORDS_CARRIER_OVERRIDES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}: invalid value {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("unknown network name algorithm {0:?} (expected `list` or `operator-list`)")]
    UnknownAlgorithm(String),

    #[error("reading carrier overrides {}: {source}", .path.display())]
    OverridesIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing carrier overrides {}: {source}", .path.display())]
    OverridesJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub engine: EngineConfig,
    /// Where the carrier overrides in `engine` came from, if anywhere.
    pub carrier_overrides_path: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_NAME_ALGORITHM) {
            config.engine.name_algorithm = parse_name_algorithm(&value)?;
        }
        if let Some(max) = parse_var::<u8>(&lookup, ENV_MAX_OPERATOR_RECORDS)? {
            config.engine.max_operator_records = max.max(1);
        }
        if let Some(value) = lookup(ENV_LOAD_CSP) {
            config.engine.load_csp = parse_bool(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: ENV_LOAD_CSP.to_string(),
                value,
            })?;
        }
        if let Some(path) = lookup(ENV_CARRIER_OVERRIDES).filter(|p| !p.trim().is_empty()) {
            config = config.with_carrier_overrides_file(Path::new(path.trim()))?;
        }
        Ok(config)
    }

    /// Replace the carrier overrides with the contents of `path`.
    pub fn with_carrier_overrides_file(mut self, path: &Path) -> Result<Self, ConfigError> {
        self.engine.carrier_overrides = load_carrier_overrides(path)?;
        self.carrier_overrides_path = Some(path.to_path_buf());
        Ok(self)
    }
}

pub fn load_carrier_overrides(path: &Path) -> Result<CarrierOverrides, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::OverridesIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|source| ConfigError::OverridesJson {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_name_algorithm(value: &str) -> Result<NameAlgorithm, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "list" | "name-list" | "pnn" => Ok(NameAlgorithm::NameList),
        "operator-list" | "opl" => Ok(NameAlgorithm::OperatorList),
        _ => Err(ConfigError::UnknownAlgorithm(value.to_string())),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            })
        })
        .transpose()
}
