//! JSON card images for the simulated card.
//!
//! ```json
//! {
//!   "files": [
//!     { "id": "EF_IMSI", "transparent": "083901621032547698" },
//!     { "id": "6FC5", "records": ["43048341e110ffff", "ffffffffffffffff"] }
//!   ],
//!   "failing": ["EF_SPN"]
//! }
//! ```

use crate::error::TransportError;
use crate::simulated::{CardFile, SimulatedCard};
use serde::{Deserialize, Serialize};
use sim_records_types::FileId;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read card image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid card image JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown file identifier {0:?}")]
    UnknownFile(String),

    #[error("invalid hex contents for {file}: {source}")]
    Hex {
        file: String,
        #[source]
        source: hex::FromHexError,
    },

    #[error("file {0} must have exactly one of `transparent` or `records`")]
    Contents(String),
}

/// One file entry of a card image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFile {
    /// Mnemonic (`EF_SPN`) or hex identifier (`6F46`).
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<String>>,
}

/// Serializable description of a card's file system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardImage {
    #[serde(default)]
    pub files: Vec<ImageFile>,
    /// Files whose every request fails as not found.
    #[serde(default)]
    pub failing: Vec<String>,
}

impl CardImage {
    pub fn from_json(json: &str) -> Result<Self, ImageError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ImageError> {
        let json = std::fs::read_to_string(path).map_err(|source| ImageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Build a simulated card holding this image.
    pub fn to_card(&self) -> Result<SimulatedCard, ImageError> {
        let card = SimulatedCard::new();
        for entry in &self.files {
            let id = parse_id(&entry.id)?;
            let contents = match (&entry.transparent, &entry.records) {
                (Some(data), None) => CardFile::Transparent(decode_hex(&entry.id, data)?),
                (None, Some(records)) => CardFile::LinearFixed(
                    records
                        .iter()
                        .map(|r| decode_hex(&entry.id, r))
                        .collect::<Result<_, _>>()?,
                ),
                _ => return Err(ImageError::Contents(entry.id.clone())),
            };
            card.insert_file(id, contents);
        }
        for name in &self.failing {
            let id = parse_id(name)?;
            card.fail_file(id, TransportError::FileNotFound(id));
        }
        Ok(card)
    }
}

fn parse_id(id: &str) -> Result<FileId, ImageError> {
    FileId::parse(id).ok_or_else(|| ImageError::UnknownFile(id.to_string()))
}

fn decode_hex(file: &str, data: &str) -> Result<Vec<u8>, ImageError> {
    let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact).map_err(|source| ImageError::Hex {
        file: file.to_string(),
        source,
    })
}
