//! Requests submitted to the card and the tags that correlate their replies.

use sim_records_types::FileId;
use std::fmt;

/// Opaque correlation tag carried by every request and its reply.
///
/// The upper 32 bits hold the load-cycle generation that issued the request,
/// the lower 32 bits a per-generation sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestTag(u64);

impl RequestTag {
    pub fn new(generation: u32, sequence: u32) -> Self {
        Self(((generation as u64) << 32) | sequence as u64)
    }

    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn sequence(self) -> u32 {
        self.0 as u32
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}#{}", self.generation(), self.sequence())
    }
}

/// One card operation. Record numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardRequest {
    ReadTransparent {
        file: FileId,
    },
    ReadLinearFixed {
        file: FileId,
        record: u8,
    },
    ReadLinearFixedAll {
        file: FileId,
    },
    UpdateLinearFixed {
        file: FileId,
        record: u8,
        data: Vec<u8>,
    },
    UpdateTransparent {
        file: FileId,
        data: Vec<u8>,
    },
}

impl CardRequest {
    pub fn read(file: FileId) -> Self {
        CardRequest::ReadTransparent { file }
    }

    pub fn read_record(file: FileId, record: u8) -> Self {
        CardRequest::ReadLinearFixed { file, record }
    }

    pub fn file(&self) -> FileId {
        match self {
            CardRequest::ReadTransparent { file }
            | CardRequest::ReadLinearFixed { file, .. }
            | CardRequest::ReadLinearFixedAll { file }
            | CardRequest::UpdateLinearFixed { file, .. }
            | CardRequest::UpdateTransparent { file, .. } => *file,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(
            self,
            CardRequest::UpdateLinearFixed { .. } | CardRequest::UpdateTransparent { .. }
        )
    }
}

impl fmt::Display for CardRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardRequest::ReadTransparent { file } => write!(f, "read {file}"),
            CardRequest::ReadLinearFixed { file, record } => write!(f, "read {file}[{record}]"),
            CardRequest::ReadLinearFixedAll { file } => write!(f, "read {file}[*]"),
            CardRequest::UpdateLinearFixed { file, record, data } => {
                write!(f, "update {file}[{record}] ({} bytes)", data.len())
            }
            CardRequest::UpdateTransparent { file, data } => {
                write!(f, "update {file} ({} bytes)", data.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_packs_generation_and_sequence() {
        let tag = RequestTag::new(7, 42);
        assert_eq!(tag.generation(), 7);
        assert_eq!(tag.sequence(), 42);
        assert_eq!(tag.to_string(), "g7#42");
        assert_ne!(RequestTag::new(1, 0), RequestTag::new(0, 1));
        assert_eq!(RequestTag::new(u32::MAX, u32::MAX).raw(), u64::MAX);
    }

    #[test]
    fn test_request_accessors() {
        let write = CardRequest::UpdateLinearFixed {
            file: FileId::MSISDN,
            record: 1,
            data: vec![0xFF; 28],
        };
        assert!(write.is_write());
        assert_eq!(write.file(), FileId::MSISDN);
        assert!(!CardRequest::read(FileId::IMSI).is_write());
        assert_eq!(
            CardRequest::read_record(FileId::PNN, 3).to_string(),
            "read EF_PNN(6FC5)[3]"
        );
    }
}
