//! Elementary file identifiers.
//!
//! Identifiers follow TS 51.011 for the standard files and CPHS 4.2 for the
//! legacy operator files. Only the subset the engine reads or writes is listed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an elementary file on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u16);

impl FileId {
    // =========================================================================
    // Identity
    // =========================================================================

    pub const ICCID: FileId = FileId(0x2FE2);
    pub const IMSI: FileId = FileId(0x6F07);
    pub const AD: FileId = FileId(0x6FAD);

    // =========================================================================
    // Numbering
    // =========================================================================

    pub const MSISDN: FileId = FileId(0x6F40);
    pub const MBI: FileId = FileId(0x6FC9);
    pub const MBDN: FileId = FileId(0x6FC7);
    pub const MAILBOX_CPHS: FileId = FileId(0x6F17);

    // =========================================================================
    // Indicators
    // =========================================================================

    pub const MWIS: FileId = FileId(0x6FCA);
    pub const CFIS: FileId = FileId(0x6FCB);
    pub const VOICE_MAIL_INDICATOR_CPHS: FileId = FileId(0x6F11);
    pub const CFF_CPHS: FileId = FileId(0x6F13);

    // =========================================================================
    // Display names
    // =========================================================================

    pub const SPN: FileId = FileId(0x6F46);
    pub const SPN_CPHS: FileId = FileId(0x6F14);
    pub const SPN_SHORT_CPHS: FileId = FileId(0x6F18);
    pub const SPDI: FileId = FileId(0x6FCD);
    pub const PNN: FileId = FileId(0x6FC5);
    pub const OPL: FileId = FileId(0x6FC6);

    // =========================================================================
    // Service information
    // =========================================================================

    pub const INFO_CPHS: FileId = FileId(0x6F16);
    pub const CSP_CPHS: FileId = FileId(0x6F15);

    /// Short mnemonic for logs, `None` for files the engine does not know.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            FileId::ICCID => "EF_ICCID",
            FileId::IMSI => "EF_IMSI",
            FileId::AD => "EF_AD",
            FileId::MSISDN => "EF_MSISDN",
            FileId::MBI => "EF_MBI",
            FileId::MBDN => "EF_MBDN",
            FileId::MAILBOX_CPHS => "EF_MAILBOX_CPHS",
            FileId::MWIS => "EF_MWIS",
            FileId::CFIS => "EF_CFIS",
            FileId::VOICE_MAIL_INDICATOR_CPHS => "EF_VOICE_MAIL_INDICATOR_CPHS",
            FileId::CFF_CPHS => "EF_CFF_CPHS",
            FileId::SPN => "EF_SPN",
            FileId::SPN_CPHS => "EF_SPN_CPHS",
            FileId::SPN_SHORT_CPHS => "EF_SPN_SHORT_CPHS",
            FileId::SPDI => "EF_SPDI",
            FileId::PNN => "EF_PNN",
            FileId::OPL => "EF_OPL",
            FileId::INFO_CPHS => "EF_INFO_CPHS",
            FileId::CSP_CPHS => "EF_CSP_CPHS",
            _ => return None,
        };
        Some(name)
    }

    /// Parse `"6F46"`, `"0x6f46"` or a mnemonic such as `"EF_SPN"`.
    pub fn parse(input: &str) -> Option<FileId> {
        let trimmed = input.trim();
        if let Some(known) = ALL_KNOWN.iter().find(|id| id.name() == Some(trimmed)) {
            return Some(*known);
        }
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        u16::from_str_radix(hex, 16).ok().map(FileId)
    }
}

const ALL_KNOWN: [FileId; 19] = [
    FileId::ICCID,
    FileId::IMSI,
    FileId::AD,
    FileId::MSISDN,
    FileId::MBI,
    FileId::MBDN,
    FileId::MAILBOX_CPHS,
    FileId::MWIS,
    FileId::CFIS,
    FileId::VOICE_MAIL_INDICATOR_CPHS,
    FileId::CFF_CPHS,
    FileId::SPN,
    FileId::SPN_CPHS,
    FileId::SPN_SHORT_CPHS,
    FileId::SPDI,
    FileId::PNN,
    FileId::OPL,
    FileId::INFO_CPHS,
    FileId::CSP_CPHS,
];

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({:04X})", name, self.0),
            None => write!(f, "EF({:04X})", self.0),
        }
    }
}
