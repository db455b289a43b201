//! The published, typed view of the card's identity data.

use serde::{Deserialize, Serialize};

/// A dialing number with its alpha tag, as stored in number records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DialingNumber {
    pub digits: String,
    pub display_name: String,
}

impl DialingNumber {
    pub fn new(display_name: impl Into<String>, digits: impl Into<String>) -> Self {
        Self {
            digits: digits.into(),
            display_name: display_name.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty() && self.display_name.is_empty()
    }
}

/// Which names a status bar should show for the current registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRule {
    pub show_provider_name: bool,
    pub show_network_name: bool,
}

/// Display-condition bit: show the network name even on the home network.
pub const CONDITION_NETWORK_NAME_ON_HOME: i32 = 0x01;
/// Display-condition bit: hide the provider name while roaming.
pub const CONDITION_HIDE_PROVIDER_ROAMING: i32 = 0x02;

/// Snapshot of everything resolved from the card.
///
/// Fields that could not be read or decoded stay `None` (or at their
/// documented default); a snapshot never holds partially decoded values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecordSnapshot {
    /// Subscriber identity, 6 to 15 digits.
    pub subscriber_id: Option<String>,
    pub card_serial: Option<String>,
    pub own_number: Option<DialingNumber>,
    pub voicemail_number: Option<DialingNumber>,
    pub voicemail_fixed_by_operator: bool,
    /// `-1` = waiting with unknown count, `0` = none, `1..=255` = count.
    pub voicemail_message_count: i32,
    pub call_forwarding_enabled: bool,
    pub provider_display_name: Option<String>,
    /// `-1` when no provider-name record with a condition byte was found.
    pub display_condition: i32,
    /// Operator codes treated as home for display purposes.
    pub equivalent_networks: Vec<String>,
    pub operator_long_name: Option<String>,
    pub operator_short_name: Option<String>,
    /// `0` = undetermined.
    pub mnc_length: u8,
    /// MCC + MNC of the issuing operator, derived once loading converges.
    pub home_operator: Option<String>,
    /// ISO 3166 country of the issuing operator, derived with `home_operator`.
    pub iso_country: Option<String>,
    /// Whether the manual network-selection menu is allowed.
    pub operator_menu_enabled: bool,
}

impl Default for CardRecordSnapshot {
    fn default() -> Self {
        Self {
            subscriber_id: None,
            card_serial: None,
            own_number: None,
            voicemail_number: None,
            voicemail_fixed_by_operator: false,
            voicemail_message_count: 0,
            call_forwarding_enabled: false,
            provider_display_name: None,
            display_condition: -1,
            equivalent_networks: Vec::new(),
            operator_long_name: None,
            operator_short_name: None,
            mnc_length: 0,
            home_operator: None,
            iso_country: None,
            operator_menu_enabled: true,
        }
    }
}

impl CardRecordSnapshot {
    /// True if any voice message is waiting (count known or not).
    pub fn message_waiting(&self) -> bool {
        self.voicemail_message_count != 0
    }

    /// Whether `operator` is the home network or one of the equivalent networks.
    pub fn is_home_network(&self, operator: &str) -> bool {
        if self.home_operator.as_deref() == Some(operator) {
            return true;
        }
        self.equivalent_networks.iter().any(|net| net == operator)
    }

    /// Decide which names to display while registered on `registered_operator`.
    ///
    /// Without a provider name (or without a condition byte) only the network
    /// name is shown.
    pub fn display_rule(&self, registered_operator: Option<&str>) -> DisplayRule {
        if self.provider_display_name.is_none() || self.display_condition == -1 {
            return DisplayRule {
                show_provider_name: false,
                show_network_name: true,
            };
        }

        let on_home = registered_operator
            .map(|op| self.is_home_network(op))
            .unwrap_or(false);

        if on_home {
            DisplayRule {
                show_provider_name: true,
                show_network_name: self.display_condition & CONDITION_NETWORK_NAME_ON_HOME != 0,
            }
        } else {
            DisplayRule {
                show_provider_name: self.display_condition & CONDITION_HIDE_PROVIDER_ROAMING == 0,
                show_network_name: true,
            }
        }
    }
}
