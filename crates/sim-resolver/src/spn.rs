//! Service provider name resolution.
//!
//! Sources are tried in order until one yields a non-empty name:
//!
//! 1. `EF_SPN`: display-condition byte, then the name window from offset 1
//! 2. `EF_SPN_CPHS`: name window from offset 0
//! 3. `EF_SPN_SHORT_CPHS`: name window from offset 0
//!
//! Falling back from the first source resets the display condition to
//! unknown, since only `EF_SPN` carries one.

use crate::{ReadOutcome, Transition};
use sim_codec::decode_alpha;
use sim_records_types::FileId;
use sim_transport::CardRequest;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpnState {
    #[default]
    Init,
    TryPrimaryFormat,
    TryLegacyFormat,
    TryLegacyShortFormat,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpnEvent<'a> {
    Start,
    ReadDone(ReadOutcome<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpnEffect {
    ClearName,
    Read(CardRequest),
    ResetDisplayCondition,
    Publish {
        name: String,
        /// Present only for the primary format.
        display_condition: Option<i32>,
    },
}

/// Advance the resolver by one event.
pub fn step(state: SpnState, event: SpnEvent<'_>) -> Transition<SpnState, SpnEffect> {
    use SpnState::*;

    match (state, event) {
        (_, SpnEvent::Start) => Transition::with(
            TryPrimaryFormat,
            vec![SpnEffect::ClearName, SpnEffect::Read(CardRequest::read(FileId::SPN))],
        ),

        (TryPrimaryFormat, SpnEvent::ReadDone(outcome)) => match decode_primary(outcome) {
            Some((display_condition, name)) => Transition::with(
                Idle,
                vec![SpnEffect::Publish {
                    name,
                    display_condition: Some(display_condition),
                }],
            ),
            None => Transition::with(
                TryLegacyFormat,
                vec![
                    SpnEffect::Read(CardRequest::read(FileId::SPN_CPHS)),
                    SpnEffect::ResetDisplayCondition,
                ],
            ),
        },

        (TryLegacyFormat, SpnEvent::ReadDone(outcome)) => match decode_legacy(outcome) {
            Some(name) => Transition::with(Idle, vec![publish_legacy(name)]),
            None => Transition::with(
                TryLegacyShortFormat,
                vec![SpnEffect::Read(CardRequest::read(FileId::SPN_SHORT_CPHS))],
            ),
        },

        (TryLegacyShortFormat, SpnEvent::ReadDone(outcome)) => match decode_legacy(outcome) {
            Some(name) => Transition::with(Idle, vec![publish_legacy(name)]),
            None => Transition::to(Idle),
        },

        (state @ (Init | Idle), SpnEvent::ReadDone(_)) => {
            debug!(?state, "provider name reply outside a lookup ignored");
            Transition::to(state)
        }
    }
}

fn publish_legacy(name: String) -> SpnEffect {
    SpnEffect::Publish {
        name,
        display_condition: None,
    }
}

fn decode_primary(outcome: ReadOutcome<'_>) -> Option<(i32, String)> {
    let data = outcome.ok()?;
    let (&condition, window) = data.split_first()?;
    match decode_alpha(window) {
        Ok(name) if !name.is_empty() => Some((condition as i32, name)),
        Ok(_) => None,
        Err(err) => {
            debug!(error = %err, "EF_SPN name not decodable");
            None
        }
    }
}

fn decode_legacy(outcome: ReadOutcome<'_>) -> Option<String> {
    let data = outcome.ok()?;
    match decode_alpha(data) {
        Ok(name) if !name.is_empty() => Some(name),
        Ok(_) => None,
        Err(err) => {
            debug!(error = %err, "CPHS provider name not decodable");
            None
        }
    }
}
