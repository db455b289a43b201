//! Network operator name resolution.
//!
//! Two algorithms exist and a card image supports one or the other, so the
//! choice is made once when the resolver is built:
//!
//! - [`NameAlgorithm::NameList`] reads `EF_PNN` record 1 and takes the first
//!   full-name (`0x43`) and short-name (`0x45`) elements.
//! - [`NameAlgorithm::OperatorList`] scans `EF_OPL` one record at a time for
//!   an entry covering the registered operator and location area, then reads
//!   the `EF_PNN` record it points to. Without a registration the scan waits.
//!
//! `EF_OPL` record layout:
//!
//! ```text
//! 0..3  PLMN (BCD triplet)
//! 3..5  location area range start (big-endian)
//! 5..7  location area range end (big-endian)
//! 7     EF_PNN record number (1..=0xFE)
//! ```

use crate::{ReadOutcome, Transition};
use sim_codec::{decode_length_prefixed_alpha, decode_network_name, decode_plmn, DecodeError, TlvIter};
use sim_records_types::{FileId, RegistrationContext};
use sim_transport::CardRequest;
use tracing::{debug, trace};

const TAG_FULL_NAME: u8 = 0x43;
const TAG_SHORT_NAME: u8 = 0x45;
const OPL_RECORD_LEN: usize = 8;

/// Default upper bound for the operator-list scan (the record number range of
/// a linear fixed file).
pub const DEFAULT_MAX_OPERATOR_RECORDS: u8 = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameAlgorithm {
    /// Standard name list (`EF_PNN` elements).
    #[default]
    NameList,
    /// Operator list (`EF_OPL`) matched against the registration.
    OperatorList,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NetworkNameState {
    #[default]
    Init,
    ReadingNameList,
    AwaitingRegistration,
    ScanningOperatorList {
        record: u8,
        registration: RegistrationContext,
    },
    ReadingProviderName {
        operator_record: u8,
        registration: RegistrationContext,
    },
    /// Finished; remembers the registration the result was computed for.
    Idle {
        resolved_for: Option<RegistrationContext>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkNameEvent<'a> {
    Start,
    Registration(Option<RegistrationContext>),
    ReadDone(ReadOutcome<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkNameEffect {
    ClearNames,
    Read(CardRequest),
    Publish {
        long_name: String,
        short_name: Option<String>,
    },
}

/// Network-name resolver with its construction-time configuration and the
/// latest registration reported by the network side.
#[derive(Debug, Clone)]
pub struct NetworkNameResolver {
    algorithm: NameAlgorithm,
    max_records: u8,
    registration: Option<RegistrationContext>,
    state: NetworkNameState,
}

impl NetworkNameResolver {
    pub fn new(algorithm: NameAlgorithm, max_records: u8) -> Self {
        Self {
            algorithm,
            max_records: max_records.max(1),
            registration: None,
            state: NetworkNameState::Init,
        }
    }

    pub fn algorithm(&self) -> NameAlgorithm {
        self.algorithm
    }

    pub fn state(&self) -> &NetworkNameState {
        &self.state
    }

    /// Back to `Init`. The registration is network state and survives.
    pub fn reset(&mut self) {
        self.state = NetworkNameState::Init;
    }

    pub fn handle(&mut self, event: NetworkNameEvent<'_>) -> Vec<NetworkNameEffect> {
        if let NetworkNameEvent::Registration(registration) = &event {
            self.registration = registration.clone().filter(RegistrationContext::is_usable);
        }
        let state = std::mem::take(&mut self.state);
        let transition = self.step(state, event);
        self.state = transition.state;
        transition.effects
    }

    fn step(
        &self,
        state: NetworkNameState,
        event: NetworkNameEvent<'_>,
    ) -> Transition<NetworkNameState, NetworkNameEffect> {
        use NetworkNameState::*;

        match (state, event) {
            (_, NetworkNameEvent::Start) => {
                let mut transition = self.begin();
                transition.effects.insert(0, NetworkNameEffect::ClearNames);
                transition
            }

            // Before the first start only the stored registration changes.
            (Init, NetworkNameEvent::Registration(_)) => Transition::to(Init),

            (AwaitingRegistration, NetworkNameEvent::Registration(_)) => self.begin(),

            (Idle { resolved_for }, NetworkNameEvent::Registration(_)) => {
                if self.algorithm == NameAlgorithm::OperatorList
                    && self.registration.is_some()
                    && self.registration != resolved_for
                {
                    let mut transition = self.begin();
                    transition.effects.insert(0, NetworkNameEffect::ClearNames);
                    transition
                } else {
                    Transition::to(Idle { resolved_for })
                }
            }

            // A read is in flight; its reply notices the new registration.
            (state, NetworkNameEvent::Registration(_)) => Transition::to(state),

            (ReadingNameList, NetworkNameEvent::ReadDone(outcome)) => {
                let effects = match outcome {
                    Ok(data) => name_list_effects(data),
                    Err(err) => {
                        debug!(error = %err, "EF_PNN read failed");
                        Vec::new()
                    }
                };
                Transition::with(Idle { resolved_for: None }, effects)
            }

            (ScanningOperatorList { record, registration }, NetworkNameEvent::ReadDone(outcome)) => {
                if self.registration.as_ref() != Some(&registration) {
                    return self.begin();
                }
                let data = match outcome {
                    Ok(data) => data,
                    Err(err) => {
                        debug!(record, error = %err, "EF_OPL scan ended");
                        return Transition::to(Idle {
                            resolved_for: Some(registration),
                        });
                    }
                };
                match match_operator_record(data, &registration) {
                    Ok(Some(pnn_record)) => {
                        trace!(record, pnn_record, "EF_OPL record matches registration");
                        Transition::with(
                            ReadingProviderName {
                                operator_record: record,
                                registration,
                            },
                            vec![NetworkNameEffect::Read(CardRequest::read_record(
                                FileId::PNN,
                                pnn_record,
                            ))],
                        )
                    }
                    Ok(None) => self.next_operator_record(record, registration),
                    Err(err) => {
                        debug!(record, error = %err, "EF_OPL record not decodable");
                        self.next_operator_record(record, registration)
                    }
                }
            }

            (
                ReadingProviderName {
                    operator_record,
                    registration,
                },
                NetworkNameEvent::ReadDone(outcome),
            ) => {
                if self.registration.as_ref() != Some(&registration) {
                    return self.begin();
                }
                let data = match outcome {
                    Ok(data) => data,
                    Err(err) => {
                        debug!(error = %err, "EF_PNN read failed");
                        return Transition::to(Idle {
                            resolved_for: Some(registration),
                        });
                    }
                };
                match decode_provider_name_record(data) {
                    Ok((long_name, short_name)) => Transition::with(
                        Idle {
                            resolved_for: Some(registration),
                        },
                        vec![NetworkNameEffect::Publish {
                            long_name,
                            short_name,
                        }],
                    ),
                    Err(err) => {
                        debug!(operator_record, error = %err, "EF_PNN record not decodable");
                        self.next_operator_record(operator_record, registration)
                    }
                }
            }

            (state @ (Init | AwaitingRegistration | Idle { .. }), NetworkNameEvent::ReadDone(_)) => {
                debug!(?state, "network name reply outside a lookup ignored");
                Transition::to(state)
            }
        }
    }

    /// First read of a lookup, or the wait for a registration.
    fn begin(&self) -> Transition<NetworkNameState, NetworkNameEffect> {
        match self.algorithm {
            NameAlgorithm::NameList => Transition::with(
                NetworkNameState::ReadingNameList,
                vec![NetworkNameEffect::Read(CardRequest::read_record(FileId::PNN, 1))],
            ),
            NameAlgorithm::OperatorList => match &self.registration {
                Some(registration) => Transition::with(
                    NetworkNameState::ScanningOperatorList {
                        record: 1,
                        registration: registration.clone(),
                    },
                    vec![NetworkNameEffect::Read(CardRequest::read_record(FileId::OPL, 1))],
                ),
                None => Transition::to(NetworkNameState::AwaitingRegistration),
            },
        }
    }

    fn next_operator_record(
        &self,
        record: u8,
        registration: RegistrationContext,
    ) -> Transition<NetworkNameState, NetworkNameEffect> {
        if record >= self.max_records {
            debug!(record, "EF_OPL exhausted without a match");
            return Transition::to(NetworkNameState::Idle {
                resolved_for: Some(registration),
            });
        }
        let next = record + 1;
        Transition::with(
            NetworkNameState::ScanningOperatorList {
                record: next,
                registration,
            },
            vec![NetworkNameEffect::Read(CardRequest::read_record(FileId::OPL, next))],
        )
    }
}

fn name_list_effects(data: &[u8]) -> Vec<NetworkNameEffect> {
    let elements = TlvIter::new(data);
    let long_name = elements
        .clone()
        .find_tag(TAG_FULL_NAME)
        .and_then(|obj| match decode_network_name(obj.data) {
            Ok(name) => Some(name),
            Err(err) => {
                debug!(error = %err, "full network name not decodable");
                None
            }
        });
    let Some(long_name) = long_name else {
        return Vec::new();
    };
    let short_name = elements
        .find_tag(TAG_SHORT_NAME)
        .and_then(|obj| decode_network_name(obj.data).ok());
    vec![NetworkNameEffect::Publish {
        long_name,
        short_name,
    }]
}

/// `EF_PNN` record number for `registration`, if this `EF_OPL` record covers it.
pub fn match_operator_record(
    record: &[u8],
    registration: &RegistrationContext,
) -> Result<Option<u8>, DecodeError> {
    if record.len() < OPL_RECORD_LEN {
        return Err(DecodeError::Truncated {
            needed: OPL_RECORD_LEN,
            available: record.len(),
        });
    }
    let plmn = decode_plmn(&[record[0], record[1], record[2]])?;
    let lo = u16::from_be_bytes([record[3], record[4]]);
    let hi = u16::from_be_bytes([record[5], record[6]]);
    let pnn_record = record[7];

    let covers = plmn == registration.operator
        && (lo..=hi).contains(&registration.location_area)
        && (1..=0xFE).contains(&pnn_record);
    Ok(covers.then_some(pnn_record))
}

/// Long and optional short name from an `EF_PNN` record addressed by `EF_OPL`:
/// tag, length-prefixed long name, then an optional tag and length-prefixed
/// short name.
pub fn decode_provider_name_record(record: &[u8]) -> Result<(String, Option<String>), DecodeError> {
    let (long_name, next) = decode_length_prefixed_alpha(record, 1)?;
    if long_name.is_empty() {
        return Err(DecodeError::Empty);
    }
    let short_name = match record.get(next) {
        Some(&tag) if tag != 0xFF => decode_length_prefixed_alpha(record, next + 1)
            .ok()
            .map(|(name, _)| name)
            .filter(|name| !name.is_empty()),
        _ => None,
    };
    Ok((long_name, short_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_transport::TransportError;

    fn registration() -> RegistrationContext {
        RegistrationContext::new("310260", 0x0150)
    }

    fn opl(plmn: [u8; 3], lo: u16, hi: u16, pnn: u8) -> Vec<u8> {
        let mut record = plmn.to_vec();
        record.extend(lo.to_be_bytes());
        record.extend(hi.to_be_bytes());
        record.push(pnn);
        record
    }

    fn read_target(effects: &[NetworkNameEffect]) -> Option<(FileId, u8)> {
        effects.iter().find_map(|e| match e {
            NetworkNameEffect::Read(CardRequest::ReadLinearFixed { file, record }) => {
                Some((*file, *record))
            }
            _ => None,
        })
    }

    #[test]
    fn test_name_list_first_full_name_wins() {
        let mut resolver = NetworkNameResolver::new(NameAlgorithm::NameList, 254);
        let effects = resolver.handle(NetworkNameEvent::Start);
        assert_eq!(effects[0], NetworkNameEffect::ClearNames);
        assert_eq!(read_target(&effects), Some((FileId::PNN, 1)));

        let pnn = [
            0x43, 0x04, 0x83, 0x41, 0xE1, 0x10, 0x45, 0x02, 0x81, 0x41, 0x43, 0x02, 0x80, 0x5A,
            0xFF,
        ];
        let effects = resolver.handle(NetworkNameEvent::ReadDone(Ok(&pnn)));
        assert_eq!(
            effects,
            vec![NetworkNameEffect::Publish {
                long_name: "ABC".to_string(),
                short_name: Some("A".to_string()),
            }]
        );
        assert_eq!(resolver.state(), &NetworkNameState::Idle { resolved_for: None });
    }

    #[test]
    fn test_name_list_without_full_name() {
        let mut resolver = NetworkNameResolver::new(NameAlgorithm::NameList, 254);
        resolver.handle(NetworkNameEvent::Start);
        let effects = resolver.handle(NetworkNameEvent::ReadDone(Ok(&[0x45, 0x01, 0x80, 0xFF])));
        assert!(effects.is_empty());
        assert!(matches!(resolver.state(), NetworkNameState::Idle { .. }));
    }

    #[test]
    fn test_operator_list_defers_until_registration() {
        let mut resolver = NetworkNameResolver::new(NameAlgorithm::OperatorList, 254);
        let effects = resolver.handle(NetworkNameEvent::Start);
        assert_eq!(effects, vec![NetworkNameEffect::ClearNames]);
        assert_eq!(resolver.state(), &NetworkNameState::AwaitingRegistration);

        let effects = resolver.handle(NetworkNameEvent::Registration(None));
        assert!(effects.is_empty());
        assert_eq!(resolver.state(), &NetworkNameState::AwaitingRegistration);

        let effects = resolver.handle(NetworkNameEvent::Registration(Some(registration())));
        assert_eq!(read_target(&effects), Some((FileId::OPL, 1)));
    }

    #[test]
    fn test_operator_list_scans_until_match() {
        let mut resolver = NetworkNameResolver::new(NameAlgorithm::OperatorList, 254);
        resolver.handle(NetworkNameEvent::Registration(Some(registration())));
        resolver.handle(NetworkNameEvent::Start);

        // other operator
        let effects = resolver.handle(NetworkNameEvent::ReadDone(Ok(&opl(
            [0x32, 0xF4, 0x51],
            0,
            0xFFFE,
            1,
        ))));
        assert_eq!(read_target(&effects), Some((FileId::OPL, 2)));

        // corrupt record
        let effects = resolver.handle(NetworkNameEvent::ReadDone(Ok(&[0x13, 0x00])));
        assert_eq!(read_target(&effects), Some((FileId::OPL, 3)));

        // location area outside the range
        let effects = resolver.handle(NetworkNameEvent::ReadDone(Ok(&opl(
            [0x13, 0x00, 0x62],
            0x0200,
            0x0300,
            2,
        ))));
        assert_eq!(read_target(&effects), Some((FileId::OPL, 4)));

        let effects = resolver.handle(NetworkNameEvent::ReadDone(Ok(&opl(
            [0x13, 0x00, 0x62],
            0x0100,
            0x0200,
            3,
        ))));
        assert_eq!(read_target(&effects), Some((FileId::PNN, 3)));

        let pnn = [0x43, 0x03, 0x54, 0x65, 0x6C, 0x45, 0x01, 0x54, 0xFF];
        let effects = resolver.handle(NetworkNameEvent::ReadDone(Ok(&pnn)));
        assert_eq!(
            effects,
            vec![NetworkNameEffect::Publish {
                long_name: "Tel".to_string(),
                short_name: Some("T".to_string()),
            }]
        );
    }

    #[test]
    fn test_operator_list_read_error_leaves_name_unset() {
        let mut resolver = NetworkNameResolver::new(NameAlgorithm::OperatorList, 254);
        resolver.handle(NetworkNameEvent::Registration(Some(registration())));
        resolver.handle(NetworkNameEvent::Start);
        let effects = resolver.handle(NetworkNameEvent::ReadDone(Err(
            TransportError::RecordOutOfRange {
                file: FileId::OPL,
                record: 1,
            },
        )));
        assert!(effects.is_empty());
        assert_eq!(
            resolver.state(),
            &NetworkNameState::Idle {
                resolved_for: Some(registration())
            }
        );
    }

    #[test]
    fn test_operator_list_stops_at_max_records() {
        let mut resolver = NetworkNameResolver::new(NameAlgorithm::OperatorList, 2);
        resolver.handle(NetworkNameEvent::Registration(Some(registration())));
        resolver.handle(NetworkNameEvent::Start);
        let miss = opl([0x32, 0xF4, 0x51], 0, 0xFFFE, 1);
        let effects = resolver.handle(NetworkNameEvent::ReadDone(Ok(&miss)));
        assert_eq!(read_target(&effects), Some((FileId::OPL, 2)));
        let effects = resolver.handle(NetworkNameEvent::ReadDone(Ok(&miss)));
        assert!(effects.is_empty());
        assert!(matches!(resolver.state(), NetworkNameState::Idle { .. }));
    }

    #[test]
    fn test_registration_change_restarts_scan() {
        let mut resolver = NetworkNameResolver::new(NameAlgorithm::OperatorList, 254);
        resolver.handle(NetworkNameEvent::Registration(Some(registration())));
        resolver.handle(NetworkNameEvent::Start);

        // moved while record 1 is in flight: the reply is discarded
        let moved = RegistrationContext::new("310260", 0x0999);
        assert!(resolver
            .handle(NetworkNameEvent::Registration(Some(moved.clone())))
            .is_empty());
        let effects = resolver.handle(NetworkNameEvent::ReadDone(Ok(&opl(
            [0x13, 0x00, 0x62],
            0x0100,
            0x0200,
            3,
        ))));
        assert_eq!(read_target(&effects), Some((FileId::OPL, 1)));
        assert!(matches!(
            resolver.state(),
            NetworkNameState::ScanningOperatorList { registration, .. } if registration == &moved
        ));

        // finished, then moved again: a fresh scan
        resolver.handle(NetworkNameEvent::ReadDone(Err(TransportError::CardRemoved)));
        let effects = resolver.handle(NetworkNameEvent::Registration(Some(registration())));
        assert_eq!(effects[0], NetworkNameEffect::ClearNames);
        assert_eq!(read_target(&effects), Some((FileId::OPL, 1)));

        // same registration again after finishing: nothing to do
        resolver.handle(NetworkNameEvent::ReadDone(Err(TransportError::CardRemoved)));
        assert!(resolver
            .handle(NetworkNameEvent::Registration(Some(registration())))
            .is_empty());
    }

    #[test]
    fn test_provider_name_record_without_short_name() {
        let (long, short) = decode_provider_name_record(&[0x43, 0x02, 0x41, 0x42, 0xFF]).unwrap();
        assert_eq!(long, "AB");
        assert_eq!(short, None);
        assert!(decode_provider_name_record(&[0x43, 0x09, 0x41]).is_err());
        assert!(decode_provider_name_record(&[0x43, 0x00]).is_err());
    }
}
