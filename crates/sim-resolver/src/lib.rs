//! Fallback resolvers.
//!
//! Several card fields live in more than one file, written by different
//! generations of the standards. Each resolver here is an explicit state
//! machine that consumes read outcomes and emits effects: further reads to
//! issue, and values to publish. Resolvers never touch the transport or the
//! pending-request ledger; the orchestrator submits and counts every read
//! they ask for.
//!
//! - [`spn`]: service provider name (`EF_SPN`, then the two CPHS formats)
//! - [`network_name`]: operator name from `EF_PNN` / `EF_OPL`
//! - [`mailbox`]: voicemail number (`EF_MBI` + `EF_MBDN`, then CPHS mailbox)

pub mod mailbox;
pub mod network_name;
pub mod spn;

pub use mailbox::{MailboxEffect, MailboxState, WritePlanError, WriteTarget};
pub use network_name::{NameAlgorithm, NetworkNameEffect, NetworkNameResolver, NetworkNameState};
pub use spn::{SpnEffect, SpnState};

use sim_transport::TransportError;

/// Outcome of a read as seen by a resolver.
pub type ReadOutcome<'a> = Result<&'a [u8], TransportError>;

/// Result of feeding one event to a state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition<S, E> {
    pub state: S,
    pub effects: Vec<E>,
}

impl<S, E> Transition<S, E> {
    pub fn to(state: S) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    pub fn with(state: S, effects: Vec<E>) -> Self {
        Self { state, effects }
    }
}
