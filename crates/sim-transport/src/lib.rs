//! Card transport boundary.
//!
//! The engine never touches the card directly. It hands a [`CardRequest`]
//! and a [`RequestTag`] to a [`CardTransport`], and the transport later
//! delivers exactly one [`TransportReply`] for that tag through the shared
//! [`ReplySink`].
//!
//! This crate provides:
//! - [`request`]: request kinds and generation-stamped tags
//! - [`reply`]: reply payloads, the dispatch channel and the transport trait
//! - [`simulated`]: an in-memory card with held/out-of-order delivery
//! - [`image`]: JSON card images loaded into the simulated card

pub mod error;
pub mod image;
pub mod reply;
pub mod request;
pub mod simulated;

pub use error::TransportError;
pub use image::{CardImage, ImageError};
pub use reply::{CardTransport, ReplyPayload, ReplySink, TransportReply};
pub use request::{CardRequest, RequestTag};
pub use simulated::{CardFile, DeliveryMode, SimulatedCard, SimulatedCardBuilder};
