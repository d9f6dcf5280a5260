//! # Shared Types Crate
//!
//! Wire-level types shared by every part of the dispatch gateway.
//!
//! ## Design Principles
//!
//! - **Closed action set**: an inbound [`Envelope`] decodes into exactly one
//!   known action or fails with [`DispatchError::UnknownAction`].
//! - **Validate at the boundary**: payload fields are checked once, before
//!   any network call is attempted.
//! - **Lossless events**: an [`EventMessage`] survives a byte round-trip
//!   with every field intact.

pub mod envelope;
pub mod errors;
pub mod event;
pub mod response;

pub use envelope::{ActionKind, AuthPayload, Envelope, LogPayload, MailPayload};
pub use errors::DispatchError;
pub use event::{EventMessage, LogLevel};
pub use response::ResponseBody;
