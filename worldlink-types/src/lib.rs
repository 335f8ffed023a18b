#![deny(missing_docs)]
//! Wire types shared between the relay broker and anything that speaks its
//! protocol: the envelope frame exchanged with worlds over the WebSocket, and
//! the credential/quota types the broker's pluggable auth adapter deals in.
//!
//! These types own no behavior beyond (de)serialization; the broker crate
//! gives them meaning.

pub mod credential;
pub mod envelope;

pub use credential::{AuthError, CredentialRecord, QuotaError};
pub use envelope::{Envelope, EnvelopeError, Operation};
