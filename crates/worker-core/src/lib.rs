//! Shared skeleton for the Channel Workers (C4): tenant verification,
//! idempotency, failure classification, and the terminal status update that
//! every channel (email, WhatsApp) performs identically. The provider call
//! itself and any channel-specific sequencing (WhatsApp's session mutex) are
//! the only parts that differ between the two worker binaries.

mod classify;
mod handler;
mod provider;

pub use classify::{bounded_redacted_message, classify, ProviderFailure};
pub use handler::{handle_envelope, HandleOutcome};
pub use provider::{ProviderClient, ProviderSuccess};
