//! Shared types for the notification platform: the vocabulary every other
//! crate in the workspace builds on.

mod envelope;
mod error;
mod message;
mod site;

pub use envelope::{ClassifiedFailure, Classification, DlqRecord, MessageEnvelope};
pub use error::DomainError;
pub use message::{
    Channel, MessageFilters, MessageLog, MessageStatus, NewMessage, StatusHistoryEntry,
    StatusSource,
};
pub use site::{Site, SiteMetricsDaily, SiteStats};

pub type DomainResult<T> = Result<T, DomainError>;
