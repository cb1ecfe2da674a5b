//! Event bus and outbound delivery for parse-quality assurance.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PqaEvent`]: the event envelope (completed runs, operational alerts,
//!   remediation outcomes).
//! - [`delivery`]: the ticket collaborator client and its retry loop.

pub mod bus;
pub mod delivery;

pub use bus::{EventBus, PqaEvent};
pub use delivery::ticket::{dispatch_with_retry, HttpTicketService, TicketError, TicketService};
