//! Outbound delivery to external collaborators.

pub mod ticket;
