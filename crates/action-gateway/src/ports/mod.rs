//! Outbound ports.

pub mod outbound;
