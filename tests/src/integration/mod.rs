//! Integration scenarios.

pub mod fixtures;

mod dispatch_flows;
mod event_flows;
mod node_flows;
