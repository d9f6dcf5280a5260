//! # Dispatch Gateway Test Suite
//!
//! Cross-crate scenarios that need more than one component running.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs        # stub downstreams, wiring helpers
//!     ├── dispatch_flows.rs  # router → HTTP / RPC downstreams
//!     ├── event_flows.rs     # router → channel → consumer → log store
//!     └── node_flows.rs      # the assembled runtime over HTTP
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p gateway-tests
//! cargo test -p gateway-tests integration::event_flows::
//! ```

#![allow(dead_code)]

pub mod integration;
