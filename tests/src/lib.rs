//! # Trade-Network Middleware Test Suite
//!
//! Unified test crate containing cross-component integration flows:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Four-org network fixture over the mock ports
//! └── integration/      # Cross-component orchestration scenarios
//!     ├── transaction_flows.rs   # invoke/query endorsement + commit paths
//!     └── channel_lifecycle.rs   # create/update/join/install/instantiate
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p tn-tests
//!
//! # By category
//! cargo test -p tn-tests integration::transaction_flows::
//! cargo test -p tn-tests integration::channel_lifecycle::
//! ```

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
