//! # Integration Tests
//!
//! Cross-component orchestration scenarios over the mock collaborators.

pub mod channel_lifecycle;
pub mod transaction_flows;
