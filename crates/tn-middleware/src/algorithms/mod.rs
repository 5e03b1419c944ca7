//! # Algorithms
//!
//! Pure checks over collected proposal responses: status classification,
//! read/write-set agreement, policy evaluation, and query payload agreement.

pub mod agreement;
pub mod endorsement;
pub mod policy_eval;

pub use agreement::check_matching_payloads;
pub use endorsement::{bad_detail, check_matching_read_write_sets, split_by_status};
pub use policy_eval::evaluate;
