//! # Endorsement Response Checks
//!
//! Pure helpers over a collected proposal-response set: status
//! classification and read/write-set agreement. Signature verification is a
//! collaborator capability and happens in the coordinator before these checks
//! see the responses.

use crate::domain::{MiddlewareError, ProposalResponse};

/// Split a response set into good and bad entries by reported status.
///
/// Unreachable peers appear as synthesized bad entries, so
/// `good.len() + bad.len()` always equals the number of targeted peers.
pub fn split_by_status(
    responses: &[ProposalResponse],
) -> (Vec<&ProposalResponse>, Vec<&ProposalResponse>) {
    let mut good = Vec::new();
    let mut bad = Vec::new();
    for response in responses {
        if response.is_success() {
            good.push(response);
        } else {
            bad.push(response);
        }
    }
    (good, bad)
}

/// Human-readable summary of which peers failed and how.
pub fn bad_detail(bad: &[&ProposalResponse]) -> String {
    bad.iter()
        .map(|r| format!("{} ({}): status {} {}", r.peer, r.org, r.status, r.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Verify that every good response simulated the same read/write footprint.
///
/// Divergence across otherwise-valid responses means the chaincode executed
/// non-deterministically; the responses cannot be assembled into one
/// transaction. This is a distinct failure from a node-reported error.
pub fn check_matching_read_write_sets(
    good: &[&ProposalResponse],
) -> Result<(), MiddlewareError> {
    let Some(first) = good.first() else {
        return Ok(());
    };
    if good
        .iter()
        .all(|r| r.read_write_set == first.read_write_set)
    {
        Ok(())
    } else {
        Err(MiddlewareError::ResponseMismatch)
    }
}
