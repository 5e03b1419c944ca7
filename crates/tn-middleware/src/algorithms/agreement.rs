//! # Query Response Agreement
//!
//! Queries fan out to several peers and accept any single payload as the
//! answer, but only after checking that every responding peer returned the
//! same bytes. Divergence is a hard failure; no quorum or majority fallback
//! is attempted.

use crate::domain::{MiddlewareError, ProposalResponse};

/// Check that all responding peers returned an identical payload and return
/// it as a string.
///
/// An empty set means no peer produced a usable answer.
pub fn check_matching_payloads(
    responses: &[&ProposalResponse],
) -> Result<String, MiddlewareError> {
    let Some(first) = responses.first() else {
        return Err(MiddlewareError::Network(
            "failed to get response on query".to_string(),
        ));
    };
    if responses.iter().any(|r| r.payload != first.payload) {
        return Err(MiddlewareError::QueryMismatch);
    }
    Ok(String::from_utf8_lossy(&first.payload).into_owned())
}
