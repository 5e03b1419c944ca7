//! # Endorsement Policy Evaluation
//!
//! A pure, single-pass function of the policy and the validated response
//! set: no hidden state, no retries. Calling it twice with identical inputs
//! yields identical results.

use crate::domain::{
    EndorsementPolicy, MiddlewareError, PolicyRule, PolicySubject, ProposalResponse,
};

/// Evaluate `policy` against validated proposal responses.
///
/// Each identity slot in the policy is satisfied iff some response carries an
/// endorsement whose (role, membership id) pair matches it; a response can
/// satisfy at most one slot. The rule's `signed-by` subjects are then counted
/// against the threshold.
///
/// An empty identity list auto-satisfies (accept-all) and returns the whole
/// input set as valid.
///
/// On failure the error names every required signer role that had no matching
/// valid response.
pub fn evaluate<'a>(
    policy: &EndorsementPolicy,
    responses: &'a [&'a ProposalResponse],
) -> Result<Vec<&'a ProposalResponse>, MiddlewareError> {
    if policy.is_accept_all() {
        return Ok(responses.to_vec());
    }

    // Assign responses to identity slots, one response per slot.
    let mut slots: Vec<Option<&ProposalResponse>> = vec![None; policy.identities.len()];
    for response in responses {
        let Some(endorsement) = &response.endorsement else {
            continue;
        };
        for (index, principal) in policy.identities.iter().enumerate() {
            if slots[index].is_none()
                && principal.msp_id == endorsement.msp_id
                && principal.role == endorsement.role
            {
                slots[index] = Some(response);
                break;
            }
        }
    }

    let PolicyRule::NOutOf { n, subjects } = &policy.rule;

    let mut valid = Vec::new();
    let mut missing = Vec::new();
    for subject in subjects {
        let PolicySubject::SignedBy(index) = subject;
        match slots.get(*index).copied().flatten() {
            Some(response) => valid.push(response),
            None => {
                if let Some(principal) = policy.identities.get(*index) {
                    missing.push(principal.label());
                }
            }
        }
    }

    if valid.len() >= *n {
        Ok(valid)
    } else {
        Err(MiddlewareError::PolicyViolation { missing })
    }
}
