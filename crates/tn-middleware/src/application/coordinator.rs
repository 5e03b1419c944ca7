//! # Endorsement Coordinator
//!
//! Fans a signed proposal out to every target peer concurrently, awaits all
//! responses (no early exit on first failure), and verifies each response's
//! endorsement signature against the peer's known membership id.
//!
//! The full collected set is always returned, bad entries included, so the
//! caller can apply a policy that tolerates a failed subset.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{
    Block, MiddlewareError, PeerTarget, ProposalResponse, SignedProposal, TransactionId,
};
use crate::ports::outbound::{PeerGateway, SignatureVerifier};

/// Outcome of one proposal fan-out: every targeted peer has an entry.
#[derive(Debug)]
pub struct ProposalResultSet {
    /// All collected responses, aligned with the target list.
    pub responses: Vec<ProposalResponse>,
    /// For each response, whether it is good (success status and a verified
    /// endorsement signature).
    pub verified: Vec<bool>,
}

impl ProposalResultSet {
    /// References to the good responses.
    pub fn good(&self) -> Vec<&ProposalResponse> {
        self.responses
            .iter()
            .zip(&self.verified)
            .filter_map(|(response, ok)| ok.then_some(response))
            .collect()
    }

    /// Number of bad entries (failed status, invalid signature, unreachable).
    pub fn bad_count(&self) -> usize {
        self.verified.iter().filter(|ok| !**ok).count()
    }

    /// True iff every targeted peer produced a good response.
    pub fn all_good(&self) -> bool {
        self.bad_count() == 0
    }

    /// Per-peer summary of the bad entries.
    pub fn bad_detail(&self) -> String {
        self.responses
            .iter()
            .zip(&self.verified)
            .filter(|(_, ok)| !**ok)
            .map(|(r, _)| format!("{} ({}): status {} {}", r.peer, r.org, r.status, r.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// An [`MiddlewareError::Endorsement`] describing the bad subset.
    pub fn endorsement_error(&self) -> MiddlewareError {
        MiddlewareError::Endorsement {
            bad: self.bad_count(),
            total: self.responses.len(),
            detail: self.bad_detail(),
        }
    }
}

/// Coordinates proposal fan-out and response verification over the peer
/// gateway and the signature-verification capability.
pub struct EndorsementCoordinator<G, V> {
    gateway: Arc<G>,
    verifier: Arc<V>,
}

impl<G, V> EndorsementCoordinator<G, V>
where
    G: PeerGateway,
    V: SignatureVerifier,
{
    /// Create a coordinator over the given gateway and verifier.
    pub fn new(gateway: Arc<G>, verifier: Arc<V>) -> Self {
        Self { gateway, verifier }
    }

    /// Send `proposal` to every target concurrently and collect one response
    /// per target.
    ///
    /// `targets` must be non-empty and `proposal.proposal.tx_id` must be
    /// fresh for this call. Unreachable peers are folded into synthesized bad
    /// entries rather than failing the fan-out.
    pub async fn propose(
        &self,
        targets: &[PeerTarget],
        proposal: &SignedProposal,
        timeout: Duration,
    ) -> Result<Vec<ProposalResponse>, MiddlewareError> {
        if targets.is_empty() {
            return Err(MiddlewareError::MissingField("targets"));
        }
        debug!(
            tx_id = %proposal.proposal.tx_id,
            targets = targets.len(),
            fcn = %proposal.proposal.fcn,
            "sending proposal to endorsing peers"
        );

        let sends = targets.iter().map(|target| async move {
            match self.gateway.process_proposal(target, proposal, timeout).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(peer = %target.name, org = %target.org, %err, "peer unreachable");
                    ProposalResponse::unreachable(&target.name, &target.org, &err.to_string())
                }
            }
        });
        Ok(join_all(sends).await)
    }

    /// Verify each response against its target's membership id.
    ///
    /// A response is good iff its status is success and its endorsement
    /// signature verifies against the responding peer's known identity.
    pub async fn verify(
        &self,
        targets: &[PeerTarget],
        responses: Vec<ProposalResponse>,
    ) -> ProposalResultSet {
        let mut verified = Vec::with_capacity(responses.len());
        for (target, response) in targets.iter().zip(&responses) {
            let good = response.is_success()
                && self
                    .verifier
                    .verify_endorsement(response, &target.msp_id)
                    .await;
            if !good {
                warn!(
                    peer = %response.peer,
                    org = %response.org,
                    status = response.status,
                    "proposal response was bad"
                );
            }
            verified.push(good);
        }
        ProposalResultSet {
            responses,
            verified,
        }
    }

    /// Fan out and verify in one step.
    pub async fn propose_and_verify(
        &self,
        targets: &[PeerTarget],
        proposal: &SignedProposal,
        timeout: Duration,
    ) -> Result<ProposalResultSet, MiddlewareError> {
        let responses = self.propose(targets, proposal, timeout).await?;
        Ok(self.verify(targets, responses).await)
    }

    /// Fan a channel-join request out to every target peer concurrently.
    ///
    /// Join responses are plain status acknowledgments, not endorsements, so
    /// there is no signature verification step; unreachable peers are folded
    /// into bad entries like everywhere else.
    pub async fn join(
        &self,
        targets: &[PeerTarget],
        genesis: &Block,
        tx_id: TransactionId,
    ) -> Result<Vec<ProposalResponse>, MiddlewareError> {
        if targets.is_empty() {
            return Err(MiddlewareError::MissingField("targets"));
        }
        let sends = targets.iter().map(|target| async move {
            match self.gateway.join_channel(target, genesis, tx_id).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(peer = %target.name, org = %target.org, %err, "peer unreachable");
                    ProposalResponse::unreachable(&target.name, &target.org, &err.to_string())
                }
            }
        });
        Ok(join_all(sends).await)
    }
}
