//! # Domain Entities
//!
//! Core data carried through the orchestration flows: proposals, endorsement
//! responses, assembled transactions, ordering acknowledgments, and the
//! events delivered by per-organization notification streams.
//!
//! A [`Proposal`] and its [`TransactionId`] are created at the start of an
//! operation and die with it; nothing here is persisted.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::policy::EndorsementPolicy;

/// Opaque, globally unique identifier for one logical transaction.
///
/// Generated once per operation and reused across proposal, submission, and
/// notification matching. Regenerating it mid-flow would break correlation
/// with the commit events, so there is no way to mutate one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Generate a fresh transaction identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Role an identity holds within its organization's membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityRole {
    /// Ordinary organization member.
    Member,
    /// Organization administrator (channel/config operations).
    Admin,
}

impl fmt::Display for IdentityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityRole::Member => write!(f, "member"),
            IdentityRole::Admin => write!(f, "admin"),
        }
    }
}

/// A resolved signing identity.
///
/// Owned by the identity provider; the key material itself never enters this
/// crate, only the handle needed to request signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Organization the identity belongs to.
    pub org: String,
    /// Membership service provider id of that organization.
    pub msp_id: String,
    /// Enrolled user name.
    pub user: String,
    /// Role of the user within the organization.
    pub role: IdentityRole,
}

/// An immutable chaincode proposal. One per logical invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Channel the proposal targets.
    pub channel: String,
    /// Chaincode identifier.
    pub chaincode_id: String,
    /// Chaincode version (deploy/upgrade flows).
    pub chaincode_version: String,
    /// Chaincode source path (install/deploy flows).
    pub chaincode_path: Option<String>,
    /// Function to invoke.
    pub fcn: String,
    /// Ordered argument list.
    pub args: Vec<String>,
    /// Transaction identifier, fresh for this proposal.
    pub tx_id: TransactionId,
    /// Endorsement policy attached to deploy/upgrade proposals.
    pub endorsement_policy: Option<EndorsementPolicy>,
}

impl Proposal {
    /// Build an invocation (or query) proposal.
    pub fn invocation(
        channel: &str,
        chaincode_id: &str,
        fcn: &str,
        args: Vec<String>,
        tx_id: TransactionId,
    ) -> Self {
        Self {
            channel: channel.to_string(),
            chaincode_id: chaincode_id.to_string(),
            chaincode_version: String::new(),
            chaincode_path: None,
            fcn: fcn.to_string(),
            args,
            tx_id,
            endorsement_policy: None,
        }
    }

    /// Build an instantiate/upgrade proposal carrying the endorsement policy.
    #[allow(clippy::too_many_arguments)]
    pub fn deployment(
        channel: &str,
        chaincode_id: &str,
        chaincode_path: &str,
        version: &str,
        fcn: &str,
        args: Vec<String>,
        tx_id: TransactionId,
        policy: EndorsementPolicy,
    ) -> Self {
        Self {
            channel: channel.to_string(),
            chaincode_id: chaincode_id.to_string(),
            chaincode_version: version.to_string(),
            chaincode_path: Some(chaincode_path.to_string()),
            fcn: fcn.to_string(),
            args,
            tx_id,
            endorsement_policy: Some(policy),
        }
    }

    /// Build an install proposal (source copy to peers, no policy).
    pub fn install(
        chaincode_id: &str,
        chaincode_path: &str,
        version: &str,
        tx_id: TransactionId,
    ) -> Self {
        Self {
            channel: String::new(),
            chaincode_id: chaincode_id.to_string(),
            chaincode_version: version.to_string(),
            chaincode_path: Some(chaincode_path.to_string()),
            fcn: String::new(),
            args: Vec::new(),
            tx_id,
            endorsement_policy: None,
        }
    }
}

/// A proposal together with the submitter's signature over it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedProposal {
    /// The proposal payload.
    pub proposal: Proposal,
    /// Membership id of the signing identity.
    pub creator_msp: String,
    /// Signature bytes produced by the identity provider.
    pub signature: Vec<u8>,
}

/// A peer's endorsement over its proposal response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endorsement {
    /// Membership id of the endorsing peer's organization.
    pub msp_id: String,
    /// Role under which the peer endorsed.
    pub role: IdentityRole,
    /// Endorsement signature bytes.
    pub signature: Vec<u8>,
}

/// Record of ledger keys read and written while simulating a proposal.
///
/// Used to detect non-deterministic execution: otherwise-valid responses
/// whose read/write sets differ cannot be assembled into one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadWriteSet {
    /// Keys read, with the state version observed.
    pub reads: Vec<(String, u64)>,
    /// Keys written, with the new value.
    pub writes: Vec<(String, String)>,
}

impl ReadWriteSet {
    /// A read/write set with a single write, handy in tests and mocks.
    pub fn single_write(key: &str, value: &str) -> Self {
        Self {
            reads: Vec::new(),
            writes: vec![(key.to_string(), value.to_string())],
        }
    }
}

/// Status code a peer returns with a proposal response. 200 is success.
pub const RESPONSE_STATUS_OK: u16 = 200;

/// One peer's response to a proposal.
///
/// Unreachable peers still produce an entry (see
/// [`ProposalResponse::unreachable`]) so the collected set always covers
/// every targeted peer and a tolerant policy can be applied to the remainder.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalResponse {
    /// Name of the responding peer.
    pub peer: String,
    /// Organization of the responding peer.
    pub org: String,
    /// Response status code; anything other than 200 is bad.
    pub status: u16,
    /// Human-readable status detail.
    pub message: String,
    /// Simulation result payload.
    pub payload: Vec<u8>,
    /// Endorsement signature; absent on failed responses.
    pub endorsement: Option<Endorsement>,
    /// Read/write footprint of the simulation; absent on failed responses.
    pub read_write_set: Option<ReadWriteSet>,
}

impl ProposalResponse {
    /// True iff the peer reported success.
    pub fn is_success(&self) -> bool {
        self.status == RESPONSE_STATUS_OK
    }

    /// Synthesize a bad entry for a peer that could not be reached.
    pub fn unreachable(peer: &str, org: &str, reason: &str) -> Self {
        Self {
            peer: peer.to_string(),
            org: org.to_string(),
            status: 500,
            message: format!("unreachable: {reason}"),
            payload: Vec::new(),
            endorsement: None,
            read_write_set: None,
        }
    }
}

/// An endorsed transaction ready for ordering.
///
/// Built only after policy evaluation succeeds; constructing one from an
/// under-endorsed response set is a caller contract violation.
#[derive(Debug, Clone)]
pub struct AssembledTransaction {
    /// The signed proposal the endorsements refer to.
    pub proposal: SignedProposal,
    /// The valid endorsement subset selected by policy evaluation.
    pub responses: Vec<ProposalResponse>,
}

impl AssembledTransaction {
    /// Transaction identifier, shared with the proposal.
    pub fn tx_id(&self) -> TransactionId {
        self.proposal.proposal.tx_id
    }
}

/// Terminal status of an ordering-service submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    /// Accepted into the sequencing pipeline (not yet committed).
    Success,
    /// Malformed or rejected request.
    BadRequest,
    /// The ordering service is not accepting transactions.
    ServiceUnavailable,
    /// Internal ordering-service failure.
    InternalError,
}

impl fmt::Display for SubmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitStatus::Success => write!(f, "SUCCESS"),
            SubmitStatus::BadRequest => write!(f, "BAD_REQUEST"),
            SubmitStatus::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
            SubmitStatus::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// Acknowledgment returned by the ordering service.
///
/// Acceptance only means the transaction entered the sequencing pipeline;
/// ledger commitment is confirmed separately by the commit notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitAck {
    /// Terminal submission status.
    pub status: SubmitStatus,
    /// Optional orderer-supplied detail.
    pub info: String,
}

impl SubmitAck {
    /// Successful acknowledgment.
    pub fn success() -> Self {
        Self {
            status: SubmitStatus::Success,
            info: String::new(),
        }
    }

    /// True iff the orderer accepted the submission.
    pub fn is_success(&self) -> bool {
        self.status == SubmitStatus::Success
    }
}

/// Validity code delivered with a commit notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidityCode {
    /// The transaction committed and is valid.
    Valid,
    /// Rejected: a read key was updated by a concurrent transaction.
    MvccReadConflict,
    /// Rejected: the endorsement policy check failed at validation time.
    EndorsementPolicyFailure,
    /// Rejected: malformed transaction payload.
    BadPayload,
    /// Any other validation code, carried verbatim.
    Other(String),
}

impl fmt::Display for ValidityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidityCode::Valid => write!(f, "VALID"),
            ValidityCode::MvccReadConflict => write!(f, "MVCC_READ_CONFLICT"),
            ValidityCode::EndorsementPolicyFailure => write!(f, "ENDORSEMENT_POLICY_FAILURE"),
            ValidityCode::BadPayload => write!(f, "BAD_PAYLOAD"),
            ValidityCode::Other(code) => write!(f, "{code}"),
        }
    }
}

/// Per-organization notification that a transaction reached a block.
///
/// Ephemeral: consumed once by the waiting operation; stale or duplicate
/// notifications for an already-resolved transaction are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Transaction the notification refers to.
    pub tx_id: TransactionId,
    /// Validity code assigned during block validation.
    pub code: ValidityCode,
}

/// Notification that a block was committed on a peer.
///
/// Join flows use these to confirm channel membership: the config block must
/// carry exactly one transaction and name the joined channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvent {
    /// Channel the block belongs to.
    pub channel_id: String,
    /// Number of transactions in the block.
    pub tx_count: usize,
}

/// Event delivered on a per-organization notification stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A transaction reached a committed block.
    Transaction(CommitOutcome),
    /// A block was committed.
    Block(BlockEvent),
}

/// A raw block fetched from the ordering service (genesis or config block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Channel the block belongs to.
    pub channel_id: String,
    /// Block number within the chain.
    pub number: u64,
    /// Opaque block payload.
    pub payload: Vec<u8>,
}

/// One organization admin's signature over a channel configuration artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSignature {
    /// Membership id of the signing admin's organization.
    pub msp_id: String,
    /// Signature bytes.
    pub signature: Vec<u8>,
}

/// A channel create/update submission for the ordering service.
#[derive(Debug, Clone)]
pub struct ChannelUpdateRequest {
    /// Channel name.
    pub name: String,
    /// Configuration artifact being created or applied.
    pub config: Vec<u8>,
    /// Admin signatures collected over the artifact.
    pub signatures: Vec<ConfigSignature>,
    /// Transaction id for the submission.
    pub tx_id: TransactionId,
}

/// An endorsing peer addressed by one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerTarget {
    /// Organization the peer belongs to.
    pub org: String,
    /// Membership id of that organization.
    pub msp_id: String,
    /// Peer name within the organization.
    pub name: String,
    /// Request endpoint.
    pub endpoint: String,
}

/// A ledger channel as seen by one operation.
///
/// Constructed fresh per operation from the network topology; conceptually it
/// is the shared namespace all member organizations join.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Channel name.
    pub name: String,
    /// Ordering-service endpoint for the channel.
    pub orderer_endpoint: String,
    /// Peers targeted by the current operation.
    pub targets: Vec<PeerTarget>,
}
