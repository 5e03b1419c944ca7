//! # Domain Errors
//!
//! Error types for the middleware orchestration core.
//!
//! Every fallible path inside the crate produces a [`MiddlewareError`]; the
//! inbound API boundary converts them into a uniform success/message result,
//! so none of these values ever cross to the caller-facing surface.

use thiserror::Error;

use super::entities::ValidityCode;

/// Middleware error taxonomy.
#[derive(Debug, Error)]
pub enum MiddlewareError {
    /// A required request field was absent or empty. Detected before any
    /// network call; the caller can resubmit with corrected input.
    #[error("'{0}' field is missing or invalid in the request")]
    MissingField(&'static str),

    /// The named organization is not part of the network topology.
    #[error("unknown organization: {0}")]
    UnknownOrg(String),

    /// Enrollment or credential resolution failed. Fatal to the operation,
    /// never retried automatically.
    #[error("failed to resolve identity for '{user}' of {org}: {reason}")]
    Identity {
        /// Acting organization.
        org: String,
        /// User whose credentials were requested.
        user: String,
        /// Provider-supplied failure detail.
        reason: String,
    },

    /// One or more endorsing peers were unreachable or returned a
    /// non-success status. Per-peer detail is preserved for diagnosis.
    #[error("endorsement failed on {bad} of {total} peers: {detail}")]
    Endorsement {
        /// Number of bad responses (including unreachable peers).
        bad: usize,
        /// Number of targeted peers.
        total: usize,
        /// Which peers failed and how.
        detail: String,
    },

    /// Otherwise-valid responses carried divergent read/write sets
    /// (non-deterministic simulation across peers).
    #[error("proposal responses do not match: read/write sets diverge across peers")]
    ResponseMismatch,

    /// The endorsement policy threshold was not met.
    #[error("endorsement policy not satisfied: missing signatures from {missing:?}")]
    PolicyViolation {
        /// Required signer roles with no matching valid response.
        missing: Vec<String>,
    },

    /// The ordering service rejected the transaction or was unreachable.
    #[error("ordering service rejected the transaction: {0}")]
    Submission(String),

    /// No commit notification arrived within the configured window.
    /// Kept distinct from [`MiddlewareError::CommitInvalidated`]: operators
    /// must be able to tell "never heard back" from "explicitly rejected".
    #[error("commit confirmation timed out for organization {org} after {timeout_ms} ms")]
    CommitTimeout {
        /// Organization whose notification stream stayed silent.
        org: String,
        /// Configured wait window.
        timeout_ms: u64,
    },

    /// A commit notification arrived with a non-valid code.
    #[error("transaction invalidated by organization {org}: {code}")]
    CommitInvalidated {
        /// Organization that reported the invalidation.
        org: String,
        /// Validity code carried by the notification.
        code: ValidityCode,
    },

    /// Query responses disagreed across responding peers.
    #[error("Responses from peers don't match")]
    QueryMismatch,

    /// The requested channel does not exist on the ordering service.
    #[error("channel {0} does not exist")]
    ChannelNotFound(String),

    /// Network topology or middleware configuration was structurally
    /// invalid. Raised at load time, before any operation runs.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport-level failure talking to a peer, orderer, or event stream.
    #[error("network error: {0}")]
    Network(String),
}

impl MiddlewareError {
    /// True for failures the caller can repair by resubmitting corrected
    /// input (no network call was made).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            MiddlewareError::MissingField(_) | MiddlewareError::UnknownOrg(_)
        )
    }
}
