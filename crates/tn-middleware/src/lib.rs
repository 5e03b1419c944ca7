//! # Trade-Network Middleware
//!
//! Client-side orchestration for a permissioned, multi-organization trade
//! ledger: channel creation and membership, chaincode deployment, and
//! transaction submission/query against a fixed set of participant
//! organizations with a shared ordering service.
//!
//! ## What this crate does
//!
//! For a state-changing operation it builds a signed proposal, fans it out to
//! the required endorsing peers in parallel, verifies and reconciles their
//! responses under an endorsement policy, submits the assembled transaction
//! for sequencing, and waits for asynchronous commit confirmation from every
//! organization's notification stream - all under hard timeouts, with
//! partial failures preserved in the reported detail.
//!
//! Consensus, block validation, and chaincode execution belong to the
//! network; credential issuance belongs to the identity provider behind the
//! [`ports::outbound::IdentityProvider`] port. This crate only orchestrates
//! the client's side of the protocol.
//!
//! ## Module Structure
//!
//! ```text
//! tn-middleware/
//! ├── domain/          # Entities, endorsement policies, error taxonomy
//! ├── algorithms/      # Response classification, policy evaluation, agreement
//! ├── ports/           # Caller API (inbound) + collaborator traits (outbound)
//! ├── application/     # Coordinator, commit notifier, orchestrating service
//! └── config.rs        # MiddlewareConfig + NetworkTopology
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tn_middleware::{MiddlewareApi, MiddlewareConfig, MiddlewareService, NetworkTopology};
//!
//! let topology = NetworkTopology::from_file("config.json".as_ref())?;
//! let service = MiddlewareService::new(
//!     MiddlewareConfig::default(),
//!     topology,
//!     identities,
//!     peers,
//!     orderer,
//!     events,
//!     verifier,
//! );
//!
//! let result = service
//!     .invoke("exporterorg", "acceptTrade", vec!["trade-1".into()], None)
//!     .await;
//! assert!(result.success);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use application::{CommitNotifier, EndorsementCoordinator, MiddlewareService};
pub use config::{MiddlewareConfig, NetworkTopology, OrdererConfig, OrgConfig, PeerEndpoint};
pub use domain::{
    AssembledTransaction, Block, BlockEvent, Channel, ChannelUpdateRequest, CommitOutcome,
    ConfigSignature, Endorsement, EndorsementPolicy, Identity, IdentityRole, MiddlewareError,
    PeerEvent, PeerTarget, PolicyRule, PolicySubject, Proposal, ProposalResponse, ReadWriteSet,
    RolePrincipal, SignedProposal, SubmitAck, SubmitStatus, TransactionId, ValidityCode,
};
pub use ports::{
    CommitEventSource, CommitSubscription, IdentityProvider, MiddlewareApi, OperationResult,
    OrderingService, PeerGateway, SignatureVerifier,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
