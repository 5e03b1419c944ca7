//! # Ports
//!
//! Inbound: the caller-facing operation surface. Outbound: traits for the
//! identity provider, endorsing peers, ordering service, and notification
//! streams, with mock implementations for tests.

pub mod inbound;
pub mod outbound;

pub use inbound::{MiddlewareApi, OperationResult};
pub use outbound::{
    CallLog, CommitEventSource, CommitSubscription, IdentityProvider, MockCommitEventSource,
    MockIdentityProvider, MockOrderingService, MockPeerGateway, MockSignatureVerifier,
    OrderingService, PeerBehavior, PeerGateway, SignatureVerifier,
};
