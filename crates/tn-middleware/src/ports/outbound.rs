//! # Outbound Ports
//!
//! Traits for the external collaborators this core orchestrates: the
//! identity provider, endorsing peers, the ordering service, and the
//! per-organization commit-notification streams. Implementations (gRPC
//! transports, CA clients) live outside this crate.
//!
//! Mock implementations for testing live alongside the traits. They record
//! their calls in a shared [`CallLog`] so tests can assert temporal
//! invariants (subscriptions before submission, no submission after a policy
//! violation).

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::domain::{
    AssembledTransaction, Block, ChannelUpdateRequest, CommitOutcome, ConfigSignature,
    Endorsement, Identity, IdentityRole, MiddlewareError, PeerEvent, PeerTarget, Proposal,
    ProposalResponse, ReadWriteSet, SignedProposal, SubmitAck, TransactionId, ValidityCode,
};

/// Identity resolution and signing capability - outbound port.
///
/// The provider owns credential caching per (org, user) and the state-store
/// layout behind it; this core resolves once per operation and never
/// re-enrolls mid-flow.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve (enrolling if necessary) a user identity for an organization.
    async fn resolve(
        &self,
        org: &str,
        user: &str,
        secret: Option<&str>,
    ) -> Result<Identity, MiddlewareError>;

    /// Load the pre-provisioned admin identity of an organization.
    async fn admin_identity(&self, org: &str) -> Result<Identity, MiddlewareError>;

    /// Load the pre-provisioned ordering-service admin identity.
    async fn orderer_admin(&self) -> Result<Identity, MiddlewareError>;

    /// Sign a proposal as the given identity.
    async fn sign_proposal(
        &self,
        identity: &Identity,
        proposal: &Proposal,
    ) -> Result<SignedProposal, MiddlewareError>;

    /// Sign a channel configuration artifact as the given identity.
    async fn sign_channel_config(
        &self,
        identity: &Identity,
        config: &[u8],
    ) -> Result<ConfigSignature, MiddlewareError>;
}

/// Endorsement-signature verification - outbound port.
///
/// Cryptographic verification is a capability consumed from the signing
/// collaborator, not implemented here.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Verify a response's endorsement against the responding peer's known
    /// membership id.
    async fn verify_endorsement(&self, response: &ProposalResponse, expected_msp: &str) -> bool;
}

/// Endorsing-peer transport - outbound port.
///
/// Request/response, not streaming; the adapter owns connection pooling.
#[async_trait]
pub trait PeerGateway: Send + Sync {
    /// Send a signed proposal to one peer and await its response.
    async fn process_proposal(
        &self,
        target: &PeerTarget,
        proposal: &SignedProposal,
        timeout: Duration,
    ) -> Result<ProposalResponse, MiddlewareError>;

    /// Ask one peer to join a channel given its genesis block.
    async fn join_channel(
        &self,
        target: &PeerTarget,
        genesis: &Block,
        tx_id: TransactionId,
    ) -> Result<ProposalResponse, MiddlewareError>;
}

/// Ordering-service transport - outbound port.
#[async_trait]
pub trait OrderingService: Send + Sync {
    /// Forward an assembled transaction for sequencing. One round trip; the
    /// acknowledgment does not imply ledger commitment.
    async fn broadcast(
        &self,
        channel: &str,
        transaction: &AssembledTransaction,
    ) -> Result<SubmitAck, MiddlewareError>;

    /// Submit a signed channel create/update configuration.
    async fn submit_channel_update(
        &self,
        request: &ChannelUpdateRequest,
    ) -> Result<SubmitAck, MiddlewareError>;

    /// Fetch a channel's genesis block. Fails with
    /// [`MiddlewareError::ChannelNotFound`] if the channel does not exist.
    async fn genesis_block(&self, channel: &str) -> Result<Block, MiddlewareError>;

    /// Fetch the current channel configuration artifact.
    async fn channel_config(&self, channel: &str) -> Result<Vec<u8>, MiddlewareError>;
}

/// A live subscription to one organization's notification stream.
///
/// Dropping the subscription unsubscribes: the stream side observes the
/// closed channel and releases the connection. This is what guarantees
/// teardown on every exit path, including failed operations.
#[derive(Debug)]
pub struct CommitSubscription {
    org: String,
    receiver: mpsc::Receiver<PeerEvent>,
}

impl CommitSubscription {
    /// Wrap a receiving channel as a subscription for `org`.
    pub fn new(org: &str, receiver: mpsc::Receiver<PeerEvent>) -> Self {
        Self {
            org: org.to_string(),
            receiver,
        }
    }

    /// Organization this subscription listens for.
    pub fn org(&self) -> &str {
        &self.org
    }

    /// Next event, or `None` once the stream has closed.
    pub async fn recv(&mut self) -> Option<PeerEvent> {
        self.receiver.recv().await
    }
}

/// Per-organization commit-notification streams - outbound port.
#[async_trait]
pub trait CommitEventSource: Send + Sync {
    /// Open a streaming subscription to one organization's notifications.
    async fn subscribe(&self, org: &str) -> Result<CommitSubscription, MiddlewareError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Shared, ordered record of calls across mocks.
///
/// Lets a test assert cross-collaborator ordering, e.g. that every
/// `subscribe:` entry precedes the first `broadcast` entry.
#[derive(Debug, Default)]
pub struct CallLog {
    entries: Mutex<Vec<String>>,
}

impl CallLog {
    /// Fresh, empty log.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Snapshot of all entries, in call order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Index of the first entry with this prefix, if any.
    pub fn first_index_of(&self, prefix: &str) -> Option<usize> {
        self.entries
            .lock()
            .iter()
            .position(|e| e.starts_with(prefix))
    }
}

/// Mock identity provider with per-(org, user) caching.
pub struct MockIdentityProvider {
    msp_ids: BTreeMap<String, String>,
    orderer_msp: String,
    failing_orgs: RwLock<BTreeSet<String>>,
    cache: DashMap<(String, String), Identity>,
    /// Organizations whose admins signed a channel config, in call order.
    pub config_signers: Mutex<Vec<String>>,
}

impl MockIdentityProvider {
    /// Provider knowing the given (org name, membership id) pairs.
    pub fn with_orgs(orgs: &[(&str, &str)]) -> Self {
        Self {
            msp_ids: orgs
                .iter()
                .map(|(org, msp)| (org.to_string(), msp.to_string()))
                .collect(),
            orderer_msp: "TradeOrdererMSP".to_string(),
            failing_orgs: RwLock::new(BTreeSet::new()),
            cache: DashMap::new(),
            config_signers: Mutex::new(Vec::new()),
        }
    }

    /// Make resolution fail for one organization.
    pub fn fail_org(&self, org: &str) {
        self.failing_orgs.write().insert(org.to_string());
    }

    /// Number of distinct identities enrolled so far.
    pub fn enrolled_count(&self) -> usize {
        self.cache.len()
    }

    fn msp_for(&self, org: &str) -> Result<&String, MiddlewareError> {
        self.msp_ids
            .get(org)
            .ok_or_else(|| MiddlewareError::UnknownOrg(org.to_string()))
    }

    fn identity(&self, org: &str, user: &str, role: IdentityRole) -> Result<Identity, MiddlewareError> {
        if self.failing_orgs.read().contains(org) {
            return Err(MiddlewareError::Identity {
                org: org.to_string(),
                user: user.to_string(),
                reason: "enrollment rejected".to_string(),
            });
        }
        let msp_id = self.msp_for(org)?.clone();
        let key = (org.to_string(), user.to_string());
        let entry = self.cache.entry(key).or_insert_with(|| Identity {
            org: org.to_string(),
            msp_id,
            user: user.to_string(),
            role,
        });
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn resolve(
        &self,
        org: &str,
        user: &str,
        _secret: Option<&str>,
    ) -> Result<Identity, MiddlewareError> {
        self.identity(org, user, IdentityRole::Member)
    }

    async fn admin_identity(&self, org: &str) -> Result<Identity, MiddlewareError> {
        self.identity(org, "admin", IdentityRole::Admin)
    }

    async fn orderer_admin(&self) -> Result<Identity, MiddlewareError> {
        Ok(Identity {
            org: "orderer".to_string(),
            msp_id: self.orderer_msp.clone(),
            user: "admin".to_string(),
            role: IdentityRole::Admin,
        })
    }

    async fn sign_proposal(
        &self,
        identity: &Identity,
        proposal: &Proposal,
    ) -> Result<SignedProposal, MiddlewareError> {
        Ok(SignedProposal {
            proposal: proposal.clone(),
            creator_msp: identity.msp_id.clone(),
            signature: vec![0xAB],
        })
    }

    async fn sign_channel_config(
        &self,
        identity: &Identity,
        _config: &[u8],
    ) -> Result<ConfigSignature, MiddlewareError> {
        self.config_signers.lock().push(identity.org.clone());
        Ok(ConfigSignature {
            msp_id: identity.msp_id.clone(),
            signature: vec![0xCD],
        })
    }
}

/// Mock verifier; accepts everything unless a membership id is rejected.
#[derive(Default)]
pub struct MockSignatureVerifier {
    rejected_msps: RwLock<BTreeSet<String>>,
}

impl MockSignatureVerifier {
    /// Accept-everything verifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat endorsements from this membership id as invalid.
    pub fn reject_msp(&self, msp_id: &str) {
        self.rejected_msps.write().insert(msp_id.to_string());
    }
}

#[async_trait]
impl SignatureVerifier for MockSignatureVerifier {
    async fn verify_endorsement(&self, response: &ProposalResponse, expected_msp: &str) -> bool {
        match &response.endorsement {
            Some(endorsement) => {
                endorsement.msp_id == expected_msp
                    && !self.rejected_msps.read().contains(expected_msp)
            }
            None => false,
        }
    }
}

/// Scripted behavior of one mock peer.
#[derive(Debug, Clone)]
pub struct PeerBehavior {
    /// Response status code.
    pub status: u16,
    /// Response detail message.
    pub message: String,
    /// Simulation payload.
    pub payload: Vec<u8>,
    /// Simulated read/write footprint.
    pub read_write_set: ReadWriteSet,
    /// Simulate an unreachable peer instead of responding.
    pub unreachable: bool,
}

impl Default for PeerBehavior {
    fn default() -> Self {
        Self {
            status: 200,
            message: String::new(),
            payload: Vec::new(),
            read_write_set: ReadWriteSet::single_write("trade-1", "REQUESTED"),
            unreachable: false,
        }
    }
}

impl PeerBehavior {
    /// Good response with the given payload.
    pub fn with_payload(payload: &str) -> Self {
        Self {
            payload: payload.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    /// Failing response with the given status.
    pub fn failing(status: u16, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
            ..Self::default()
        }
    }

    /// Good response with a custom footprint.
    pub fn with_read_write_set(rw: ReadWriteSet) -> Self {
        Self {
            read_write_set: rw,
            ..Self::default()
        }
    }
}

/// Mock endorsing-peer gateway: scripted per-peer behaviors, call recording.
pub struct MockPeerGateway {
    behaviors: DashMap<String, PeerBehavior>,
    /// (peer key, transaction id) per proposal received, in call order.
    pub proposals: Mutex<Vec<(String, TransactionId)>>,
    /// Peer keys that received join requests, in call order.
    pub joins: Mutex<Vec<String>>,
    log: Option<Arc<CallLog>>,
}

impl MockPeerGateway {
    /// Gateway where every peer responds with [`PeerBehavior::default`].
    pub fn new() -> Self {
        Self {
            behaviors: DashMap::new(),
            proposals: Mutex::new(Vec::new()),
            joins: Mutex::new(Vec::new()),
            log: None,
        }
    }

    /// Attach a shared call log.
    pub fn with_log(mut self, log: Arc<CallLog>) -> Self {
        self.log = Some(log);
        self
    }

    fn key(target: &PeerTarget) -> String {
        format!("{}/{}", target.org, target.name)
    }

    /// Script the behavior of one peer.
    pub fn set_behavior(&self, org: &str, peer: &str, behavior: PeerBehavior) {
        self.behaviors.insert(format!("{org}/{peer}"), behavior);
    }

    fn behavior_for(&self, target: &PeerTarget) -> PeerBehavior {
        self.behaviors
            .get(&Self::key(target))
            .map(|b| b.clone())
            .unwrap_or_default()
    }

    fn response(&self, target: &PeerTarget, behavior: &PeerBehavior) -> ProposalResponse {
        let good = behavior.status == 200;
        ProposalResponse {
            peer: target.name.clone(),
            org: target.org.clone(),
            status: behavior.status,
            message: behavior.message.clone(),
            payload: behavior.payload.clone(),
            endorsement: good.then(|| Endorsement {
                msp_id: target.msp_id.clone(),
                role: IdentityRole::Member,
                signature: vec![0xEE],
            }),
            read_write_set: good.then(|| behavior.read_write_set.clone()),
        }
    }
}

impl Default for MockPeerGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerGateway for MockPeerGateway {
    async fn process_proposal(
        &self,
        target: &PeerTarget,
        proposal: &SignedProposal,
        _timeout: Duration,
    ) -> Result<ProposalResponse, MiddlewareError> {
        let key = Self::key(target);
        self.proposals
            .lock()
            .push((key.clone(), proposal.proposal.tx_id));
        if let Some(log) = &self.log {
            log.record(format!("propose:{key}"));
        }
        let behavior = self.behavior_for(target);
        if behavior.unreachable {
            return Err(MiddlewareError::Network(format!(
                "connection refused: {}",
                target.endpoint
            )));
        }
        Ok(self.response(target, &behavior))
    }

    async fn join_channel(
        &self,
        target: &PeerTarget,
        _genesis: &Block,
        _tx_id: TransactionId,
    ) -> Result<ProposalResponse, MiddlewareError> {
        let key = Self::key(target);
        self.joins.lock().push(key.clone());
        if let Some(log) = &self.log {
            log.record(format!("join:{key}"));
        }
        let behavior = self.behavior_for(target);
        if behavior.unreachable {
            return Err(MiddlewareError::Network(format!(
                "connection refused: {}",
                target.endpoint
            )));
        }
        Ok(self.response(target, &behavior))
    }
}

/// Mock per-organization notification streams.
///
/// Tests either queue events up front (block events for join flows) or wire
/// the mock to a [`MockOrderingService`] so a broadcast triggers commit
/// notifications (transaction flows, where the id is only known mid-flow).
pub struct MockCommitEventSource {
    senders: Mutex<HashMap<String, Vec<mpsc::Sender<PeerEvent>>>>,
    queued: Mutex<HashMap<String, Vec<PeerEvent>>>,
    outcomes: RwLock<BTreeMap<String, ValidityCode>>,
    silent_orgs: RwLock<BTreeSet<String>>,
    log: Option<Arc<CallLog>>,
}

impl MockCommitEventSource {
    /// Source that reports every transaction as committed and valid.
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
            queued: Mutex::new(HashMap::new()),
            outcomes: RwLock::new(BTreeMap::new()),
            silent_orgs: RwLock::new(BTreeSet::new()),
            log: None,
        }
    }

    /// Attach a shared call log.
    pub fn with_log(mut self, log: Arc<CallLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Report this validity code instead of `VALID` for one organization.
    pub fn set_outcome(&self, org: &str, code: ValidityCode) {
        self.outcomes.write().insert(org.to_string(), code);
    }

    /// Make one organization's stream emit nothing (orphaned node).
    pub fn set_silent(&self, org: &str) {
        self.silent_orgs.write().insert(org.to_string());
    }

    /// Queue an event for delivery as soon as `org` subscribes.
    pub fn queue_event(&self, org: &str, event: PeerEvent) {
        self.queued
            .lock()
            .entry(org.to_string())
            .or_default()
            .push(event);
    }

    /// Deliver an event to one organization's live subscriptions.
    ///
    /// Returns the number of subscriptions that received it; closed
    /// subscriptions are pruned.
    pub fn emit(&self, org: &str, event: PeerEvent) -> usize {
        let mut senders = self.senders.lock();
        let Some(list) = senders.get_mut(org) else {
            return 0;
        };
        list.retain(|sender| sender.try_send(event.clone()).is_ok());
        list.len()
    }

    /// Notify all subscribed organizations that a transaction committed,
    /// honoring per-org outcome overrides and silent organizations.
    pub fn complete_transaction(&self, tx_id: TransactionId) {
        let orgs: Vec<String> = self.senders.lock().keys().cloned().collect();
        for org in orgs {
            if self.silent_orgs.read().contains(&org) {
                continue;
            }
            let code = self
                .outcomes
                .read()
                .get(&org)
                .cloned()
                .unwrap_or(ValidityCode::Valid);
            self.emit(&org, PeerEvent::Transaction(CommitOutcome { tx_id, code }));
        }
    }

    /// Number of currently open subscriptions for one organization.
    pub fn open_subscriptions(&self, org: &str) -> usize {
        let mut senders = self.senders.lock();
        let Some(list) = senders.get_mut(org) else {
            return 0;
        };
        list.retain(|sender| !sender.is_closed());
        list.len()
    }
}

impl Default for MockCommitEventSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommitEventSource for MockCommitEventSource {
    async fn subscribe(&self, org: &str) -> Result<CommitSubscription, MiddlewareError> {
        if let Some(log) = &self.log {
            log.record(format!("subscribe:{org}"));
        }
        let (sender, receiver) = mpsc::channel(32);
        if let Some(events) = self.queued.lock().get(org) {
            for event in events {
                let _ = sender.try_send(event.clone());
            }
        }
        self.senders
            .lock()
            .entry(org.to_string())
            .or_default()
            .push(sender);
        Ok(CommitSubscription::new(org, receiver))
    }
}

/// Mock ordering service: records broadcasts, tracks existing channels, and
/// optionally triggers commit notifications on a wired
/// [`MockCommitEventSource`].
pub struct MockOrderingService {
    ack: RwLock<SubmitAck>,
    reachable: RwLock<bool>,
    channels: RwLock<BTreeSet<String>>,
    /// Transaction ids broadcast for sequencing, in call order.
    pub broadcasts: Mutex<Vec<TransactionId>>,
    /// Channel names submitted as create/update requests, in call order.
    pub channel_updates: Mutex<Vec<String>>,
    events: Option<Arc<MockCommitEventSource>>,
    log: Option<Arc<CallLog>>,
}

impl MockOrderingService {
    /// Orderer that acknowledges everything with `SUCCESS`.
    pub fn new() -> Self {
        Self {
            ack: RwLock::new(SubmitAck::success()),
            reachable: RwLock::new(true),
            channels: RwLock::new(BTreeSet::new()),
            broadcasts: Mutex::new(Vec::new()),
            channel_updates: Mutex::new(Vec::new()),
            events: None,
            log: None,
        }
    }

    /// Wire a commit event source so broadcasts trigger notifications.
    pub fn with_events(mut self, events: Arc<MockCommitEventSource>) -> Self {
        self.events = Some(events);
        self
    }

    /// Attach a shared call log.
    pub fn with_log(mut self, log: Arc<CallLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Script the acknowledgment returned on submissions.
    pub fn set_ack(&self, ack: SubmitAck) {
        *self.ack.write() = ack;
    }

    /// Make the orderer unreachable.
    pub fn set_unreachable(&self) {
        *self.reachable.write() = false;
    }

    /// Pretend the channel already exists on the orderer.
    pub fn add_channel(&self, name: &str) {
        self.channels.write().insert(name.to_string());
    }

    /// Has this channel been created (pre-existing or via a submission)?
    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.read().contains(name)
    }

    fn check_reachable(&self) -> Result<(), MiddlewareError> {
        if *self.reachable.read() {
            Ok(())
        } else {
            Err(MiddlewareError::Network(
                "orderer unreachable".to_string(),
            ))
        }
    }
}

impl Default for MockOrderingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderingService for MockOrderingService {
    async fn broadcast(
        &self,
        _channel: &str,
        transaction: &AssembledTransaction,
    ) -> Result<SubmitAck, MiddlewareError> {
        self.check_reachable()?;
        if let Some(log) = &self.log {
            log.record("broadcast");
        }
        self.broadcasts.lock().push(transaction.tx_id());
        let ack = self.ack.read().clone();
        if ack.is_success() {
            if let Some(events) = &self.events {
                events.complete_transaction(transaction.tx_id());
            }
        }
        Ok(ack)
    }

    async fn submit_channel_update(
        &self,
        request: &ChannelUpdateRequest,
    ) -> Result<SubmitAck, MiddlewareError> {
        self.check_reachable()?;
        if let Some(log) = &self.log {
            log.record(format!("channel-update:{}", request.name));
        }
        self.channel_updates.lock().push(request.name.clone());
        let ack = self.ack.read().clone();
        if ack.is_success() {
            self.channels.write().insert(request.name.clone());
        }
        Ok(ack)
    }

    async fn genesis_block(&self, channel: &str) -> Result<Block, MiddlewareError> {
        self.check_reachable()?;
        if self.channels.read().contains(channel) {
            Ok(Block {
                channel_id: channel.to_string(),
                number: 0,
                payload: Vec::new(),
            })
        } else {
            Err(MiddlewareError::ChannelNotFound(channel.to_string()))
        }
    }

    async fn channel_config(&self, channel: &str) -> Result<Vec<u8>, MiddlewareError> {
        self.check_reachable()?;
        if self.channels.read().contains(channel) {
            Ok(vec![0x0C])
        } else {
            Err(MiddlewareError::ChannelNotFound(channel.to_string()))
        }
    }
}
