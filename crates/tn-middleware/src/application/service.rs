//! # Middleware Service
//!
//! The orchestrator behind the caller-facing API. Each operation runs the
//! same generic shape: validate inputs before any network call, resolve the
//! acting identity, build the per-operation channel view from topology, then
//! drive endorsement, policy evaluation, ordering submission, and commit
//! confirmation in that order. Commit subscriptions are registered before
//! anything is submitted for ordering, so commitment can never race ahead of
//! the listeners.
//!
//! Sequential per-organization steps (config signature collection, joins,
//! installs) iterate organizations in the topology's fixed order; true
//! fan-out steps (endorsement, notification waits) run concurrently.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::algorithms::{check_matching_payloads, check_matching_read_write_sets, evaluate};
use crate::application::coordinator::EndorsementCoordinator;
use crate::application::notifier::CommitNotifier;
use crate::config::{MiddlewareConfig, NetworkTopology};
use crate::domain::{
    AssembledTransaction, Channel, ChannelUpdateRequest, EndorsementPolicy, MiddlewareError,
    PeerTarget, Proposal, ProposalResponse, SignedProposal, SubmitAck, TransactionId,
};
use crate::ports::inbound::{MiddlewareApi, OperationResult};
use crate::ports::outbound::{
    CommitEventSource, IdentityProvider, OrderingService, PeerGateway, SignatureVerifier,
};

/// Reject an empty required field before any network call is made.
fn require(value: &str, field: &'static str) -> Result<(), MiddlewareError> {
    if value.trim().is_empty() {
        Err(MiddlewareError::MissingField(field))
    } else {
        Ok(())
    }
}

/// The transaction orchestration service.
///
/// Generic over its five collaborators; production wiring supplies the gRPC
/// and CA-backed implementations, tests supply the mocks from
/// [`crate::ports::outbound`].
pub struct MiddlewareService<I, G, O, E, V>
where
    I: IdentityProvider,
    G: PeerGateway,
    O: OrderingService,
    E: CommitEventSource,
    V: SignatureVerifier,
{
    config: MiddlewareConfig,
    topology: NetworkTopology,
    identities: Arc<I>,
    orderer: Arc<O>,
    events: Arc<E>,
    coordinator: EndorsementCoordinator<G, V>,
}

impl<I, G, O, E, V> MiddlewareService<I, G, O, E, V>
where
    I: IdentityProvider,
    G: PeerGateway,
    O: OrderingService,
    E: CommitEventSource,
    V: SignatureVerifier,
{
    /// Wire a service over validated configuration and collaborators.
    pub fn new(
        config: MiddlewareConfig,
        topology: NetworkTopology,
        identities: Arc<I>,
        gateway: Arc<G>,
        orderer: Arc<O>,
        events: Arc<E>,
        verifier: Arc<V>,
    ) -> Self {
        Self {
            config,
            topology,
            identities,
            orderer,
            events,
            coordinator: EndorsementCoordinator::new(gateway, verifier),
        }
    }

    /// The configured transaction endorsement policy: a member signature
    /// from every organization in the topology.
    pub fn transaction_policy(&self) -> EndorsementPolicy {
        EndorsementPolicy::all_members(self.topology.msp_ids())
    }

    /// Convenience: join every organization's peers to the channel, in
    /// topology order.
    pub async fn join_all_organizations(&self) -> OperationResult {
        let orgs: Vec<String> = self.topology.org_names().map(String::from).collect();
        for org in &orgs {
            let result = self.join_channel(org).await;
            if !result.success {
                return result;
            }
        }
        OperationResult::ok(format!(
            "Successfully joined peers of {} organizations to channel {}",
            orgs.len(),
            self.config.channel_name
        ))
    }

    /// The per-operation channel view over one anchor peer per org.
    fn invocation_channel(&self) -> Channel {
        self.topology
            .channel(&self.config.channel_name, self.topology.anchor_targets())
    }

    /// Broadcast an assembled transaction and require a `SUCCESS` ack.
    async fn submit_for_ordering(
        &self,
        channel: &str,
        assembled: &AssembledTransaction,
    ) -> Result<(), MiddlewareError> {
        let ack = self.orderer.broadcast(channel, assembled).await?;
        check_ack(&ack)
    }

    /// Endorse a signed proposal against the targets: fan out, verify, check
    /// footprint agreement, evaluate the policy. Returns the valid subset.
    async fn endorse(
        &self,
        targets: &[PeerTarget],
        signed: &SignedProposal,
        policy: &EndorsementPolicy,
        timeout: std::time::Duration,
    ) -> Result<Vec<ProposalResponse>, MiddlewareError> {
        let set = self
            .coordinator
            .propose_and_verify(targets, signed, timeout)
            .await?;
        info!(
            good = set.good().len(),
            total = set.responses.len(),
            "collected proposal responses"
        );
        if !set.all_good() {
            warn!(detail = %set.bad_detail(), "some proposal responses were bad");
        }
        let good = set.good();
        check_matching_read_write_sets(&good)?;
        let valid = evaluate(policy, &good)?;
        Ok(valid.into_iter().cloned().collect())
    }

    async fn run_invoke(
        &self,
        org: &str,
        version: &str,
        fcn: &str,
        args: Vec<String>,
        user: Option<&str>,
    ) -> Result<String, MiddlewareError> {
        require(org, "userOrg")?;
        require(fcn, "fcn")?;
        require(&self.config.chaincode_id, "chaincodeId")?;
        self.topology.org(org)?;

        let user_name = user.unwrap_or("admin");
        let identity = self.identities.resolve(org, user_name, None).await?;
        debug!(user = %identity.user, org = %identity.org, version, "resolved submitter identity");

        let channel = self.invocation_channel();
        let tx_id = TransactionId::generate();
        let proposal = Proposal::invocation(
            &channel.name,
            &self.config.chaincode_id,
            fcn,
            args,
            tx_id,
        );
        let signed = self.identities.sign_proposal(&identity, &proposal).await?;

        // Listeners must be live before the transaction can reach a block.
        let notifier =
            CommitNotifier::subscribe_all(&*self.events, self.topology.org_names()).await?;

        let policy = self.transaction_policy();
        let valid = self
            .endorse(&channel.targets, &signed, &policy, self.config.request_timeout())
            .await?;

        let assembled = AssembledTransaction {
            proposal: signed,
            responses: valid,
        };
        info!(%tx_id, "proposal endorsed, submitting for ordering");

        tokio::try_join!(
            self.submit_for_ordering(&channel.name, &assembled),
            notifier.await_commit(tx_id, self.config.commit_timeout()),
        )?;

        Ok(format!(
            "Transaction {tx_id} committed on channel {}",
            channel.name
        ))
    }

    async fn run_query(
        &self,
        org: &str,
        _version: &str,
        fcn: &str,
        args: Vec<String>,
        user: Option<&str>,
    ) -> Result<String, MiddlewareError> {
        require(org, "userOrg")?;
        require(fcn, "fcn")?;
        self.topology.org(org)?;

        let user_name = user.unwrap_or("admin");
        let identity = self.identities.resolve(org, user_name, None).await?;

        let channel = self.invocation_channel();
        let tx_id = TransactionId::generate();
        let proposal = Proposal::invocation(
            &channel.name,
            &self.config.chaincode_id,
            fcn,
            args,
            tx_id,
        );
        let signed = self.identities.sign_proposal(&identity, &proposal).await?;

        // Query: fan-out only. No subscriptions, no ordering submission.
        let set = self
            .coordinator
            .propose_and_verify(&channel.targets, &signed, self.config.request_timeout())
            .await?;
        let good = set.good();
        if good.is_empty() {
            return Err(set.endorsement_error());
        }
        check_matching_payloads(&good)
    }

    async fn run_instantiate(
        &self,
        org: &str,
        path: &str,
        version: &str,
        fcn: &str,
        args: Vec<String>,
        upgrade: bool,
    ) -> Result<String, MiddlewareError> {
        require(org, "userOrg")?;
        require(path, "chaincodePath")?;
        require(version, "chaincodeVersion")?;
        require(fcn, "fcn")?;
        self.topology.org(org)?;

        let verb = if upgrade { "upgrade" } else { "instantiate" };
        let identity = self.identities.admin_identity(org).await?;

        let channel = self.invocation_channel();
        let tx_id = TransactionId::generate();
        let policy = self.transaction_policy();
        let proposal = Proposal::deployment(
            &channel.name,
            &self.config.chaincode_id,
            path,
            version,
            fcn,
            args,
            tx_id,
            policy.clone(),
        );
        let signed = self.identities.sign_proposal(&identity, &proposal).await?;

        let notifier =
            CommitNotifier::subscribe_all(&*self.events, self.topology.org_names()).await?;

        debug!(%tx_id, version, "sending {verb} proposal");
        let valid = self
            .endorse(
                &channel.targets,
                &signed,
                &policy,
                self.config.deploy_proposal_timeout(),
            )
            .await?;

        let assembled = AssembledTransaction {
            proposal: signed,
            responses: valid,
        };

        tokio::try_join!(
            self.submit_for_ordering(&channel.name, &assembled),
            notifier.await_commit(tx_id, self.config.commit_timeout()),
        )?;

        Ok(format!(
            "Successfully sent {verb} transaction for chaincode {} {version} on channel {}",
            self.config.chaincode_id, channel.name
        ))
    }

    async fn run_install(&self, path: &str, version: &str) -> Result<String, MiddlewareError> {
        require(path, "chaincodePath")?;
        require(version, "chaincodeVersion")?;

        // Source copy only: per org in fixed order, every one of its peers
        // must accept. No policy, no ordering, no events.
        let orgs: Vec<String> = self.topology.org_names().map(String::from).collect();
        for org in &orgs {
            let identity = self.identities.admin_identity(org).await?;
            let targets = self.topology.org_targets(org)?;
            let tx_id = TransactionId::generate();
            let proposal = Proposal::install(&self.config.chaincode_id, path, version, tx_id);
            let signed = self.identities.sign_proposal(&identity, &proposal).await?;

            let set = self
                .coordinator
                .propose_and_verify(&targets, &signed, self.config.request_timeout())
                .await?;
            if !set.all_good() {
                return Err(set.endorsement_error());
            }
            info!(%org, version, "installed chaincode on organization peers");
        }
        Ok(format!(
            "Successfully installed chaincode {} {version} on peers of every organization",
            self.config.chaincode_id
        ))
    }

    async fn run_create_channel(&self, name: &str) -> Result<String, MiddlewareError> {
        require(name, "channelName")?;

        let config_bytes = std::fs::read(&self.config.channel_config_path).map_err(|e| {
            MiddlewareError::Config(format!(
                "failed to read channel config {}: {e}",
                self.config.channel_config_path.display()
            ))
        })?;

        // Every org admin signs the configuration, in fixed order so the
        // collected artifact is reproducible.
        let mut signatures = Vec::new();
        let orgs: Vec<String> = self.topology.org_names().map(String::from).collect();
        for org in &orgs {
            let admin = self.identities.admin_identity(org).await?;
            let signature = self
                .identities
                .sign_channel_config(&admin, &config_bytes)
                .await?;
            info!(%org, "collected channel config signature");
            signatures.push(signature);
        }

        let orderer_admin = self.identities.orderer_admin().await?;
        if self.orderer.genesis_block(name).await.is_ok() {
            info!(channel = %name, "channel already exists");
            return Ok(format!("Channel {name} already exists"));
        }
        signatures.push(
            self.identities
                .sign_channel_config(&orderer_admin, &config_bytes)
                .await?,
        );

        let request = ChannelUpdateRequest {
            name: name.to_string(),
            config: config_bytes,
            signatures,
            tx_id: TransactionId::generate(),
        };
        let ack = self.orderer.submit_channel_update(&request).await?;
        check_ack(&ack)?;

        // Give the ordering service a moment to serve the new channel.
        tokio::time::sleep(std::time::Duration::from_millis(self.config.channel_grace_ms)).await;
        Ok(format!("Successfully created channel {name}"))
    }

    async fn run_update_channel(
        &self,
        name: &str,
        config_update: &[u8],
    ) -> Result<String, MiddlewareError> {
        require(name, "channelName")?;
        if config_update.is_empty() {
            return Err(MiddlewareError::MissingField("configUpdate"));
        }

        // Fetching the current configuration doubles as the existence check.
        self.identities.orderer_admin().await?;
        let current = self.orderer.channel_config(name).await?;
        debug!(channel = %name, current_len = current.len(), "fetched current channel config");

        let mut signatures = Vec::new();
        let orgs: Vec<String> = self.topology.org_names().map(String::from).collect();
        for org in &orgs {
            let admin = self.identities.admin_identity(org).await?;
            signatures.push(
                self.identities
                    .sign_channel_config(&admin, config_update)
                    .await?,
            );
        }

        let request = ChannelUpdateRequest {
            name: name.to_string(),
            config: config_update.to_vec(),
            signatures,
            tx_id: TransactionId::generate(),
        };
        let ack = self.orderer.submit_channel_update(&request).await?;
        check_ack(&ack)?;

        tokio::time::sleep(std::time::Duration::from_millis(self.config.channel_grace_ms)).await;
        Ok(format!("Successfully updated channel {name}"))
    }

    async fn run_join_channel(&self, org: &str) -> Result<String, MiddlewareError> {
        require(org, "orgName")?;
        self.topology.org(org)?;

        let identity = self.identities.admin_identity(org).await?;
        debug!(user = %identity.user, %org, "joining channel as org admin");

        let channel = self
            .topology
            .channel(&self.config.channel_name, self.topology.org_targets(org)?);
        let genesis = self.orderer.genesis_block(&channel.name).await?;
        let tx_id = TransactionId::generate();

        // Block listeners attach before the join requests go out.
        let notifier = CommitNotifier::subscribe_all(&*self.events, [org]).await?;

        let join_requests = async {
            let responses = self
                .coordinator
                .join(&channel.targets, &genesis, tx_id)
                .await?;
            let bad: Vec<&ProposalResponse> =
                responses.iter().filter(|r| !r.is_success()).collect();
            if bad.is_empty() {
                Ok(())
            } else {
                Err(MiddlewareError::Endorsement {
                    bad: bad.len(),
                    total: responses.len(),
                    detail: crate::algorithms::bad_detail(&bad),
                })
            }
        };

        tokio::try_join!(
            join_requests,
            notifier.await_join_block(&channel.name, self.config.join_block_timeout()),
        )?;

        Ok(format!(
            "Successfully joined peers of organization {org} to channel {}",
            channel.name
        ))
    }
}

/// Require a `SUCCESS` acknowledgment from the ordering service.
fn check_ack(ack: &SubmitAck) -> Result<(), MiddlewareError> {
    if ack.is_success() {
        Ok(())
    } else {
        Err(MiddlewareError::Submission(format!(
            "status {}{}",
            ack.status,
            if ack.info.is_empty() {
                String::new()
            } else {
                format!(": {}", ack.info)
            }
        )))
    }
}

#[async_trait]
impl<I, G, O, E, V> MiddlewareApi for MiddlewareService<I, G, O, E, V>
where
    I: IdentityProvider,
    G: PeerGateway,
    O: OrderingService,
    E: CommitEventSource,
    V: SignatureVerifier,
{
    #[instrument(skip(self))]
    async fn create_channel(&self, name: &str) -> OperationResult {
        self.run_create_channel(name).await.into()
    }

    #[instrument(skip(self, config_update))]
    async fn update_channel(&self, name: &str, config_update: &[u8]) -> OperationResult {
        self.run_update_channel(name, config_update).await.into()
    }

    #[instrument(skip(self))]
    async fn join_channel(&self, org: &str) -> OperationResult {
        self.run_join_channel(org).await.into()
    }

    #[instrument(skip(self))]
    async fn install_chaincode(&self, path: &str, version: &str) -> OperationResult {
        self.run_install(path, version).await.into()
    }

    #[instrument(skip(self, args))]
    async fn instantiate_or_upgrade_chaincode(
        &self,
        org: &str,
        path: &str,
        version: &str,
        fcn: &str,
        args: Vec<String>,
        upgrade: bool,
    ) -> OperationResult {
        self.run_instantiate(org, path, version, fcn, args, upgrade)
            .await
            .into()
    }

    #[instrument(skip(self, args))]
    async fn invoke(
        &self,
        org: &str,
        version: &str,
        fcn: &str,
        args: Vec<String>,
        user: Option<&str>,
    ) -> OperationResult {
        self.run_invoke(org, version, fcn, args, user).await.into()
    }

    #[instrument(skip(self, args))]
    async fn query(
        &self,
        org: &str,
        version: &str,
        fcn: &str,
        args: Vec<String>,
        user: Option<&str>,
    ) -> OperationResult {
        self.run_query(org, version, fcn, args, user).await.into()
    }
}
