//! # Middleware Configuration
//!
//! Two pieces of static configuration feed every operation:
//!
//! - [`MiddlewareConfig`]: timeouts, the channel/chaincode naming, and the
//!   per-organization credential store layout.
//! - [`NetworkTopology`]: the organization → endpoints map loaded from JSON
//!   and validated at load time. Structural problems fail here, before any
//!   operation runs, not deep inside a flow.
//!
//! Organizations are kept in a `BTreeMap`, so every sequential per-org loop
//! (signature collection, joins, installs) iterates in a fixed order and the
//! flows stay reproducible.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{Channel, MiddlewareError, PeerTarget};

/// Default commit-confirmation window for deploy/invoke flows.
pub const DEFAULT_COMMIT_TIMEOUT_MS: u64 = 300_000;
/// Default window for the channel-join block confirmation.
pub const DEFAULT_JOIN_BLOCK_TIMEOUT_MS: u64 = 40_000;
/// Default per-request timeout for proposal round trips.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60_000;
/// Default timeout for instantiate/upgrade proposals (chaincode builds take
/// a while on the peer).
pub const DEFAULT_DEPLOY_PROPOSAL_TIMEOUT_MS: u64 = 300_000;

/// Operational settings for the middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Channel every operation targets.
    pub channel_name: String,
    /// Chaincode deployed and invoked on that channel.
    pub chaincode_id: String,
    /// Per-request timeout for proposal round trips, in milliseconds.
    pub request_timeout_ms: u64,
    /// Timeout for instantiate/upgrade proposals, in milliseconds.
    pub deploy_proposal_timeout_ms: u64,
    /// Commit-confirmation window, in milliseconds.
    pub commit_timeout_ms: u64,
    /// Join block-confirmation window, in milliseconds.
    pub join_block_timeout_ms: u64,
    /// Settle delay after a successful channel create/update, in
    /// milliseconds, giving the ordering service time to serve the new
    /// configuration.
    pub channel_grace_ms: u64,
    /// Root directory for per-organization credential stores.
    pub store_root: PathBuf,
    /// Channel configuration artifact submitted on channel creation.
    pub channel_config_path: PathBuf,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            channel_name: "tradechannel".to_string(),
            chaincode_id: "tradecc".to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            deploy_proposal_timeout_ms: DEFAULT_DEPLOY_PROPOSAL_TIMEOUT_MS,
            commit_timeout_ms: DEFAULT_COMMIT_TIMEOUT_MS,
            join_block_timeout_ms: DEFAULT_JOIN_BLOCK_TIMEOUT_MS,
            channel_grace_ms: 5_000,
            store_root: PathBuf::from("../network/client-certs"),
            channel_config_path: PathBuf::from("../network/channel-artifacts/channel.tx"),
        }
    }
}

impl MiddlewareConfig {
    /// Config for tests: same structure, millisecond-scale timers, no grace
    /// delay.
    pub fn for_testing() -> Self {
        Self {
            request_timeout_ms: 500,
            deploy_proposal_timeout_ms: 500,
            commit_timeout_ms: 200,
            join_block_timeout_ms: 200,
            channel_grace_ms: 0,
            store_root: std::env::temp_dir().join("tn-client-certs"),
            ..Self::default()
        }
    }

    /// Credential store directory for one organization.
    ///
    /// Concurrent operations for different organizations must not share
    /// state-store locations, so each org gets its own directory.
    pub fn store_path_for_org(&self, org: &str) -> PathBuf {
        self.store_root.join(format!("kvs_{org}"))
    }

    /// Commit-confirmation window as a [`Duration`].
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }

    /// Join block-confirmation window as a [`Duration`].
    pub fn join_block_timeout(&self) -> Duration {
        Duration::from_millis(self.join_block_timeout_ms)
    }

    /// Proposal round-trip timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Deploy-proposal timeout as a [`Duration`].
    pub fn deploy_proposal_timeout(&self) -> Duration {
        Duration::from_millis(self.deploy_proposal_timeout_ms)
    }
}

/// One peer endpoint of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEndpoint {
    /// Peer name within the organization (e.g. `peer0`).
    pub name: String,
    /// Request (endorsement) endpoint.
    pub requests: String,
    /// Event-stream endpoint.
    pub events: String,
    /// TLS root certificate path for the peer.
    pub tls_ca_cert: PathBuf,
    /// Hostname to verify in the peer's TLS certificate.
    pub server_hostname: String,
}

/// One member organization of the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgConfig {
    /// Display name of the organization.
    pub name: String,
    /// Membership service provider id.
    pub msp_id: String,
    /// Certificate-authority endpoint for enrollment.
    pub ca_url: String,
    /// The organization's peers, in declared order.
    pub peers: Vec<PeerEndpoint>,
}

/// The ordering service of the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrdererConfig {
    /// Ordering endpoint.
    pub url: String,
    /// Membership id of the ordering organization.
    pub msp_id: String,
    /// TLS root certificate path for the orderer.
    pub tls_ca_cert: PathBuf,
    /// Hostname to verify in the orderer's TLS certificate.
    pub server_hostname: String,
}

/// Static network topology: organizations, their peers, and the orderer.
///
/// Read-only to this crate; loaded once per operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkTopology {
    /// Network identifier the topology describes.
    pub network_id: String,
    /// The ordering service.
    pub orderer: OrdererConfig,
    /// Member organizations, keyed by organization name. `BTreeMap` keeps
    /// iteration order fixed.
    pub orgs: BTreeMap<String, OrgConfig>,
}

impl NetworkTopology {
    /// Parse and validate a topology from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, MiddlewareError> {
        let topology: NetworkTopology = serde_json::from_str(json)
            .map_err(|e| MiddlewareError::Config(format!("failed to parse topology: {e}")))?;
        topology.validate()?;
        Ok(topology)
    }

    /// Load and validate a topology from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, MiddlewareError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            MiddlewareError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Structural validation: every organization needs a membership id and at
    /// least one peer with populated endpoints; the orderer needs an
    /// endpoint and a membership id.
    pub fn validate(&self) -> Result<(), MiddlewareError> {
        if self.orgs.is_empty() {
            return Err(MiddlewareError::Config(
                "topology declares no organizations".to_string(),
            ));
        }
        if self.orderer.url.is_empty() || self.orderer.msp_id.is_empty() {
            return Err(MiddlewareError::Config(
                "orderer url and msp_id are required".to_string(),
            ));
        }
        for (key, org) in &self.orgs {
            if org.msp_id.is_empty() {
                return Err(MiddlewareError::Config(format!(
                    "organization {key} has no msp_id"
                )));
            }
            if org.peers.is_empty() {
                return Err(MiddlewareError::Config(format!(
                    "organization {key} has no peers"
                )));
            }
            for peer in &org.peers {
                if peer.requests.is_empty() || peer.events.is_empty() {
                    return Err(MiddlewareError::Config(format!(
                        "peer {} of {key} has empty endpoints",
                        peer.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Organization names in fixed iteration order.
    pub fn org_names(&self) -> impl Iterator<Item = &str> {
        self.orgs.keys().map(String::as_str)
    }

    /// Look up an organization by name.
    pub fn org(&self, name: &str) -> Result<&OrgConfig, MiddlewareError> {
        self.orgs
            .get(name)
            .ok_or_else(|| MiddlewareError::UnknownOrg(name.to_string()))
    }

    /// One [`PeerTarget`] per organization: its first declared peer.
    ///
    /// Invoke/query/deploy flows endorse against this set.
    pub fn anchor_targets(&self) -> Vec<PeerTarget> {
        self.orgs
            .iter()
            .filter_map(|(key, org)| {
                org.peers.first().map(|peer| PeerTarget {
                    org: key.clone(),
                    msp_id: org.msp_id.clone(),
                    name: peer.name.clone(),
                    endpoint: peer.requests.clone(),
                })
            })
            .collect()
    }

    /// All peers of one organization as [`PeerTarget`]s (join/install flows).
    pub fn org_targets(&self, name: &str) -> Result<Vec<PeerTarget>, MiddlewareError> {
        let org = self.org(name)?;
        Ok(org
            .peers
            .iter()
            .map(|peer| PeerTarget {
                org: name.to_string(),
                msp_id: org.msp_id.clone(),
                name: peer.name.clone(),
                endpoint: peer.requests.clone(),
            })
            .collect())
    }

    /// Membership ids of all organizations, in fixed order.
    pub fn msp_ids(&self) -> Vec<String> {
        self.orgs.values().map(|org| org.msp_id.clone()).collect()
    }

    /// Construct the per-operation channel view over the given targets.
    pub fn channel(&self, name: &str, targets: Vec<PeerTarget>) -> Channel {
        Channel {
            name: name.to_string(),
            orderer_endpoint: self.orderer.url.clone(),
            targets,
        }
    }
}
