//! # Channel and Chaincode Lifecycle Scenarios
//!
//! Create/update channel, join peers, install and instantiate chaincode -
//! the sequential per-organization flows and their confirmation waits.

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use tn_middleware::ports::outbound::PeerBehavior;
    use tn_middleware::{BlockEvent, MiddlewareApi, MiddlewareConfig, PeerEvent};

    use crate::fixtures::{test_network, test_network_with_config, TestNetwork, ORGS};

    /// A testing config pointing at a real channel config artifact on disk.
    fn network_with_channel_artifact() -> (TestNetwork, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("channel.tx");
        std::fs::write(&artifact, b"configtx-envelope").unwrap();
        let mut config = MiddlewareConfig::for_testing();
        config.channel_config_path = artifact;
        (test_network_with_config(config), dir)
    }

    // =========================================================================
    // CREATE / UPDATE CHANNEL
    // =========================================================================

    /// Every org admin signs in topology order, the orderer admin signs
    /// last, and the channel exists afterwards.
    #[tokio::test]
    async fn test_create_channel_happy_path() {
        let (network, _dir) = network_with_channel_artifact();
        let result = network.service.create_channel("tradechannel").await;

        assert!(result.success, "{}", result.message);
        assert_eq!(
            network.identities.config_signers.lock().as_slice(),
            &["carrierorg", "exporterorg", "importerorg", "regulatororg", "orderer"]
        );
        assert!(network.orderer.has_channel("tradechannel"));
        assert_eq!(network.orderer.channel_updates.lock().len(), 1);
    }

    /// Creating a channel that already exists short-circuits to success
    /// without a submission.
    #[tokio::test]
    async fn test_create_channel_already_exists() {
        let (network, _dir) = network_with_channel_artifact();
        network.orderer.add_channel("tradechannel");

        let result = network.service.create_channel("tradechannel").await;
        assert!(result.success);
        assert!(result.message.contains("already exists"));
        assert!(network.orderer.channel_updates.lock().is_empty());
        // The orderer admin never signed: only the four org admins did.
        assert_eq!(network.identities.config_signers.lock().len(), 4);
    }

    /// A missing channel config artifact fails fast, before any signature
    /// collection.
    #[tokio::test]
    async fn test_create_channel_missing_artifact() {
        let network = test_network();
        let result = network.service.create_channel("tradechannel").await;
        assert!(!result.success);
        assert!(result.message.contains("failed to read"));
        assert!(network.identities.config_signers.lock().is_empty());
    }

    /// An empty channel name is rejected before any work happens.
    #[tokio::test]
    async fn test_create_channel_requires_name() {
        let (network, _dir) = network_with_channel_artifact();
        let result = network.service.create_channel("").await;
        assert!(!result.success);
        assert!(result.message.contains("'channelName'"));
    }

    /// Updating an existing channel collects signatures from the org admins
    /// only and submits the supplied artifact.
    #[tokio::test]
    async fn test_update_channel_happy_path() {
        let network = test_network();
        network.orderer.add_channel("tradechannel");

        let result = network
            .service
            .update_channel("tradechannel", b"config-update-delta")
            .await;
        assert!(result.success, "{}", result.message);
        assert_eq!(
            network.identities.config_signers.lock().as_slice(),
            &["carrierorg", "exporterorg", "importerorg", "regulatororg"]
        );
        assert_eq!(network.orderer.channel_updates.lock().len(), 1);
    }

    /// Updating a channel that does not exist fails on the config fetch.
    #[tokio::test]
    async fn test_update_channel_unknown_channel() {
        let network = test_network();
        let result = network
            .service
            .update_channel("tradechannel", b"config-update-delta")
            .await;
        assert!(!result.success);
        assert!(result.message.contains("does not exist"));
        assert!(network.identities.config_signers.lock().is_empty());
    }

    // =========================================================================
    // JOIN CHANNEL
    // =========================================================================

    fn queue_join_block(network: &TestNetwork, org: &str, channel: &str) {
        network.events.queue_event(
            org,
            PeerEvent::Block(BlockEvent {
                channel_id: channel.to_string(),
                tx_count: 1,
            }),
        );
    }

    /// Join sends the genesis block to every peer of the org and waits for
    /// the config-block confirmation.
    #[tokio::test]
    async fn test_join_channel_happy_path() {
        let network = test_network();
        network.orderer.add_channel("tradechannel");
        queue_join_block(&network, "exporterorg", "tradechannel");

        let result = network.service.join_channel("exporterorg").await;
        assert!(result.success, "{}", result.message);
        assert_eq!(
            network.gateway.joins.lock().as_slice(),
            &["exporterorg/peer0".to_string()]
        );
        assert_eq!(network.events.open_subscriptions("exporterorg"), 0);
    }

    /// Joining before the channel exists fails on the genesis fetch, before
    /// any peer is contacted.
    #[tokio::test]
    async fn test_join_channel_without_channel() {
        let network = test_network();
        let result = network.service.join_channel("exporterorg").await;
        assert!(!result.success);
        assert!(result.message.contains("does not exist"));
        assert!(network.gateway.joins.lock().is_empty());
    }

    /// No confirmation block within the join window: the operation fails
    /// with a timeout, at or after the window.
    #[tokio::test]
    async fn test_join_channel_block_timeout() {
        let network = test_network();
        network.orderer.add_channel("tradechannel");

        let started = Instant::now();
        let result = network.service.join_channel("exporterorg").await;
        assert!(!result.success);
        assert!(result.message.contains("timed out"));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    /// A confirmation block for a different channel is a hard failure, not a
    /// timeout.
    #[tokio::test]
    async fn test_join_channel_wrong_channel_block() {
        let network = test_network();
        network.orderer.add_channel("tradechannel");
        queue_join_block(&network, "exporterorg", "someotherchannel");

        let result = network.service.join_channel("exporterorg").await;
        assert!(!result.success);
        assert!(result.message.contains("someotherchannel"));
        assert!(!result.message.contains("timed out"));
    }

    /// A peer that rejects the join request fails the operation with
    /// per-peer detail.
    #[tokio::test]
    async fn test_join_channel_peer_rejection() {
        let network = test_network();
        network.orderer.add_channel("tradechannel");
        queue_join_block(&network, "exporterorg", "tradechannel");
        network.gateway.set_behavior(
            "exporterorg",
            "peer0",
            PeerBehavior::failing(500, "already joined a different ledger"),
        );

        let result = network.service.join_channel("exporterorg").await;
        assert!(!result.success);
        assert!(result.message.contains("peer0"));
    }

    /// An unknown organization is rejected before any network call.
    #[tokio::test]
    async fn test_join_channel_unknown_org() {
        let network = test_network();
        network.orderer.add_channel("tradechannel");
        let result = network.service.join_channel("ghostorg").await;
        assert!(!result.success);
        assert!(result.message.contains("ghostorg"));
        assert!(network.gateway.joins.lock().is_empty());
    }

    /// The convenience walk joins every organization in topology order.
    #[tokio::test]
    async fn test_join_all_organizations_in_order() {
        let network = test_network();
        network.orderer.add_channel("tradechannel");
        for (org, _) in ORGS {
            queue_join_block(&network, org, "tradechannel");
        }

        let result = network.service.join_all_organizations().await;
        assert!(result.success, "{}", result.message);
        assert_eq!(
            network.gateway.joins.lock().as_slice(),
            &[
                "carrierorg/peer0".to_string(),
                "exporterorg/peer0".to_string(),
                "importerorg/peer0".to_string(),
                "regulatororg/peer0".to_string(),
            ]
        );
    }

    // =========================================================================
    // INSTALL CHAINCODE
    // =========================================================================

    /// Install walks organizations sequentially in fixed order; every peer
    /// must accept.
    #[tokio::test]
    async fn test_install_chaincode_happy_path() {
        let network = test_network();
        let result = network
            .service
            .install_chaincode("github.com/trade_workflow", "v0")
            .await;
        assert!(result.success, "{}", result.message);

        let proposals = network.gateway.proposals.lock();
        let peers: Vec<&str> = proposals.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(
            peers,
            vec![
                "carrierorg/peer0",
                "exporterorg/peer0",
                "importerorg/peer0",
                "regulatororg/peer0"
            ]
        );
        assert!(network.orderer.broadcasts.lock().is_empty());
    }

    /// A failing peer stops the walk: later organizations are never
    /// contacted and the failure names the peer.
    #[tokio::test]
    async fn test_install_chaincode_stops_on_first_failure() {
        let network = test_network();
        network.gateway.set_behavior(
            "exporterorg",
            "peer0",
            PeerBehavior::failing(500, "disk full"),
        );

        let result = network
            .service
            .install_chaincode("github.com/trade_workflow", "v0")
            .await;
        assert!(!result.success);
        assert!(result.message.contains("exporterorg"));

        let proposals = network.gateway.proposals.lock();
        // carrierorg succeeded, exporterorg failed, the rest never ran.
        assert_eq!(proposals.len(), 2);
    }

    /// Missing path or version fail fast.
    #[tokio::test]
    async fn test_install_chaincode_requires_inputs() {
        let network = test_network();
        let result = network.service.install_chaincode("", "v0").await;
        assert!(!result.success);
        assert!(result.message.contains("'chaincodePath'"));

        let result = network
            .service
            .install_chaincode("github.com/trade_workflow", "")
            .await;
        assert!(!result.success);
        assert!(result.message.contains("'chaincodeVersion'"));
        assert!(network.gateway.proposals.lock().is_empty());
    }

    // =========================================================================
    // INSTANTIATE / UPGRADE CHAINCODE
    // =========================================================================

    /// Instantiate endorses on every org's anchor peer, submits, and waits
    /// for commit confirmation from every org.
    #[tokio::test]
    async fn test_instantiate_chaincode_happy_path() {
        let network = test_network();
        let result = network
            .service
            .instantiate_or_upgrade_chaincode(
                "importerorg",
                "github.com/trade_workflow",
                "v0",
                "init",
                vec!["exporter".to_string(), "importer".to_string()],
                false,
            )
            .await;

        assert!(result.success, "{}", result.message);
        assert!(result.message.contains("instantiate"));
        assert_eq!(network.gateway.proposals.lock().len(), 4);
        assert_eq!(network.orderer.broadcasts.lock().len(), 1);

        // Subscriptions were live before the broadcast here too.
        let broadcast_at = network.log.first_index_of("broadcast").unwrap();
        let entries = network.log.entries();
        assert!(entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.starts_with("subscribe:"))
            .all(|(i, _)| i < broadcast_at));
    }

    /// Upgrade is the same flow under a different verb.
    #[tokio::test]
    async fn test_upgrade_chaincode_happy_path() {
        let network = test_network();
        let result = network
            .service
            .instantiate_or_upgrade_chaincode(
                "importerorg",
                "github.com/trade_workflow_v1",
                "v1",
                "init",
                vec![],
                true,
            )
            .await;
        assert!(result.success, "{}", result.message);
        assert!(result.message.contains("upgrade"));
    }

    /// An endorsement shortfall on instantiate never reaches the orderer.
    #[tokio::test]
    async fn test_instantiate_shortfall_never_submits() {
        let network = test_network();
        network.gateway.set_behavior(
            "regulatororg",
            "peer0",
            PeerBehavior::failing(500, "build failed"),
        );

        let result = network
            .service
            .instantiate_or_upgrade_chaincode(
                "importerorg",
                "github.com/trade_workflow",
                "v0",
                "init",
                vec![],
                false,
            )
            .await;
        assert!(!result.success);
        assert!(result.message.contains("RegulatorOrgMSP"));
        assert!(network.orderer.broadcasts.lock().is_empty());
    }
}
