//! # Transaction Flow Scenarios
//!
//! End-to-end invoke and query flows over the mock network: endorsement
//! fan-out, policy evaluation, ordering submission, and the per-organization
//! commit waits, including the partial-failure and timeout paths.

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use tn_middleware::ports::outbound::PeerBehavior;
    use tn_middleware::{MiddlewareApi, ReadWriteSet, SubmitAck, SubmitStatus, ValidityCode};

    use crate::fixtures::{test_network, ORGS};

    // =========================================================================
    // INVOKE: HAPPY PATH
    // =========================================================================

    /// Four organizations, all-members policy, all peers return 200 with
    /// identical footprints, orderer acks SUCCESS, every org reports
    /// COMMITTED.
    #[tokio::test]
    async fn test_invoke_happy_path_commits_on_all_orgs() {
        let network = test_network();
        let result = network
            .service
            .invoke(
                "exporterorg",
                "v0",
                "acceptTrade",
                vec!["trade-1".to_string()],
                None,
            )
            .await;

        assert!(result.success, "{}", result.message);
        assert!(result.message.contains("committed"));
        assert_eq!(network.gateway.proposals.lock().len(), 4);
        assert_eq!(network.orderer.broadcasts.lock().len(), 1);
    }

    /// Commit subscriptions for every organization are live before the
    /// transaction is handed to the ordering service, and the broadcast only
    /// happens after every proposal round trip.
    #[tokio::test]
    async fn test_subscriptions_attach_before_submission() {
        let network = test_network();
        let result = network
            .service
            .invoke("importerorg", "v0", "requestTrade", vec![], None)
            .await;
        assert!(result.success, "{}", result.message);

        let broadcast_at = network.log.first_index_of("broadcast").unwrap();
        let entries = network.log.entries();
        let subscribes: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.starts_with("subscribe:"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(subscribes.len(), 4);
        assert!(subscribes.iter().all(|i| *i < broadcast_at));

        let proposes: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.starts_with("propose:"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(proposes.len(), 4);
        assert!(proposes.iter().all(|i| *i < broadcast_at));
    }

    /// The same transaction id flows through proposal, submission, and the
    /// commit notifications.
    #[tokio::test]
    async fn test_one_transaction_id_end_to_end() {
        let network = test_network();
        let result = network
            .service
            .invoke("carrierorg", "v0", "acceptShipment", vec![], None)
            .await;
        assert!(result.success, "{}", result.message);

        let proposals = network.gateway.proposals.lock();
        let tx_id = proposals[0].1;
        assert!(proposals.iter().all(|(_, id)| *id == tx_id));
        assert_eq!(network.orderer.broadcasts.lock().as_slice(), &[tx_id]);
        assert!(result.message.contains(&tx_id.to_string()));
    }

    // =========================================================================
    // INVOKE: ENDORSEMENT FAILURES
    // =========================================================================

    /// One peer returns 500 under the all-members policy: the operation
    /// fails with a policy violation naming the missing org, and nothing is
    /// ever submitted for ordering.
    #[tokio::test]
    async fn test_endorsement_shortfall_never_reaches_the_orderer() {
        let network = test_network();
        network.gateway.set_behavior(
            "carrierorg",
            "peer0",
            PeerBehavior::failing(500, "chaincode panic"),
        );

        let result = network
            .service
            .invoke("exporterorg", "v0", "acceptTrade", vec![], None)
            .await;

        assert!(!result.success);
        assert!(result.message.contains("CarrierOrgMSP"), "{}", result.message);
        assert!(network.orderer.broadcasts.lock().is_empty());
        assert!(network.log.first_index_of("broadcast").is_none());
    }

    /// An unreachable peer is a bad entry like any other: with an
    /// all-members policy the operation fails before submission.
    #[tokio::test]
    async fn test_unreachable_peer_fails_policy() {
        let network = test_network();
        network.gateway.set_behavior(
            "regulatororg",
            "peer0",
            PeerBehavior {
                unreachable: true,
                ..PeerBehavior::default()
            },
        );

        let result = network
            .service
            .invoke("exporterorg", "v0", "acceptTrade", vec![], None)
            .await;
        assert!(!result.success);
        assert!(result.message.contains("RegulatorOrgMSP"));
        assert!(network.orderer.broadcasts.lock().is_empty());
    }

    /// Two peers return 200 but with diverging read/write sets: the
    /// operation fails with the mismatch error, before submission.
    #[tokio::test]
    async fn test_footprint_divergence_fails_before_submission() {
        let network = test_network();
        network.gateway.set_behavior(
            "importerorg",
            "peer0",
            PeerBehavior::with_read_write_set(ReadWriteSet::single_write("trade-1", "DIVERGED")),
        );

        let result = network
            .service
            .invoke("exporterorg", "v0", "acceptTrade", vec![], None)
            .await;
        assert!(!result.success);
        assert!(result.message.contains("do not match"), "{}", result.message);
        assert!(network.orderer.broadcasts.lock().is_empty());
    }

    /// A response whose endorsement signature does not verify is bad even
    /// when the status is 200.
    #[tokio::test]
    async fn test_invalid_endorsement_signature_fails_policy() {
        let network = test_network();
        network.verifier.reject_msp("ImporterOrgMSP");

        let result = network
            .service
            .invoke("exporterorg", "v0", "acceptTrade", vec![], None)
            .await;
        assert!(!result.success);
        assert!(result.message.contains("ImporterOrgMSP"));
        assert!(network.orderer.broadcasts.lock().is_empty());
    }

    // =========================================================================
    // INVOKE: SUBMISSION AND COMMIT FAILURES
    // =========================================================================

    /// A non-SUCCESS orderer ack fails the operation.
    #[tokio::test]
    async fn test_orderer_rejection_fails_the_operation() {
        let network = test_network();
        network.orderer.set_ack(SubmitAck {
            status: SubmitStatus::ServiceUnavailable,
            info: "maintenance".to_string(),
        });

        let result = network
            .service
            .invoke("exporterorg", "v0", "acceptTrade", vec![], None)
            .await;
        assert!(!result.success);
        assert!(result.message.contains("SERVICE_UNAVAILABLE"));
    }

    /// An unreachable orderer fails the operation with transport detail.
    #[tokio::test]
    async fn test_orderer_unreachable_fails_the_operation() {
        let network = test_network();
        network.orderer.set_unreachable();

        let result = network
            .service
            .invoke("exporterorg", "v0", "acceptTrade", vec![], None)
            .await;
        assert!(!result.success);
        assert!(result.message.contains("unreachable"));
    }

    /// Endorsement and submission succeed but one organization's stream
    /// stays silent: the operation fails with a commit timeout naming that
    /// org, at or after the configured window.
    #[tokio::test]
    async fn test_commit_timeout_on_silent_org() {
        let network = test_network();
        network.events.set_silent("regulatororg");

        let started = Instant::now();
        let result = network
            .service
            .invoke("exporterorg", "v0", "acceptTrade", vec![], None)
            .await;

        assert!(!result.success);
        assert!(result.message.contains("timed out"), "{}", result.message);
        assert!(result.message.contains("regulatororg"));
        // The window is 200ms in the testing config; the timer must never
        // fire early.
        assert!(started.elapsed() >= Duration::from_millis(200));
        // Submission did happen; only confirmation was missing.
        assert_eq!(network.orderer.broadcasts.lock().len(), 1);
    }

    /// An explicit invalidation is reported as such, not as a timeout, and
    /// resolves without waiting for the window.
    #[tokio::test]
    async fn test_commit_invalidation_is_distinct_from_timeout() {
        let network = test_network();
        network
            .events
            .set_outcome("importerorg", ValidityCode::MvccReadConflict);

        let result = network
            .service
            .invoke("exporterorg", "v0", "acceptTrade", vec![], None)
            .await;
        assert!(!result.success);
        assert!(result.message.contains("invalidated"), "{}", result.message);
        assert!(result.message.contains("MVCC_READ_CONFLICT"));
        assert!(!result.message.contains("timed out"));
    }

    /// Once an operation resolves, its subscriptions are gone; a late
    /// duplicate notification has nobody to deliver to and cannot change
    /// the outcome.
    #[tokio::test]
    async fn test_commit_resolution_is_idempotent() {
        let network = test_network();
        let result = network
            .service
            .invoke("exporterorg", "v0", "acceptTrade", vec![], None)
            .await;
        assert!(result.success, "{}", result.message);

        let tx_id = network.orderer.broadcasts.lock()[0];
        for (org, _) in ORGS {
            assert_eq!(network.events.open_subscriptions(org), 0);
        }
        // A stale invalidation for the committed transaction is dropped.
        network
            .events
            .set_outcome("exporterorg", ValidityCode::BadPayload);
        network.events.complete_transaction(tx_id);
    }

    /// Subscriptions are released on failure paths too.
    #[tokio::test]
    async fn test_subscriptions_released_after_failure() {
        let network = test_network();
        network.gateway.set_behavior(
            "carrierorg",
            "peer0",
            PeerBehavior::failing(500, "chaincode panic"),
        );
        let result = network
            .service
            .invoke("exporterorg", "v0", "acceptTrade", vec![], None)
            .await;
        assert!(!result.success);
        for (org, _) in ORGS {
            assert_eq!(network.events.open_subscriptions(org), 0);
        }
    }

    // =========================================================================
    // QUERY
    // =========================================================================

    /// Both responding peers return "ACTIVE": the query succeeds with that
    /// payload and never touches the orderer or the event streams.
    #[tokio::test]
    async fn test_query_returns_agreed_payload() {
        let network = test_network();
        for (org, _) in ORGS {
            network
                .gateway
                .set_behavior(org, "peer0", PeerBehavior::with_payload("ACTIVE"));
        }

        let result = network
            .service
            .query(
                "importerorg",
                "v0",
                "getTradeStatus",
                vec!["trade-1".to_string()],
                Some("alice"),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.message, "ACTIVE");
        assert!(network.orderer.broadcasts.lock().is_empty());
        for (org, _) in ORGS {
            assert_eq!(network.events.open_subscriptions(org), 0);
        }
    }

    /// Diverging payloads fail the query.
    #[tokio::test]
    async fn test_query_payload_divergence_fails() {
        let network = test_network();
        for (org, _) in ORGS {
            network
                .gateway
                .set_behavior(org, "peer0", PeerBehavior::with_payload("ACTIVE"));
        }
        network
            .gateway
            .set_behavior("carrierorg", "peer0", PeerBehavior::with_payload("CLOSED"));

        let result = network
            .service
            .query("importerorg", "v0", "getTradeStatus", vec![], None)
            .await;
        assert!(!result.success);
        assert_eq!(result.message, "Responses from peers don't match");
    }

    /// A query tolerates a failed peer as long as the responding ones agree.
    #[tokio::test]
    async fn test_query_tolerates_partial_responses() {
        let network = test_network();
        for (org, _) in ORGS {
            network
                .gateway
                .set_behavior(org, "peer0", PeerBehavior::with_payload("ACTIVE"));
        }
        network.gateway.set_behavior(
            "regulatororg",
            "peer0",
            PeerBehavior {
                unreachable: true,
                ..PeerBehavior::default()
            },
        );

        let result = network
            .service
            .query("importerorg", "v0", "getTradeStatus", vec![], None)
            .await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.message, "ACTIVE");
    }

    // =========================================================================
    // CONCURRENCY
    // =========================================================================

    /// Two concurrent invokes do not interfere: each resolves against its
    /// own transaction id.
    #[tokio::test]
    async fn test_concurrent_invokes_are_isolated() {
        let network = test_network();
        let (first, second) = tokio::join!(
            network
                .service
                .invoke("exporterorg", "v0", "acceptTrade", vec!["trade-1".to_string()], None),
            network
                .service
                .invoke("importerorg", "v0", "requestTrade", vec!["trade-2".to_string()], None),
        );
        assert!(first.success, "{}", first.message);
        assert!(second.success, "{}", second.message);

        let broadcasts = network.orderer.broadcasts.lock();
        assert_eq!(broadcasts.len(), 2);
        assert_ne!(broadcasts[0], broadcasts[1]);
    }
}
