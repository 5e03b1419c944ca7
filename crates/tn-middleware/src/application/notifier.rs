//! # Commit Notifier
//!
//! Owns the per-operation registry of commit-notification subscriptions:
//! one per organization whose confirmation the operation requires. Each
//! subscription is a single future resolved exactly once, by whichever comes
//! first of a matching notification or its timer. Per transaction the state
//! machine is `PENDING -> {COMMITTED | INVALIDATED | TIMED_OUT}`; all three
//! are terminal, and the subscription is released the moment one is reached,
//! so later duplicates cannot alter the outcome.
//!
//! Notifications for other transactions (or non-matching blocks) pass
//! through without consuming the subscription. Subscriptions are plain
//! receiving handles: dropping the notifier, on any exit path, releases
//! every stream.

use futures::future::try_join_all;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::domain::{MiddlewareError, PeerEvent, TransactionId, ValidityCode};
use crate::ports::outbound::{CommitEventSource, CommitSubscription};

/// Registry of live commit subscriptions for one operation.
pub struct CommitNotifier {
    subscriptions: Vec<CommitSubscription>,
}

impl CommitNotifier {
    /// Subscribe to every given organization's notification stream.
    ///
    /// Must be called before the transaction is submitted for ordering, so
    /// commitment cannot race ahead of the listeners.
    pub async fn subscribe_all<E>(
        source: &E,
        orgs: impl IntoIterator<Item = &str>,
    ) -> Result<Self, MiddlewareError>
    where
        E: CommitEventSource + ?Sized,
    {
        let mut subscriptions = Vec::new();
        for org in orgs {
            debug!(%org, "opening commit notification subscription");
            subscriptions.push(source.subscribe(org).await?);
        }
        Ok(Self { subscriptions })
    }

    /// Number of open subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Wait for every subscribed organization to confirm commitment of
    /// `tx_id` within `window`.
    ///
    /// The wait is a conjunction: all organizations must report the valid
    /// sentinel. The first observed failure resolves the whole wait; the
    /// remaining subscriptions are dropped, which unsubscribes them. A
    /// silent stream resolves to a timeout, an explicit non-valid code to an
    /// invalidation.
    pub async fn await_commit(
        self,
        tx_id: TransactionId,
        window: Duration,
    ) -> Result<(), MiddlewareError> {
        let waits = self
            .subscriptions
            .into_iter()
            .map(|sub| wait_for_transaction(sub, tx_id, window));
        try_join_all(waits).await?;
        Ok(())
    }

    /// Wait for every subscribed organization to report the channel's
    /// configuration block within `window` (channel-join confirmation).
    ///
    /// A config block carries exactly one transaction; blocks with any other
    /// transaction count are ignored. A block naming a different channel is
    /// a hard failure.
    pub async fn await_join_block(
        self,
        channel: &str,
        window: Duration,
    ) -> Result<(), MiddlewareError> {
        let waits = self
            .subscriptions
            .into_iter()
            .map(|sub| wait_for_join_block(sub, channel.to_string(), window));
        try_join_all(waits).await?;
        Ok(())
    }
}

/// Resolve one subscription against one transaction id.
async fn wait_for_transaction(
    mut sub: CommitSubscription,
    tx_id: TransactionId,
    window: Duration,
) -> Result<(), MiddlewareError> {
    let deadline = Instant::now() + window;
    loop {
        let event = match timeout_at(deadline, sub.recv()).await {
            Err(_) => {
                warn!(org = %sub.org(), %tx_id, "no commit notification within the window");
                return Err(MiddlewareError::CommitTimeout {
                    org: sub.org().to_string(),
                    timeout_ms: window.as_millis() as u64,
                });
            }
            Ok(None) => {
                return Err(MiddlewareError::Network(format!(
                    "notification stream for {} closed",
                    sub.org()
                )))
            }
            Ok(Some(event)) => event,
        };

        match event {
            PeerEvent::Transaction(outcome) if outcome.tx_id == tx_id => {
                return if outcome.code == ValidityCode::Valid {
                    info!(org = %sub.org(), %tx_id, "transaction committed");
                    Ok(())
                } else {
                    warn!(org = %sub.org(), %tx_id, code = %outcome.code, "transaction invalidated");
                    Err(MiddlewareError::CommitInvalidated {
                        org: sub.org().to_string(),
                        code: outcome.code,
                    })
                };
            }
            // Different transaction or a block event: not ours, keep waiting.
            _ => continue,
        }
    }
}

/// Resolve one subscription against the join confirmation block.
async fn wait_for_join_block(
    mut sub: CommitSubscription,
    channel: String,
    window: Duration,
) -> Result<(), MiddlewareError> {
    let deadline = Instant::now() + window;
    loop {
        let event = match timeout_at(deadline, sub.recv()).await {
            Err(_) => {
                return Err(MiddlewareError::CommitTimeout {
                    org: sub.org().to_string(),
                    timeout_ms: window.as_millis() as u64,
                })
            }
            Ok(None) => {
                return Err(MiddlewareError::Network(format!(
                    "notification stream for {} closed",
                    sub.org()
                )))
            }
            Ok(Some(event)) => event,
        };

        match event {
            PeerEvent::Block(block) if block.tx_count == 1 => {
                return if block.channel_id == channel {
                    info!(org = %sub.org(), %channel, "channel join confirmed");
                    Ok(())
                } else {
                    Err(MiddlewareError::Network(format!(
                        "configuration block was for channel {}, expected {channel}",
                        block.channel_id
                    )))
                };
            }
            _ => continue,
        }
    }
}
