//! # Inbound Ports
//!
//! The caller-facing operation surface, exercised by the REST/CLI layer that
//! sits outside this crate. Every method returns an [`OperationResult`];
//! no error value ever crosses this boundary.

use async_trait::async_trait;

use crate::domain::MiddlewareError;

/// Uniform result shape handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    /// Did the operation succeed end to end?
    pub success: bool,
    /// Outcome message: the result value or the failure reason.
    pub message: String,
}

impl OperationResult {
    /// Successful result with a message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Failed result with a message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<Result<String, MiddlewareError>> for OperationResult {
    fn from(result: Result<String, MiddlewareError>) -> Self {
        match result {
            Ok(message) => OperationResult::ok(message),
            Err(err) => OperationResult::fail(err.to_string()),
        }
    }
}

/// The middleware operation surface.
#[async_trait]
pub trait MiddlewareApi: Send + Sync {
    /// Create the named channel: collect an admin config signature from every
    /// organization, then submit the signed configuration to the ordering
    /// service. Succeeds immediately if the channel already exists.
    async fn create_channel(&self, name: &str) -> OperationResult;

    /// Apply a channel configuration update: every organization admin signs
    /// the supplied update artifact before submission.
    async fn update_channel(&self, name: &str, config_update: &[u8]) -> OperationResult;

    /// Join all peers of one organization to the channel, confirmed by a
    /// config-block event within the join window.
    async fn join_channel(&self, org: &str) -> OperationResult;

    /// Install the chaincode source on every peer of every organization.
    async fn install_chaincode(&self, path: &str, version: &str) -> OperationResult;

    /// Instantiate (or upgrade) the chaincode on the channel and wait for
    /// commit confirmation.
    #[allow(clippy::too_many_arguments)]
    async fn instantiate_or_upgrade_chaincode(
        &self,
        org: &str,
        path: &str,
        version: &str,
        fcn: &str,
        args: Vec<String>,
        upgrade: bool,
    ) -> OperationResult;

    /// Invoke a chaincode function as a user of `org` and wait for commit
    /// confirmation from every organization. `version` names the chaincode
    /// version the caller believes is live; the channel resolves the
    /// chaincode by id.
    async fn invoke(
        &self,
        org: &str,
        version: &str,
        fcn: &str,
        args: Vec<String>,
        user: Option<&str>,
    ) -> OperationResult;

    /// Query a chaincode function; returns the agreed payload. No ordering
    /// submission, no commit subscriptions.
    async fn query(
        &self,
        org: &str,
        version: &str,
        fcn: &str,
        args: Vec<String>,
        user: Option<&str>,
    ) -> OperationResult;
}
