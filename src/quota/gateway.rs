use crate::error::MeteringError;
use crate::quota::messages::UserQuotaState;
use async_trait::async_trait;

/// Interface to the remote quota-of-record authority.
///
/// Every operation is a single asynchronous round trip with no internal
/// retries; retry policy belongs to the caller. Implementations must be
/// shareable across tasks.
#[async_trait]
pub trait QuotaGateway: Send + Sync {
    /// Seconds left in the user's monthly conversation budget.
    async fn get_remaining_seconds(&self, user_id: &str) -> Result<u64, MeteringError>;

    /// Whether the user is still inside the monthly elapsed-time budget.
    async fn check_monthly_limit(&self, user_id: &str) -> Result<bool, MeteringError>;

    /// Whether the user is still inside the daily interaction budget.
    async fn check_daily_limit(&self, user_id: &str) -> Result<bool, MeteringError>;

    /// Open a session on the authority; returns the issued session id.
    async fn start_session(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<String, MeteringError>;

    /// Close a session on the authority; returns the authoritative elapsed
    /// seconds it recorded for the interval.
    async fn end_session(&self, session_id: &str) -> Result<u64, MeteringError>;

    /// Full accounting row for the user, for status display.
    async fn get_usage(&self, user_id: &str) -> Result<UserQuotaState, MeteringError>;
}
