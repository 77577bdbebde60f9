use crate::quota::QuotaGateway;
use std::sync::Arc;
use tracing::{info, warn};

/// Re-fetches the authoritative remaining time after a session closes.
///
/// This is the one place where drift between the local countdown projection
/// and the authority's accounting is corrected. Best-effort: a failed fetch
/// keeps the last projection and leaves the retry to the next load event; it
/// never blocks the controller's return to idle.
pub struct QuotaReconciler {
    gateway: Arc<dyn QuotaGateway>,
    user_id: String,
}

impl QuotaReconciler {
    pub fn new(gateway: Arc<dyn QuotaGateway>, user_id: String) -> Self {
        Self { gateway, user_id }
    }

    /// Authoritative remaining seconds, or `None` when the authority could
    /// not be reached.
    pub async fn fetch_remaining(&self) -> Option<u64> {
        match self.gateway.get_remaining_seconds(&self.user_id).await {
            Ok(remaining) => {
                info!(
                    "Reconciled remaining time for user {}: {}s",
                    self.user_id, remaining
                );
                Some(remaining)
            }
            Err(err) => {
                warn!(
                    "Quota reconciliation failed for user {}: {}; keeping last projection",
                    self.user_id, err
                );
                None
            }
        }
    }
}
