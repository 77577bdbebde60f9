use crate::quota::QuotaGateway;
use crate::session::SessionController;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the metering subsystem needs for one authenticated user's
/// conversation: the quota gateway handle and the session controller (which
/// in turn owns the countdown timer). Constructed explicitly per user and
/// dropped with the user's session scope; never a process-wide global.
pub struct ConversationContext {
    user_id: String,
    conversation_id: String,
    gateway: Arc<dyn QuotaGateway>,
    controller: Arc<SessionController>,
}

impl ConversationContext {
    /// Build the context and prime the countdown projection from the
    /// authority.
    ///
    /// The initial load is best-effort: on failure the projection stays at
    /// its default and refreshes on the next load event.
    pub async fn open(
        gateway: Arc<dyn QuotaGateway>,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Arc<Self> {
        let user_id = user_id.into();
        let conversation_id = conversation_id.into();

        info!(
            "Opening conversation context for user {} (conversation {})",
            user_id, conversation_id
        );

        let controller = SessionController::new(
            Arc::clone(&gateway),
            user_id.clone(),
            conversation_id.clone(),
        );

        if let Err(err) = controller.load_remaining_time().await {
            warn!(
                "Initial quota load failed for user {}: {}; projection deferred",
                user_id, err
            );
        }

        Arc::new(Self {
            user_id,
            conversation_id,
            gateway,
            controller,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn controller(&self) -> &Arc<SessionController> {
        &self.controller
    }

    pub fn gateway(&self) -> &Arc<dyn QuotaGateway> {
        &self.gateway
    }
}
