use crate::context::ConversationContext;
use crate::error::MeteringError;
use crate::quota::QuotaGateway;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Quota authority client shared by every context
    pub gateway: Arc<dyn QuotaGateway>,

    /// Open conversation contexts (user_id → context)
    pub contexts: Arc<RwLock<HashMap<String, Arc<ConversationContext>>>>,
}

/// Why a start command was refused at the registry level.
#[derive(Debug, thiserror::Error)]
pub enum StartConversationError {
    /// The user already has a live session in another conversation
    #[error("user already has a session in conversation {conversation_id}")]
    Busy { conversation_id: String },

    /// The controller refused the start or the authority failed it
    #[error(transparent)]
    Metering(#[from] MeteringError),
}

impl AppState {
    pub fn new(gateway: Arc<dyn QuotaGateway>) -> Self {
        Self {
            gateway,
            contexts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolve the user's context and start a session on it.
    ///
    /// The registry's write lock is held across the whole operation, so
    /// concurrent starts for one user serialize: a context can only start a
    /// session while it is the registered context for that user. A context
    /// displaced here is idle and stays idle, which keeps the authority at
    /// no more than one open session per user. The lock hold is bounded by
    /// the gateway call timeouts.
    pub async fn start_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Arc<ConversationContext>, StartConversationError> {
        let mut contexts = self.contexts.write().await;

        let context = match contexts.get(user_id).cloned() {
            // Same conversation: reuse the context; a start under a live
            // session is the controller's no-op
            Some(ctx) if ctx.conversation_id() == conversation_id => ctx,
            Some(ctx) => {
                let snapshot = ctx.controller().snapshot().await;
                if snapshot.is_recording || snapshot.is_processing {
                    return Err(StartConversationError::Busy {
                        conversation_id: ctx.conversation_id().to_string(),
                    });
                }

                // Idle context left over from an earlier conversation
                let fresh =
                    ConversationContext::open(self.gateway.clone(), user_id, conversation_id)
                        .await;
                contexts.insert(user_id.to_string(), Arc::clone(&fresh));
                fresh
            }
            None => {
                let fresh =
                    ConversationContext::open(self.gateway.clone(), user_id, conversation_id)
                        .await;
                contexts.insert(user_id.to_string(), Arc::clone(&fresh));
                fresh
            }
        };

        context.controller().start_recording().await?;

        Ok(context)
    }
}
