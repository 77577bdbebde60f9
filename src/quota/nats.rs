use super::gateway::QuotaGateway;
use super::messages::{
    EndSessionReply, EndSessionRequest, ErrorReply, LimitCheckReply, RemainingSecondsReply,
    StartSessionReply, StartSessionRequest, UserQuotaState, UserRequest,
};
use crate::error::MeteringError;
use anyhow::{Context, Result};
use async_nats::Client;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Quota authority client speaking JSON request/reply over NATS.
///
/// Each call is bounded by `call_timeout`; a timed-out or failed round trip
/// maps to the operation's own error class, never to a hang.
pub struct NatsQuotaGateway {
    client: Client,
    subject_prefix: String,
    call_timeout: Duration,
}

impl NatsQuotaGateway {
    /// Connect to the NATS server the quota authority listens on
    pub async fn connect(
        url: &str,
        subject_prefix: String,
        call_timeout: Duration,
    ) -> Result<Self> {
        info!("Connecting to quota authority at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to quota authority");

        Ok(Self {
            client,
            subject_prefix,
            call_timeout,
        })
    }

    /// One bounded request/reply round trip. The `Err` value is a reason
    /// string; callers map it to the operation's error class.
    async fn call<Req, Reply>(&self, op: &str, req: &Req) -> Result<Reply, String>
    where
        Req: Serialize,
        Reply: DeserializeOwned,
    {
        let subject = format!("{}.{}", self.subject_prefix, op);

        let payload =
            serde_json::to_vec(req).map_err(|e| format!("failed to encode {op} request: {e}"))?;

        let response = tokio::time::timeout(
            self.call_timeout,
            self.client.request(subject, payload.into()),
        )
        .await
        .map_err(|_| format!("{op} timed out after {:?}", self.call_timeout))?
        .map_err(|e| format!("{op} transport error: {e}"))?;

        if let Ok(reply) = serde_json::from_slice::<Reply>(&response.payload) {
            return Ok(reply);
        }

        // Not a success reply; see if the authority sent its error envelope
        match serde_json::from_slice::<ErrorReply>(&response.payload) {
            Ok(reply) => Err(format!("{op} rejected by authority: {}", reply.error)),
            Err(_) => Err(format!("{op} returned an unparseable reply")),
        }
    }
}

#[async_trait]
impl QuotaGateway for NatsQuotaGateway {
    async fn get_remaining_seconds(&self, user_id: &str) -> Result<u64, MeteringError> {
        let req = UserRequest {
            user_id: user_id.to_string(),
        };
        let reply: RemainingSecondsReply = self
            .call("get_remaining_seconds", &req)
            .await
            .map_err(MeteringError::QuotaUnavailable)?;

        // Clamp at the wire so the non-negative invariant holds everywhere above
        Ok(reply.seconds.max(0) as u64)
    }

    async fn check_monthly_limit(&self, user_id: &str) -> Result<bool, MeteringError> {
        let req = UserRequest {
            user_id: user_id.to_string(),
        };
        let reply: LimitCheckReply = self
            .call("check_monthly_usage_limit", &req)
            .await
            .map_err(MeteringError::QuotaUnavailable)?;

        Ok(reply.allowed)
    }

    async fn check_daily_limit(&self, user_id: &str) -> Result<bool, MeteringError> {
        let req = UserRequest {
            user_id: user_id.to_string(),
        };
        let reply: LimitCheckReply = self
            .call("check_daily_message_limit", &req)
            .await
            .map_err(MeteringError::QuotaUnavailable)?;

        Ok(reply.allowed)
    }

    async fn start_session(
        &self,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<String, MeteringError> {
        let req = StartSessionRequest {
            conversation_id: conversation_id.to_string(),
            user_id: user_id.to_string(),
        };
        let reply: StartSessionReply = self
            .call("start_conversation_session", &req)
            .await
            .map_err(MeteringError::SessionStartFailed)?;

        info!(
            "Quota authority opened session {} for user {}",
            reply.session_id, user_id
        );

        Ok(reply.session_id)
    }

    async fn end_session(&self, session_id: &str) -> Result<u64, MeteringError> {
        let req = EndSessionRequest {
            session_id: session_id.to_string(),
        };
        let reply: EndSessionReply = self
            .call("end_conversation_session", &req)
            .await
            .map_err(MeteringError::SessionEndFailed)?;

        info!(
            "Quota authority closed session {} ({}s recorded)",
            session_id,
            reply.duration_seconds.max(0)
        );

        Ok(reply.duration_seconds.max(0) as u64)
    }

    async fn get_usage(&self, user_id: &str) -> Result<UserQuotaState, MeteringError> {
        let req = UserRequest {
            user_id: user_id.to_string(),
        };
        self.call("get_user_statistics", &req)
            .await
            .map_err(MeteringError::QuotaUnavailable)
    }
}
