use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Request payload for user-scoped quota queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRequest {
    pub user_id: String,
}

/// Request payload for opening a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub conversation_id: String,
    pub user_id: String,
}

/// Request payload for closing a conversation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndSessionRequest {
    pub session_id: String,
}

/// Reply to `get_remaining_seconds`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemainingSecondsReply {
    pub seconds: i64,
}

/// Reply to `check_monthly_usage_limit` / `check_daily_message_limit`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitCheckReply {
    pub allowed: bool,
}

/// Reply to `start_conversation_session`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionReply {
    pub session_id: String,
}

/// Reply to `end_conversation_session`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndSessionReply {
    pub duration_seconds: i64,
}

/// Error envelope the authority returns in place of a success reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Read-only cached view of the authority's per-user accounting row.
/// The authority owns this data; the client never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserQuotaState {
    pub user_id: String,

    /// Plan tier name (e.g. "free", "standard", "premium")
    pub plan_tier: String,

    /// Seconds of conversation consumed this month
    pub monthly_seconds_used: u64,

    /// Monthly elapsed-time budget in seconds
    pub monthly_seconds_limit: u64,

    /// Day the monthly accounting window rolls over
    pub usage_reset_date: NaiveDate,

    /// Messages exchanged today
    pub daily_message_count: u32,

    /// Daily interaction-count budget
    pub daily_message_limit: u32,
}
