use crate::error::QuotaKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only view of the session state machine, recomputed on every
/// transition and every countdown tick, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownSnapshot {
    /// Whether a conversation session is currently active
    pub is_recording: bool,

    /// Whether a start or stop command is in flight (duplicate triggers
    /// should be disabled while this is set)
    pub is_processing: bool,

    /// Locally projected seconds left in the monthly budget. An estimate
    /// while a session runs; authoritative right after reconciliation.
    pub remaining_seconds: u64,

    /// Elapsed seconds of the current (or just-closed) session
    pub session_duration_seconds: u64,

    /// Whether a new session could start (remaining budget above zero)
    pub can_start_conversation: bool,
}

impl Default for CountdownSnapshot {
    fn default() -> Self {
        Self {
            is_recording: false,
            is_processing: false,
            remaining_seconds: 0,
            session_duration_seconds: 0,
            // Optimistic until the first quota load says otherwise
            can_start_conversation: true,
        }
    }
}

/// One continuous interval of active conversation, as recorded locally.
///
/// `duration_seconds` is `None` until the authority confirms the close;
/// before that the only duration available is the local projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u64>,
}

/// Named signals emitted on the controller's event channel, one per
/// user-visible outcome.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session was opened on the authority and the countdown started
    Started { session_id: String },

    /// A session closed and the authority recorded its duration
    Stopped { session: Session },

    /// A start attempt was refused because the named quota is exhausted
    LimitExceeded(QuotaKind),

    /// The countdown hit zero mid-session and forced an automatic stop
    LimitReached(QuotaKind),

    /// The authority refused to open a session; the user may retry
    StartFailed { reason: String },

    /// The authority failed to close a session; accounting reconciles lazily
    EndFailed { session: Session, reason: String },
}
