use thiserror::Error;

/// Which of the two independent quotas a check or refusal refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    /// Monthly elapsed-time budget (seconds of conversation).
    Monthly,
    /// Daily interaction-count budget (messages per day).
    Daily,
}

impl std::fmt::Display for QuotaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaKind::Monthly => write!(f, "monthly"),
            QuotaKind::Daily => write!(f, "daily"),
        }
    }
}

/// Failure classes surfaced by the metering subsystem.
///
/// A timer still running outside an active session is deliberately not a
/// variant here: that is a programming defect, logged and refused at the
/// countdown, never a runtime condition callers recover from.
#[derive(Debug, Error)]
pub enum MeteringError {
    /// Transient failure reading from the quota authority. Callers degrade to
    /// the last-known cached value; non-fatal.
    #[error("quota authority unavailable: {0}")]
    QuotaUnavailable(String),

    /// Hard stop: the named quota is exhausted, no session may start.
    #[error("{0} usage limit exceeded")]
    LimitExceeded(QuotaKind),

    /// The authority refused or failed to open a session. The start attempt
    /// is aborted with no side effects.
    #[error("failed to start conversation session: {0}")]
    SessionStartFailed(String),

    /// The authority refused or failed to close a session. Local state still
    /// reaches idle; the authoritative duration is reconciled lazily.
    #[error("failed to end conversation session: {0}")]
    SessionEndFailed(String),
}
