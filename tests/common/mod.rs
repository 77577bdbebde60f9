// Shared test double for the quota authority.
//
// Programmable per-call behavior plus atomic call counters, so tests can
// assert exactly how many remote operations a command sequence produced.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use talktime_metering::{MeteringError, QuotaGateway, UserQuotaState};

pub struct MockGateway {
    /// Remaining seconds the authority reports; end_session burns the
    /// recorded duration from it like the real accounting does
    pub remaining: AtomicU64,

    /// Duration end_session records for the closed interval
    pub end_duration: AtomicU64,

    /// Artificial answer delay applied to every call, for tests that need
    /// commands to overlap in flight
    pub latency_ms: AtomicU64,

    pub monthly_ok: AtomicBool,
    pub daily_ok: AtomicBool,
    pub fail_start: AtomicBool,
    pub fail_end: AtomicBool,
    pub fail_remaining: AtomicBool,

    pub remaining_calls: AtomicUsize,
    pub monthly_calls: AtomicUsize,
    pub daily_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub end_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new(remaining: u64) -> Self {
        Self {
            remaining: AtomicU64::new(remaining),
            end_duration: AtomicU64::new(0),
            latency_ms: AtomicU64::new(0),
            monthly_ok: AtomicBool::new(true),
            daily_ok: AtomicBool::new(true),
            fail_start: AtomicBool::new(false),
            fail_end: AtomicBool::new(false),
            fail_remaining: AtomicBool::new(false),
            remaining_calls: AtomicUsize::new(0),
            monthly_calls: AtomicUsize::new(0),
            daily_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            end_calls: AtomicUsize::new(0),
        }
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn end_calls(&self) -> usize {
        self.end_calls.load(Ordering::SeqCst)
    }

    pub fn remaining_calls(&self) -> usize {
        self.remaining_calls.load(Ordering::SeqCst)
    }

    async fn answer_delay(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl QuotaGateway for MockGateway {
    async fn get_remaining_seconds(&self, _user_id: &str) -> Result<u64, MeteringError> {
        self.answer_delay().await;
        self.remaining_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_remaining.load(Ordering::SeqCst) {
            return Err(MeteringError::QuotaUnavailable(
                "authority unreachable".to_string(),
            ));
        }
        Ok(self.remaining.load(Ordering::SeqCst))
    }

    async fn check_monthly_limit(&self, _user_id: &str) -> Result<bool, MeteringError> {
        self.answer_delay().await;
        self.monthly_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.monthly_ok.load(Ordering::SeqCst))
    }

    async fn check_daily_limit(&self, _user_id: &str) -> Result<bool, MeteringError> {
        self.answer_delay().await;
        self.daily_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.daily_ok.load(Ordering::SeqCst))
    }

    async fn start_session(
        &self,
        _conversation_id: &str,
        _user_id: &str,
    ) -> Result<String, MeteringError> {
        self.answer_delay().await;
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(MeteringError::SessionStartFailed(
                "authority rejected the session".to_string(),
            ));
        }
        Ok(format!("session-{}", self.start_calls()))
    }

    async fn end_session(&self, _session_id: &str) -> Result<u64, MeteringError> {
        self.answer_delay().await;
        self.end_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_end.load(Ordering::SeqCst) {
            return Err(MeteringError::SessionEndFailed(
                "authority unreachable".to_string(),
            ));
        }

        let duration = self.end_duration.load(Ordering::SeqCst);
        let remaining = self.remaining.load(Ordering::SeqCst);
        self.remaining
            .store(remaining.saturating_sub(duration), Ordering::SeqCst);

        Ok(duration)
    }

    async fn get_usage(&self, user_id: &str) -> Result<UserQuotaState, MeteringError> {
        Ok(UserQuotaState {
            user_id: user_id.to_string(),
            plan_tier: "standard".to_string(),
            monthly_seconds_used: 0,
            monthly_seconds_limit: self.remaining.load(Ordering::SeqCst),
            usage_reset_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            daily_message_count: 0,
            daily_message_limit: 50,
        })
    }
}
