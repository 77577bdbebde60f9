use super::countdown::{LocalCountdown, TickOutcome};
use super::reconcile::QuotaReconciler;
use super::snapshot::{CountdownSnapshot, Session, SessionEvent};
use crate::error::{MeteringError, QuotaKind};
use crate::quota::QuotaGateway;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Lifecycle phase of the session state machine.
///
/// One full cycle is Idle → Starting → Active → Ending → Idle; both
/// intermediate phases double as re-entry guards for the command that
/// entered them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Starting,
    Active,
    Ending,
}

struct ControllerState {
    phase: Phase,

    /// Session id issued by the authority, present from Starting's success
    /// until the close clears it
    session_id: Option<String>,

    /// Wall-clock start for the Session record
    started_at_wall: Option<DateTime<Utc>>,

    /// Monotonic start instant; tick duration derives from this so
    /// scheduling jitter cannot accumulate
    started_at: Option<Instant>,

    session_duration_seconds: u64,
    remaining_seconds: u64,
    can_start_conversation: bool,
}

impl ControllerState {
    fn snapshot(&self) -> CountdownSnapshot {
        CountdownSnapshot {
            is_recording: self.phase == Phase::Active,
            is_processing: matches!(self.phase, Phase::Starting | Phase::Ending),
            remaining_seconds: self.remaining_seconds,
            session_duration_seconds: self.session_duration_seconds,
            can_start_conversation: self.can_start_conversation,
        }
    }

    fn clear_session(&mut self) {
        self.session_id = None;
        self.started_at_wall = None;
        self.started_at = None;
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            session_id: None,
            started_at_wall: None,
            started_at: None,
            session_duration_seconds: 0,
            remaining_seconds: 0,
            can_start_conversation: true,
        }
    }
}

/// Owns the session state machine for one user's conversation: quota-gated
/// start, guarded stop, the countdown timer, and post-close reconciliation.
///
/// Snapshots publish on a watch channel on every transition and every tick;
/// named outcomes (started, stopped, limit reached, failures) on a broadcast
/// channel. Commands are safe to invoke concurrently: phase flips happen
/// before any suspension point, so a racing duplicate start or stop is a
/// silent no-op and the authority sees at most one open and one close per
/// session.
pub struct SessionController {
    user_id: String,
    conversation_id: String,
    gateway: Arc<dyn QuotaGateway>,
    countdown: LocalCountdown,
    reconciler: QuotaReconciler,
    state: Mutex<ControllerState>,
    snapshot_tx: watch::Sender<CountdownSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        gateway: Arc<dyn QuotaGateway>,
        user_id: String,
        conversation_id: String,
    ) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(CountdownSnapshot::default());
        let (events_tx, _) = broadcast::channel(32);

        Arc::new(Self {
            reconciler: QuotaReconciler::new(Arc::clone(&gateway), user_id.clone()),
            countdown: LocalCountdown::new(),
            gateway,
            user_id,
            conversation_id,
            state: Mutex::new(ControllerState::default()),
            snapshot_tx,
            events_tx,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Watch channel carrying the latest snapshot; updated on every
    /// transition and every countdown tick.
    pub fn subscribe(&self) -> watch::Receiver<CountdownSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Broadcast channel carrying named session outcomes.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Current snapshot of the state machine.
    pub async fn snapshot(&self) -> CountdownSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Refresh the countdown projection and start gate from the authority.
    ///
    /// This is the "load event" that picks up deferred reconciliations after
    /// a failed post-close fetch.
    pub async fn load_remaining_time(&self) -> Result<(), MeteringError> {
        let remaining = self.gateway.get_remaining_seconds(&self.user_id).await?;

        let mut state = self.state.lock().await;
        state.remaining_seconds = remaining;
        state.can_start_conversation = remaining > 0;
        self.publish(&state);

        Ok(())
    }

    /// Read-only usage gate: true only when both the monthly and the daily
    /// predicate pass.
    pub async fn check_usage_limit(&self) -> Result<bool, MeteringError> {
        Ok(self.exceeded_quota().await?.is_none())
    }

    /// The first exhausted quota, if any. Monthly is evaluated first, so a
    /// user over both budgets sees the monthly signal.
    async fn exceeded_quota(&self) -> Result<Option<QuotaKind>, MeteringError> {
        if !self.gateway.check_monthly_limit(&self.user_id).await? {
            return Ok(Some(QuotaKind::Monthly));
        }
        if !self.gateway.check_daily_limit(&self.user_id).await? {
            return Ok(Some(QuotaKind::Daily));
        }
        Ok(None)
    }

    /// Start a conversation session: gate on both quotas and a positive
    /// remaining budget, open the session on the authority, then start the
    /// countdown.
    ///
    /// A call while the machine is not idle is a silent no-op, so the
    /// authority never sees more than one open per logical attempt. On any
    /// failure the machine returns to idle with no remote session.
    pub async fn start_recording(self: &Arc<Self>) -> Result<(), MeteringError> {
        {
            let mut state = self.state.lock().await;
            if state.phase != Phase::Idle {
                warn!(
                    "start_recording ignored for user {}: session already {:?}",
                    self.user_id, state.phase
                );
                return Ok(());
            }
            // Flip before the first await: a concurrent second start now
            // sees Starting and backs off, and is_processing covers the
            // whole command.
            state.phase = Phase::Starting;
            self.publish(&state);
        }

        match self.try_start().await {
            Ok(session_id) => {
                info!(
                    "Session {} active for user {} (conversation {})",
                    session_id, self.user_id, self.conversation_id
                );
                let _ = self.events_tx.send(SessionEvent::Started { session_id });
                Ok(())
            }
            Err(err) => {
                {
                    let mut state = self.state.lock().await;
                    state.phase = Phase::Idle;
                    state.clear_session();
                    self.publish(&state);
                }

                match &err {
                    MeteringError::LimitExceeded(kind) => {
                        info!(
                            "Start refused for user {}: {} limit exceeded",
                            self.user_id, kind
                        );
                        let _ = self.events_tx.send(SessionEvent::LimitExceeded(*kind));
                    }
                    MeteringError::SessionStartFailed(reason) => {
                        error!("Start failed for user {}: {}", self.user_id, reason);
                        let _ = self.events_tx.send(SessionEvent::StartFailed {
                            reason: reason.clone(),
                        });
                    }
                    _ => {
                        warn!("Start aborted for user {}: {}", self.user_id, err);
                    }
                }

                Err(err)
            }
        }
    }

    /// The fallible middle of a start attempt; runs in the Starting phase.
    async fn try_start(self: &Arc<Self>) -> Result<String, MeteringError> {
        // The projection may be stale or never primed; refresh before gating
        // on it so an active session always begins with budget on the clock.
        let projected = { self.state.lock().await.remaining_seconds };
        if projected == 0 {
            self.load_remaining_time().await?;
            let refreshed = { self.state.lock().await.remaining_seconds };
            if refreshed == 0 {
                return Err(MeteringError::LimitExceeded(QuotaKind::Monthly));
            }
        }

        if let Some(kind) = self.exceeded_quota().await? {
            return Err(MeteringError::LimitExceeded(kind));
        }

        let session_id = self
            .gateway
            .start_session(&self.conversation_id, &self.user_id)
            .await?;

        {
            let mut state = self.state.lock().await;
            state.session_id = Some(session_id.clone());
            state.started_at_wall = Some(Utc::now());
            state.started_at = Some(Instant::now());
            state.session_duration_seconds = 0;
            state.phase = Phase::Active;
            self.publish(&state);
        }

        self.countdown.start(self).await;

        Ok(session_id)
    }

    /// Close the active session: cancel the countdown, tell the authority,
    /// and reconcile the projection.
    ///
    /// A call while no session is active is a silent no-op; the racing
    /// timer-triggered auto-stop and a manual stop converge on exactly one
    /// remote close. The machine reaches idle whether or not the authority
    /// recorded the close (fail-open); an end failure is surfaced only after
    /// that.
    pub async fn stop_recording(&self) -> Result<(), MeteringError> {
        let (session_id, started_at_wall) = {
            let mut state = self.state.lock().await;
            if state.phase != Phase::Active {
                return Ok(());
            }

            let Some(session_id) = state.session_id.take() else {
                error!(
                    "active session for user {} has no session id; resetting to idle",
                    self.user_id
                );
                state.phase = Phase::Idle;
                state.clear_session();
                self.publish(&state);
                return Ok(());
            };

            state.phase = Phase::Ending;
            self.publish(&state);

            (session_id, state.started_at_wall.unwrap_or_else(Utc::now))
        };

        // No further tick reaches the state machine after this point.
        self.countdown.stop().await;

        let ended_at = Utc::now();
        let result = self.gateway.end_session(&session_id).await;

        {
            let mut state = self.state.lock().await;
            state.phase = Phase::Idle;
            state.clear_session();
            if let Ok(duration) = &result {
                // The local figure was an estimate; the authority's is the
                // session duration of record.
                state.session_duration_seconds = *duration;
            }
            self.publish(&state);
        }

        let session = Session {
            session_id,
            conversation_id: self.conversation_id.clone(),
            user_id: self.user_id.clone(),
            start_time: started_at_wall,
            end_time: Some(ended_at),
            duration_seconds: result.as_ref().ok().copied(),
        };

        // Drift correction runs whether or not the close was recorded.
        self.reconcile().await;

        match result {
            Ok(duration) => {
                info!(
                    "Session {} closed for user {} ({}s recorded)",
                    session.session_id, self.user_id, duration
                );
                let _ = self.events_tx.send(SessionEvent::Stopped { session });
                Ok(())
            }
            Err(err) => {
                warn!(
                    "Session {} close not recorded for user {}: {}; duration reconciles lazily",
                    session.session_id, self.user_id, err
                );
                let _ = self.events_tx.send(SessionEvent::EndFailed {
                    session,
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Close out the conversation: stop the session if one is active,
    /// otherwise a no-op.
    pub async fn end_conversation(&self) -> Result<(), MeteringError> {
        self.stop_recording().await
    }

    /// One countdown tick: recompute duration from the absolute start
    /// instant, burn one projected second, and report whether the budget
    /// just ran out.
    pub(crate) async fn apply_tick(&self) -> TickOutcome {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Active {
            return TickOutcome::Cancelled;
        }

        if let Some(started_at) = state.started_at {
            state.session_duration_seconds = started_at.elapsed().as_secs();
        }
        state.remaining_seconds = state.remaining_seconds.saturating_sub(1);
        self.publish(&state);

        if state.remaining_seconds == 0 {
            TickOutcome::Exhausted
        } else {
            TickOutcome::Running
        }
    }

    /// Forced stop when the countdown hits zero. Invoked exactly once per
    /// exhaustion; the phase guard in `stop_recording` absorbs any race with
    /// a manual stop.
    pub(crate) async fn auto_stop(&self) {
        warn!(
            "Monthly time budget exhausted for user {}; stopping session automatically",
            self.user_id
        );
        let _ = self
            .events_tx
            .send(SessionEvent::LimitReached(QuotaKind::Monthly));

        if let Err(err) = self.stop_recording().await {
            error!(
                "Automatic stop for user {} could not record the close: {}",
                self.user_id, err
            );
        }
    }

    async fn reconcile(&self) {
        if let Some(remaining) = self.reconciler.fetch_remaining().await {
            let mut state = self.state.lock().await;
            state.remaining_seconds = remaining;
            state.can_start_conversation = remaining > 0;
            self.publish(&state);
        }
    }

    fn publish(&self, state: &ControllerState) {
        self.snapshot_tx.send_replace(state.snapshot());
    }
}
