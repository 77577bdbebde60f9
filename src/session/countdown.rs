use super::controller::SessionController;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// What the controller reports back for a single countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// Session still active, budget left
    Running,
    /// Projected remaining time just hit zero
    Exhausted,
    /// Session is no longer active; the timer must stop
    Cancelled,
}

/// The per-second countdown timer for an active session.
///
/// The timer handle is owned here and nowhere else: the controller starts and
/// stops the countdown only through this interface, so a second ticking
/// interval can never be registered. Stop is deterministic: after `stop`
/// returns, no further tick reaches the controller.
pub struct LocalCountdown {
    /// Run flag checked by the tick task before every tick
    ticking: Arc<AtomicBool>,

    /// Handle for the tick task
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl LocalCountdown {
    pub fn new() -> Self {
        Self {
            ticking: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the one-second tick loop against the controller.
    ///
    /// A start while already ticking is a programming defect (it would corrupt
    /// the next session's baseline); it is refused and logged, never doubled.
    pub(crate) async fn start(&self, controller: &Arc<SessionController>) {
        if self.ticking.swap(true, Ordering::SeqCst) {
            error!("countdown timer already running; refusing second start");
            return;
        }

        let ticking = Arc::clone(&self.ticking);
        // The task holds only a weak reference so a dropped controller
        // tears the timer down instead of being kept alive by it.
        let controller = Arc::downgrade(controller);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick resolves immediately; consume it so ticks land
            // at one-second marks after the session start.
            interval.tick().await;

            loop {
                interval.tick().await;

                if !ticking.load(Ordering::SeqCst) {
                    break;
                }

                let Some(controller) = controller.upgrade() else {
                    info!("session controller dropped; countdown exiting");
                    break;
                };

                match controller.apply_tick().await {
                    TickOutcome::Running => {}
                    TickOutcome::Cancelled => break,
                    TickOutcome::Exhausted => {
                        // Spawned separately so the stop path can abort this
                        // task without cutting off its own session close.
                        tokio::spawn(async move { controller.auto_stop().await });
                        break;
                    }
                }
            }

            // Release the run flag on self-termination so the next session
            // can register its timer.
            ticking.store(false, Ordering::SeqCst);
        });

        {
            let mut handle = self.handle.lock().await;
            *handle = Some(task);
        }
    }

    /// Cancel the timer. No tick reaches the controller after this returns.
    pub(crate) async fn stop(&self) {
        self.ticking.store(false, Ordering::SeqCst);

        let mut handle = self.handle.lock().await;
        if let Some(task) = handle.take() {
            task.abort();
        }
    }
}

impl Default for LocalCountdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocalCountdown {
    fn drop(&mut self) {
        self.ticking.store(false, Ordering::SeqCst);
        if let Ok(mut handle) = self.handle.try_lock() {
            if let Some(task) = handle.take() {
                task.abort();
            }
        }
    }
}
