//! Session lifecycle management
//!
//! This module owns the per-user session state machine and everything that
//! keeps it honest:
//! - `SessionController`: quota-gated start, guarded stop, snapshot/event publication
//! - `LocalCountdown`: the single per-second timer active while a session runs
//! - `QuotaReconciler`: post-close drift correction against the authority
//! - Snapshot, session-record, and event types exposed upward
//!
//! The countdown and the reconciler are internals of the controller; only the
//! controller and its data types are exported.

mod controller;
mod countdown;
mod reconcile;
mod snapshot;

pub use controller::SessionController;
pub use snapshot::{CountdownSnapshot, Session, SessionEvent};
