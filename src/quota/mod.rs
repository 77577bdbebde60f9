//! Quota authority interface
//!
//! The quota authority is the remote source of truth for usage accounting:
//! it holds the per-user monthly seconds budget and daily message budget,
//! issues session ids, and records session close times. This module provides:
//! - The `QuotaGateway` trait the session layer is written against
//! - A NATS request/reply implementation of that trait
//! - The wire messages exchanged with the authority

pub mod gateway;
pub mod messages;
pub mod nats;

pub use gateway::QuotaGateway;
pub use messages::UserQuotaState;
pub use nats::NatsQuotaGateway;
