//! Core of the campaign client.
//!
//! Ties the wallet session, network guard, contract gateway and campaign
//! cache together behind the [`CampaignEngine`], and runs every registry
//! write through the [`TransactionOrchestrator`].

pub mod builder;
pub mod classify;
pub mod engine;
pub mod handlers;
pub mod monitoring;
pub mod notify;
pub mod state;

pub use builder::{BuilderError, CampaignBuilder, CampaignFactories};
pub use classify::{classify, WriteFailure};
pub use engine::{event_bus::EventBus, CampaignEngine, EngineError};
pub use handlers::{OrchestratorError, TransactionOrchestrator, TransactionTicket};
pub use notify::{ChannelNotifier, TracingNotifier};
