pub mod orchestrator;

pub use orchestrator::{OrchestratorError, TransactionOrchestrator, TransactionTicket};
