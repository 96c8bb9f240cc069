//! Common types for the campaign client workspace.
//!
//! This crate defines the data model shared by every layer of the client:
//! wallet/session identity, network status, campaigns, transaction records,
//! the error taxonomy and the events flowing between components.

/// Campaign records and creation drafts.
pub mod campaign;
/// Error taxonomy shared by every write path.
pub mod errors;
/// Event types published on the engine event bus.
pub mod events;
/// Chain descriptors and chain identifier parsing.
pub mod networks;
/// Notification levels and the notification sink interface.
pub mod notification;
/// Self-registration of pluggable implementations.
pub mod registry;
/// Redacting wrapper for secrets read from configuration.
pub mod secret_string;
/// Session tokens, wallet state and network status.
pub mod session;
/// Transaction records and their lifecycle states.
pub mod transaction;
/// Utility functions for amount conversion and formatting.
pub mod utils;
/// Schema helpers for validating implementation config tables.
pub mod validation;

pub use alloy_primitives::{Address, B256, U256};
pub use campaign::*;
pub use errors::*;
pub use events::*;
pub use networks::{parse_chain_id, ChainDescriptor, NativeCurrency};
pub use notification::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use session::*;
pub use transaction::*;
pub use utils::{
	current_timestamp, decimal_to_minor, minor_to_decimal, minor_to_decimal_lossy, short_address,
	truncate_id, with_0x_prefix,
};
pub use validation::*;
