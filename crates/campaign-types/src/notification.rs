//! User notification channel.
//!
//! The core emits short leveled messages into a sink and never waits for them
//! to be shown.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationLevel {
	Info,
	Success,
	Warning,
	Error,
}

impl fmt::Display for NotificationLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			NotificationLevel::Info => "info",
			NotificationLevel::Success => "success",
			NotificationLevel::Warning => "warning",
			NotificationLevel::Error => "error",
		};
		f.write_str(label)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
	pub level: NotificationLevel,
	pub text: String,
}

/// Fire-and-forget sink for user-facing messages.
pub trait NotificationSink: Send + Sync {
	fn notify(&self, level: NotificationLevel, text: &str);

	fn info(&self, text: &str) {
		self.notify(NotificationLevel::Info, text);
	}

	fn success(&self, text: &str) {
		self.notify(NotificationLevel::Success, text);
	}

	fn warning(&self, text: &str) {
		self.notify(NotificationLevel::Warning, text);
	}

	fn error(&self, text: &str) {
		self.notify(NotificationLevel::Error, text);
	}
}
