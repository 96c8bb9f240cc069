//! Notification sinks.

use campaign_types::{Notification, NotificationLevel, NotificationSink};
use tokio::sync::mpsc;

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
	fn notify(&self, level: NotificationLevel, text: &str) {
		match level {
			NotificationLevel::Info | NotificationLevel::Success => {
				tracing::info!(target: "notification", level = %level, "{}", text)
			},
			NotificationLevel::Warning => {
				tracing::warn!(target: "notification", "{}", text)
			},
			NotificationLevel::Error => tracing::error!(target: "notification", "{}", text),
		}
	}
}

/// Forwards notifications to a channel. Sending never blocks and a closed
/// receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
	sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
	pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
		let (sender, receiver) = mpsc::unbounded_channel();
		(Self { sender }, receiver)
	}
}

impl NotificationSink for ChannelNotifier {
	fn notify(&self, level: NotificationLevel, text: &str) {
		let _ = self.sender.send(Notification {
			level,
			text: text.to_string(),
		});
	}
}
