//! Broadcast bus for application events.
//!
//! Every component that changes observable state publishes an [`AppEvent`]
//! here. Subscribers that fall behind lose the oldest events.

use campaign_types::AppEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
		self.sender.subscribe()
	}

	/// Publishes `event`; fails only when nobody is subscribed.
	pub fn publish(&self, event: AppEvent) -> Result<(), broadcast::error::SendError<AppEvent>> {
		self.sender.send(event).map(|_| ())
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1000)
	}
}
