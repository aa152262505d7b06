//! Event bus for communication between client components.
//!
//! A thin wrapper over a tokio broadcast channel. Every subscriber sees every
//! event published after it subscribed; slow subscribers lag and lose the
//! oldest events rather than blocking publishers.

use raffle_types::RaffleEvent;
use tokio::sync::broadcast;

/// Broadcast channel for [`RaffleEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<RaffleEvent>,
}

impl EventBus {
	/// Creates a bus that buffers up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to all events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<RaffleEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to every current subscriber.
	///
	/// Fails only when nobody is subscribed; publishers usually ignore that.
	pub fn publish(
		&self,
		event: RaffleEvent,
	) -> Result<usize, broadcast::error::SendError<RaffleEvent>> {
		self.sender.send(event)
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(1000)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use raffle_types::{Notification, RaffleEvent};

	#[tokio::test]
	async fn test_every_subscriber_receives_events() {
		let bus = EventBus::new(16);
		let mut first = bus.subscribe();
		let mut second = bus.subscribe();

		let delivered = bus
			.publish(RaffleEvent::Notification(Notification::transaction_complete()))
			.unwrap();
		assert_eq!(delivered, 2);

		assert!(matches!(first.recv().await, Ok(RaffleEvent::Notification(_))));
		assert!(matches!(second.recv().await, Ok(RaffleEvent::Notification(_))));
	}

	#[test]
	fn test_publish_without_subscribers_fails() {
		let bus = EventBus::new(4);
		assert!(bus
			.publish(RaffleEvent::Notification(Notification::transaction_complete()))
			.is_err());
	}
}
