//! Notification sinks.
//!
//! Notifications are fire-and-forget: `notify` never blocks and never fails.

use crate::engine::event_bus::EventBus;
use raffle_types::{Notification, NotificationKind, RaffleEvent};

/// Destination for user facing notifications.
pub trait NotificationSink: Send + Sync {
	fn notify(&self, notification: Notification);
}

/// Writes notifications as structured log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
	fn notify(&self, notification: Notification) {
		let Notification {
			kind,
			title,
			message,
			placement,
		} = notification;

		match kind {
			NotificationKind::Error => {
				tracing::error!(?placement, %message, "{}", title)
			},
			NotificationKind::Warning => {
				tracing::warn!(?placement, %message, "{}", title)
			},
			NotificationKind::Info | NotificationKind::Success => {
				tracing::info!(?kind, ?placement, %message, "{}", title)
			},
		}
	}
}

/// Publishes notifications on the event bus for front ends to render.
#[derive(Debug, Clone)]
pub struct EventBusNotifier {
	event_bus: EventBus,
}

impl EventBusNotifier {
	pub fn new(event_bus: EventBus) -> Self {
		Self { event_bus }
	}
}

impl NotificationSink for EventBusNotifier {
	fn notify(&self, notification: Notification) {
		self.event_bus
			.publish(RaffleEvent::Notification(notification))
			.ok();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_event_bus_notifier_publishes() {
		let bus = EventBus::new(8);
		let mut events = bus.subscribe();

		EventBusNotifier::new(bus).notify(Notification::transaction_complete());

		match events.recv().await.unwrap() {
			RaffleEvent::Notification(notification) => {
				assert_eq!(notification.title, "Transaction Complete!");
			},
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_notifiers_never_fail_without_listeners() {
		EventBusNotifier::new(EventBus::new(1)).notify(Notification::transaction_complete());
		TracingNotifier.notify(Notification::new(
			NotificationKind::Error,
			"Transaction Failed",
			"Raffle__NotOpen",
		));
	}
}
