//! Broadcast channel for tracking events.
//!
//! Publishing never blocks. Events published while nobody is subscribed are
//! dropped, and slow subscribers may observe `RecvError::Lagged`.

use cremation_types::TrackingEvent;
use tokio::sync::broadcast;

/// Cloneable handle to the engine's event channel.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<TrackingEvent>,
}

impl EventBus {
	/// Creates a bus holding at most `capacity` undelivered events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Returns a receiver for events published from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns the number of subscribers that received it.
	pub fn publish(&self, event: TrackingEvent) -> usize {
		self.sender.send(event).unwrap_or(0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use cremation_types::OrderEvent;

	#[tokio::test]
	async fn test_publish_reaches_subscribers() {
		let bus = EventBus::new(16);
		let mut rx = bus.subscribe();

		let delivered = bus.publish(TrackingEvent::Order(OrderEvent::CremationSessionRecorded {
			order_id: "a".to_string(),
		}));
		assert_eq!(delivered, 1);

		match rx.recv().await.unwrap() {
			TrackingEvent::Order(OrderEvent::CremationSessionRecorded { order_id }) => {
				assert_eq!(order_id, "a")
			},
			other => panic!("unexpected event {:?}", other),
		}
	}

	#[test]
	fn test_publish_without_subscribers() {
		let bus = EventBus::new(4);
		let delivered = bus.publish(TrackingEvent::Order(OrderEvent::CremationSessionRecorded {
			order_id: "a".to_string(),
		}));
		assert_eq!(delivered, 0);
	}
}
