use async_trait::async_trait;
use parking_lot::RwLock;
use reveal_core::Publisher;
use std::collections::HashMap;
use tokio::sync::broadcast;

const TOPIC_CHANNEL_CAPACITY: usize = 256;

/// Per-topic fan-out. Each topic gets its own `broadcast::Sender`, created
/// lazily on first publish or first subscribe; a topic with no subscribers
/// simply drops frames (spec §4.J "best-effort").
#[derive(Default)]
pub struct BroadcastPublisher {
	topics: RwLock<HashMap<String, broadcast::Sender<String>>>,
}

impl BroadcastPublisher {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<String> {
		if let Some(sender) = self.topics.read().get(topic) {
			return sender.subscribe();
		}
		let mut topics = self.topics.write();
		topics.entry(topic.to_string()).or_insert_with(|| broadcast::channel(TOPIC_CHANNEL_CAPACITY).0).subscribe()
	}
}

#[async_trait]
impl Publisher for BroadcastPublisher {
	async fn publish(&self, topic: &str, payload: String) {
		let sender = {
			let topics = self.topics.read();
			topics.get(topic).cloned()
		};
		let sender = match sender {
			Some(sender) => sender,
			None => {
				let mut topics = self.topics.write();
				topics.entry(topic.to_string()).or_insert_with(|| broadcast::channel(TOPIC_CHANNEL_CAPACITY).0).clone()
			},
		};
		// No subscribers is not an error; the frame is simply not delivered.
		let _ = sender.send(payload);
	}
}
