use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use super::{CatalogFeed, FeedEvent, FeedSink, FeedSubscription, Snapshot};
use crate::error::FeedError;
use crate::product::RawRecord;

#[derive(Debug, Default)]
struct Collection {
	records: IndexMap<String, Value>,
	sinks: Vec<FeedSink>,
}

impl Collection {
	fn snapshot(&self) -> Snapshot {
		Snapshot::new(self.records.iter().map(|(k, v)| RawRecord::new(k.clone(), v.clone())).collect())
	}

	fn broadcast(&mut self, event: FeedEvent) {
		self.sinks.retain(|sink| sink.try_deliver(event.clone()));
	}
}

/// In-process realtime feed.
///
/// Subscribers receive the collection's current contents immediately, then a
/// fresh snapshot on every change. Clones share the same collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeed {
	collections: Arc<Mutex<HashMap<String, Collection>>>,
}

impl MemoryFeed {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces a collection and pushes the new snapshot to subscribers.
	pub fn publish(&self, collection: &str, records: impl IntoIterator<Item = (String, Value)>) {
		let mut collections = self.collections.lock();
		let entry = collections.entry(collection.to_string()).or_default();
		entry.records = records.into_iter().collect();
		let snapshot = entry.snapshot();
		tracing::trace!(collection, records = snapshot.len(), "feed.memory.publish");
		entry.broadcast(FeedEvent::Snapshot(snapshot));
	}

	/// Applies `edit` to a collection's records, then pushes the result.
	pub fn modify(&self, collection: &str, edit: impl FnOnce(&mut IndexMap<String, Value>)) {
		let mut collections = self.collections.lock();
		let entry = collections.entry(collection.to_string()).or_default();
		edit(&mut entry.records);
		let snapshot = entry.snapshot();
		entry.broadcast(FeedEvent::Snapshot(snapshot));
	}

	/// Pushes an error event without touching the records.
	pub fn fail(&self, collection: &str, message: impl Into<String>) {
		let mut collections = self.collections.lock();
		if let Some(entry) = collections.get_mut(collection) {
			entry.broadcast(FeedEvent::Error(FeedError::new(message)));
		}
	}

	/// Number of live subscriptions to `collection`.
	pub fn subscriber_count(&self, collection: &str) -> usize {
		let mut collections = self.collections.lock();
		match collections.get_mut(collection) {
			Some(entry) => {
				entry.sinks.retain(|sink| !sink.is_closed());
				entry.sinks.len()
			}
			None => 0,
		}
	}
}

impl CatalogFeed for MemoryFeed {
	fn subscribe(&self, collection: &str) -> FeedSubscription {
		let (sink, subscription) = FeedSubscription::channel();
		let mut collections = self.collections.lock();
		let entry = collections.entry(collection.to_string()).or_default();
		if sink.try_deliver(FeedEvent::Snapshot(entry.snapshot())) {
			entry.sinks.push(sink);
		}
		subscription
	}
}
