//! Firebase Realtime Database streaming adapter.
//!
//! The REST streaming endpoint sends an initial `put` at `/` with the whole
//! collection, then `put`/`patch` events for individual paths. The adapter
//! keeps a local copy of the tree and emits it whole after every change, so
//! consumers only ever see full snapshots.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::{Map, Value};
use storefront_worker::TaskClass;
use url::Url;

use super::sse::SseDecoder;
use super::{CatalogFeed, FeedEvent, FeedSink, FeedSubscription, Snapshot};
use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::product::RawRecord;

/// Realtime feed backed by a Firebase database.
#[derive(Debug, Clone)]
pub struct FirebaseFeed {
	client: reqwest::Client,
	base_url: Url,
	auth_token: Option<String>,
	reconnect_delay: Duration,
}

impl FirebaseFeed {
	pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
		let base_url = Url::parse(&config.base_url).map_err(|e| FeedError::new(format!("invalid feed url: {e}")))?;
		let client = reqwest::Client::builder()
			.connect_timeout(Duration::from_secs(30))
			.build()
			.map_err(|e| FeedError::new(format!("failed to build http client: {e}")))?;
		Ok(Self {
			client,
			base_url,
			auth_token: config.auth_token.clone(),
			reconnect_delay: config.reconnect_delay(),
		})
	}

	fn collection_url(&self, collection: &str) -> Result<Url, FeedError> {
		let base = self.base_url.as_str().trim_end_matches('/');
		let mut url = Url::parse(&format!("{base}/{collection}.json")).map_err(|e| FeedError::new(format!("invalid collection url: {e}")))?;
		if let Some(token) = &self.auth_token {
			url.query_pairs_mut().append_pair("auth", token);
		}
		Ok(url)
	}
}

impl CatalogFeed for FirebaseFeed {
	fn subscribe(&self, collection: &str) -> FeedSubscription {
		let (sink, subscription) = FeedSubscription::channel();
		let url = match self.collection_url(collection) {
			Ok(url) => url,
			Err(err) => {
				sink.try_deliver(FeedEvent::Error(err));
				return subscription;
			}
		};

		let client = self.client.clone();
		let delay = self.reconnect_delay;
		let task_sink = sink.clone();
		if let Err(err) = storefront_worker::spawn(TaskClass::Background, listen(client, url, task_sink, delay)) {
			sink.try_deliver(FeedEvent::Error(FeedError::new(err.to_string())));
		}
		subscription
	}
}

/// Keeps one stream open at a time until the subscriber goes away.
async fn listen(client: reqwest::Client, url: Url, sink: FeedSink, delay: Duration) {
	let collection = url.path().to_string();
	loop {
		tokio::select! {
			_ = sink.closed() => break,
			result = stream_once(&client, &url, &sink) => match result {
				Ok(()) => tracing::debug!(%collection, "feed.firebase.stream_ended"),
				Err(err) => {
					tracing::warn!(%collection, error = %err, "feed.firebase.stream_error");
					if !sink.deliver(FeedEvent::Error(err)).await {
						break;
					}
				}
			},
		}

		tokio::select! {
			_ = sink.closed() => break,
			_ = tokio::time::sleep(delay) => {}
		}
	}
	tracing::debug!(%collection, "feed.firebase.unsubscribed");
}

async fn stream_once(client: &reqwest::Client, url: &Url, sink: &FeedSink) -> Result<(), FeedError> {
	let response = client
		.get(url.clone())
		.header(ACCEPT, "text/event-stream")
		.send()
		.await
		.map_err(|e| FeedError::new(format!("feed connection failed: {e}")))?;
	let status = response.status();
	if !status.is_success() {
		let body = response.text().await.unwrap_or_default();
		return Err(FeedError::new(format!("feed rejected subscription (status {status}): {body}")));
	}

	let mut tree = FirebaseTree::default();
	let mut decoder = SseDecoder::default();
	let mut body = response.bytes_stream();
	while let Some(chunk) = body.next().await {
		let chunk = chunk.map_err(|e| FeedError::new(format!("feed stream interrupted: {e}")))?;
		for event in decoder.push(&chunk) {
			match event.event.as_str() {
				"put" | "patch" => {
					tree.apply(&event.event, &event.data)?;
					if !sink.deliver(FeedEvent::Snapshot(tree.snapshot())).await {
						return Ok(());
					}
				}
				"keep-alive" => {}
				"cancel" => return Err(FeedError::new(format!("listener cancelled: {}", event.data))),
				"auth_revoked" => return Err(FeedError::new("feed credential revoked")),
				other => tracing::trace!(event = other, "feed.firebase.ignored_event"),
			}
		}
	}
	Ok(())
}

#[derive(Debug, Deserialize)]
struct PathData {
	path: String,
	data: Value,
}

/// Local mirror of the subscribed subtree.
#[derive(Debug, Default)]
pub(crate) struct FirebaseTree {
	root: Value,
}

impl FirebaseTree {
	/// Applies one `put` or `patch` payload.
	pub fn apply(&mut self, kind: &str, payload: &str) -> Result<(), FeedError> {
		let PathData { path, data } = serde_json::from_str(payload).map_err(|e| FeedError::new(format!("malformed {kind} event: {e}")))?;
		let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
		match (kind, data) {
			("patch", Value::Object(fields)) => {
				for (key, value) in fields {
					let mut child_path = segments.clone();
					child_path.push(&key);
					set_at(&mut self.root, &child_path, value);
				}
			}
			("patch", other) => return Err(FeedError::new(format!("patch payload must be an object, got {other}"))),
			(_, data) => set_at(&mut self.root, &segments, data),
		}
		Ok(())
	}

	/// Children of the root as raw records, in key order.
	pub fn snapshot(&self) -> Snapshot {
		let records = match &self.root {
			Value::Object(children) => {
				let mut records: Vec<RawRecord> = children.iter().map(|(k, v)| RawRecord::new(k.clone(), v.clone())).collect();
				records.sort_by(|a, b| a.key.cmp(&b.key));
				records
			}
			Value::Array(items) => items
				.iter()
				.enumerate()
				.filter(|(_, v)| !v.is_null())
				.map(|(i, v)| RawRecord::new(i.to_string(), v.clone()))
				.collect(),
			_ => Vec::new(),
		};
		Snapshot::new(records)
	}
}

/// Writes `value` at `path`; `null` deletes the node and any parent left empty.
fn set_at(node: &mut Value, path: &[&str], value: Value) {
	let Some((head, rest)) = path.split_first() else {
		*node = value;
		return;
	};

	if value.is_null() {
		let now_empty = match node {
			Value::Object(children) => {
				if let Some(child) = children.get_mut(*head) {
					set_at(child, rest, Value::Null);
					if child.is_null() || child.as_object().is_some_and(Map::is_empty) {
						children.remove(*head);
					}
				}
				children.is_empty()
			}
			_ => false,
		};
		if now_empty {
			*node = Value::Null;
		}
		return;
	}

	if !node.is_object() {
		*node = Value::Object(Map::new());
	}
	if let Value::Object(children) = node {
		let child = children.entry(head.to_string()).or_insert(Value::Null);
		set_at(child, rest, value);
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn keys(tree: &FirebaseTree) -> Vec<String> {
		tree.snapshot().records.into_iter().map(|r| r.key).collect()
	}

	#[test]
	fn root_put_replaces_everything() {
		let mut tree = FirebaseTree::default();
		tree.apply("put", r#"{"path":"/","data":{"b":{"name":"B"},"a":{"name":"A"}}}"#).unwrap();
		assert_eq!(keys(&tree), vec!["a", "b"]);

		tree.apply("put", r#"{"path":"/","data":{"c":{"name":"C"}}}"#).unwrap();
		assert_eq!(keys(&tree), vec!["c"]);

		tree.apply("put", r#"{"path":"/","data":null}"#).unwrap();
		assert!(tree.snapshot().is_empty());
	}

	#[test]
	fn nested_put_and_delete() {
		let mut tree = FirebaseTree::default();
		tree.apply("put", r#"{"path":"/","data":{"a":{"name":"A","price":1}}}"#).unwrap();
		tree.apply("put", r#"{"path":"/a/price","data":2.5}"#).unwrap();
		tree.apply("put", r#"{"path":"/b","data":{"name":"B"}}"#).unwrap();

		let snapshot = tree.snapshot();
		assert_eq!(snapshot.records[0].value, json!({ "name": "A", "price": 2.5 }));
		assert_eq!(snapshot.records[1].key, "b");

		tree.apply("put", r#"{"path":"/a","data":null}"#).unwrap();
		assert_eq!(keys(&tree), vec!["b"]);
	}

	#[test]
	fn deleting_last_field_removes_record() {
		let mut tree = FirebaseTree::default();
		tree.apply("put", r#"{"path":"/","data":{"a":{"name":"A"},"b":{"name":"B"}}}"#).unwrap();
		tree.apply("put", r#"{"path":"/a/name","data":null}"#).unwrap();
		assert_eq!(keys(&tree), vec!["b"]);
	}

	#[test]
	fn patch_merges_children() {
		let mut tree = FirebaseTree::default();
		tree.apply("put", r#"{"path":"/","data":{"a":{"name":"A","price":1}}}"#).unwrap();
		tree.apply("patch", r#"{"path":"/a","data":{"price":4,"description":"new"}}"#).unwrap();
		assert_eq!(tree.snapshot().records[0].value, json!({ "name": "A", "price": 4, "description": "new" }));

		assert!(tree.apply("patch", r#"{"path":"/a","data":3}"#).is_err());
		assert!(tree.apply("put", "not json").is_err());
	}

	#[test]
	fn array_roots_use_indices() {
		let mut tree = FirebaseTree::default();
		tree.apply("put", r#"{"path":"/","data":[null,{"name":"one"},{"name":"two"}]}"#).unwrap();
		assert_eq!(keys(&tree), vec!["1", "2"]);
	}

	#[test]
	fn collection_url_carries_auth() {
		let feed = FirebaseFeed::new(&FeedConfig {
			base_url: "https://shop.firebaseio.com/".into(),
			auth_token: Some("s3cret".into()),
			..FeedConfig::default()
		})
		.unwrap();
		let url = feed.collection_url("Products").unwrap();
		assert_eq!(url.as_str(), "https://shop.firebaseio.com/Products.json?auth=s3cret");
	}
}
