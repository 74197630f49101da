use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;

use super::{Document, DocumentStore, Result};
use crate::error::StoreError;
use crate::feed::MemoryFeed;
use crate::product::ProductId;

/// One recorded store call.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
	Create { collection: String, document: Document },
	Update { collection: String, id: String, fields: Document },
	Delete { collection: String, id: String },
}

/// Operation kinds accepted by [`MemoryStore::fail_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
	Create,
	Update,
	Delete,
}

#[derive(Debug, Default)]
struct Inner {
	collections: HashMap<String, IndexMap<String, Document>>,
	next_id: u64,
	calls: Vec<StoreCall>,
	failing: HashSet<StoreOp>,
	mirror: Option<(MemoryFeed, String)>,
}

/// In-process document store that records calls and can inject failures.
///
/// With [`MemoryStore::mirrored`], every successful write republishes the
/// collection on a [`MemoryFeed`], the way a backend with change streams
/// would push it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
	inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Republishes writes to `feed_collection` on `feed`.
	pub fn mirrored(feed: MemoryFeed, feed_collection: impl Into<String>) -> Self {
		let store = Self::new();
		store.inner.lock().mirror = Some((feed, feed_collection.into()));
		store
	}

	/// Makes every subsequent call of `op` fail.
	pub fn fail_on(&self, op: StoreOp) {
		self.inner.lock().failing.insert(op);
	}

	pub fn clear_failures(&self) {
		self.inner.lock().failing.clear();
	}

	/// Seeds a document without recording a call.
	pub fn insert(&self, collection: &str, id: &str, document: Document) {
		let mut inner = self.inner.lock();
		inner.collections.entry(collection.to_string()).or_default().insert(id.to_string(), document);
		Self::republish(&inner, collection);
	}

	pub fn get(&self, collection: &str, id: &str) -> Option<Document> {
		self.inner.lock().collections.get(collection)?.get(id).cloned()
	}

	pub fn len(&self, collection: &str) -> usize {
		self.inner.lock().collections.get(collection).map_or(0, IndexMap::len)
	}

	pub fn calls(&self) -> Vec<StoreCall> {
		self.inner.lock().calls.clone()
	}

	fn check(inner: &Inner, op: StoreOp) -> Result<()> {
		if inner.failing.contains(&op) {
			return Err(StoreError::Status {
				status: 503,
				body: format!("injected {op:?} failure"),
			});
		}
		Ok(())
	}

	fn republish(inner: &Inner, collection: &str) {
		let Some((feed, feed_collection)) = &inner.mirror else {
			return;
		};
		let records = inner
			.collections
			.get(collection)
			.map(|docs| docs.iter().map(|(id, doc)| (id.clone(), Value::Object(doc.clone()))).collect::<Vec<_>>())
			.unwrap_or_default();
		feed.publish(feed_collection, records);
	}
}

#[async_trait]
impl DocumentStore for MemoryStore {
	async fn create(&self, collection: &str, document: Document) -> Result<ProductId> {
		let mut inner = self.inner.lock();
		inner.calls.push(StoreCall::Create {
			collection: collection.to_string(),
			document: document.clone(),
		});
		Self::check(&inner, StoreOp::Create)?;

		inner.next_id += 1;
		let id = format!("doc-{}", inner.next_id);
		inner.collections.entry(collection.to_string()).or_default().insert(id.clone(), document);
		Self::republish(&inner, collection);
		Ok(id)
	}

	async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()> {
		let mut inner = self.inner.lock();
		inner.calls.push(StoreCall::Update {
			collection: collection.to_string(),
			id: id.to_string(),
			fields: fields.clone(),
		});
		Self::check(&inner, StoreOp::Update)?;

		let doc = inner
			.collections
			.get_mut(collection)
			.and_then(|docs| docs.get_mut(id))
			.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
		doc.extend(fields);
		Self::republish(&inner, collection);
		Ok(())
	}

	async fn delete(&self, collection: &str, id: &str) -> Result<()> {
		let mut inner = self.inner.lock();
		inner.calls.push(StoreCall::Delete {
			collection: collection.to_string(),
			id: id.to_string(),
		});
		Self::check(&inner, StoreOp::Delete)?;

		inner
			.collections
			.get_mut(collection)
			.and_then(|docs| docs.shift_remove(id))
			.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
		Self::republish(&inner, collection);
		Ok(())
	}
}
