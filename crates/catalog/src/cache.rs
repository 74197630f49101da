//! Observable in-memory projection of the catalog.
//!
//! The product list is swapped atomically on every snapshot: readers on any
//! thread see either the previous list or the new one, never a mix. Only the
//! interactive context holds the [`CatalogCache`] itself and can replace it;
//! everything else gets a [`CatalogReader`].

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::EmptySnapshotSelection;
use crate::error::FeedError;
use crate::product::{Product, RawRecord};

/// Read-only handle to the current catalog list.
#[derive(Debug, Clone)]
pub struct CatalogReader {
	products: Arc<ArcSwap<Vec<Product>>>,
}

impl CatalogReader {
	/// The most recently applied snapshot.
	pub fn list(&self) -> Arc<Vec<Product>> {
		self.products.load_full()
	}

	pub fn get(&self, id: &str) -> Option<Product> {
		self.products.load().iter().find(|p| p.id == id).cloned()
	}
}

/// Outcome of applying one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotReport {
	pub applied: usize,
	/// Records dropped as malformed.
	pub dropped: usize,
}

#[derive(Debug)]
pub struct CatalogCache {
	products: Arc<ArcSwap<Vec<Product>>>,
	selection: Option<Product>,
	empty_policy: EmptySnapshotSelection,
	generation: u64,
}

impl Default for CatalogCache {
	fn default() -> Self {
		Self::new(EmptySnapshotSelection::default())
	}
}

impl CatalogCache {
	pub fn new(empty_policy: EmptySnapshotSelection) -> Self {
		Self {
			products: Arc::new(ArcSwap::from_pointee(Vec::new())),
			selection: None,
			empty_policy,
			generation: 0,
		}
	}

	/// Replaces the whole list with the decodable records of `records`.
	///
	/// Record order is preserved. A non-empty result re-points the selection
	/// at its first product; an empty one applies the configured
	/// [`EmptySnapshotSelection`].
	pub fn on_snapshot(&mut self, records: &[RawRecord]) -> SnapshotReport {
		let mut products = Vec::with_capacity(records.len());
		for record in records {
			match record.decode() {
				Ok(product) => products.push(product),
				Err(err) => tracing::debug!(key = %record.key, error = %err, "catalog.snapshot.record_dropped"),
			}
		}
		let report = SnapshotReport {
			applied: products.len(),
			dropped: records.len() - products.len(),
		};

		match products.first() {
			Some(first) => self.selection = Some(first.clone()),
			None if self.empty_policy == EmptySnapshotSelection::Clear => self.selection = None,
			None => {}
		}
		self.products.store(Arc::new(products));
		self.generation += 1;

		tracing::debug!(
			generation = self.generation,
			applied = report.applied,
			dropped = report.dropped,
			"catalog.snapshot.applied"
		);
		report
	}

	/// Records a feed failure. The list is left as it was.
	pub fn on_feed_error(&self, err: &FeedError) {
		tracing::warn!(generation = self.generation, error = %err, "catalog.feed.error");
	}

	pub fn list(&self) -> Arc<Vec<Product>> {
		self.products.load_full()
	}

	pub fn reader(&self) -> CatalogReader {
		CatalogReader {
			products: Arc::clone(&self.products),
		}
	}

	pub fn get(&self, id: &str) -> Option<Product> {
		self.products.load().iter().find(|p| p.id == id).cloned()
	}

	pub fn len(&self) -> usize {
		self.products.load().len()
	}

	pub fn is_empty(&self) -> bool {
		self.products.load().is_empty()
	}

	pub fn selection(&self) -> Option<&Product> {
		self.selection.as_ref()
	}

	/// Designates a listed product as the selection. Returns `false` if `id`
	/// is not in the current list.
	pub fn select(&mut self, id: &str) -> bool {
		match self.get(id) {
			Some(product) => {
				self.selection = Some(product);
				true
			}
			None => false,
		}
	}

	/// Number of snapshots applied so far.
	pub fn generation(&self) -> u64 {
		self.generation
	}
}
