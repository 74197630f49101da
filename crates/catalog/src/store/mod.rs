//! Authoritative document store boundary.
//!
//! Implementations translate calls into their backend's protocol and pass
//! failures through as [`StoreError`]; they hold no catalog logic.

mod firestore;
mod memory;

use async_trait::async_trait;
pub use firestore::FirestoreStore;
pub use memory::{MemoryStore, StoreCall, StoreOp};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::product::ProductId;

/// A document body: field name to JSON value.
pub type Document = Map<String, Value>;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Document-oriented backend supporting create/update/delete by id.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
	/// Creates a document and returns the id the store generated for it.
	async fn create(&self, collection: &str, document: Document) -> Result<ProductId>;

	/// Merges `fields` into an existing document; other fields are untouched.
	async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()>;

	/// Deletes a document. Deleting a missing document succeeds.
	async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}
