//! Shopping cart selection and subtotal.

use indexmap::IndexMap;

use crate::cache::CatalogCache;
use crate::product::{Product, ProductId};

/// In-memory cart keyed by product id. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct CartLedger {
	items: IndexMap<ProductId, Product>,
}

impl CartLedger {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `product` unless a product with the same id is already present.
	/// Returns `true` if it was inserted.
	pub fn add(&mut self, product: Product) -> bool {
		if self.items.contains_key(&product.id) {
			return false;
		}
		self.items.insert(product.id.clone(), product);
		true
	}

	/// Removes a product by id. Removing an absent id does nothing.
	pub fn remove(&mut self, product_id: &str) -> Option<Product> {
		self.items.shift_remove(product_id)
	}

	/// Sum of member prices, computed on every call.
	pub fn subtotal(&self) -> f64 {
		self.items.values().map(|p| p.price).sum()
	}

	pub fn contains(&self, product_id: &str) -> bool {
		self.items.contains_key(product_id)
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Product> {
		self.items.values()
	}

	pub fn clear(&mut self) {
		self.items.clear();
	}

	/// Drops members that are no longer listed in `catalog`, returning their ids.
	pub fn prune(&mut self, catalog: &CatalogCache) -> Vec<ProductId> {
		let listed = catalog.list();
		let stale: Vec<ProductId> = self.items.keys().filter(|id| !listed.iter().any(|p| &p.id == *id)).cloned().collect();
		for id in &stale {
			self.items.shift_remove(id);
		}
		stale
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::product::RawRecord;

	fn product(id: &str, price: f64) -> Product {
		Product {
			id: id.into(),
			name: format!("item {id}"),
			description: String::new(),
			price,
			image_url: String::new(),
		}
	}

	#[test]
	fn subtotal_sums_members() {
		let mut cart = CartLedger::new();
		assert_eq!(cart.subtotal(), 0.0);
		cart.add(product("a", 10.0));
		cart.add(product("b", 5.5));
		assert_eq!(cart.subtotal(), 15.5);
	}

	#[test]
	fn add_is_idempotent() {
		let mut cart = CartLedger::new();
		assert!(cart.add(product("a", 10.0)));
		assert!(!cart.add(product("a", 10.0)));
		assert_eq!(cart.len(), 1);
		assert_eq!(cart.subtotal(), 10.0);
	}

	#[test]
	fn remove_is_idempotent() {
		let mut cart = CartLedger::new();
		cart.add(product("a", 3.0));
		assert!(cart.remove("missing").is_none());
		assert!(cart.remove("missing").is_none());
		assert_eq!(cart.subtotal(), 3.0);

		assert!(cart.remove("a").is_some());
		assert!(cart.remove("a").is_none());
		assert_eq!(cart.subtotal(), 0.0);
	}

	#[test]
	fn prune_drops_delisted_products() {
		let mut catalog = CatalogCache::default();
		catalog.on_snapshot(&[RawRecord::new("a", json!({ "price": 1.0 }))]);

		let mut cart = CartLedger::new();
		cart.add(product("a", 1.0));
		cart.add(product("gone", 2.0));
		assert_eq!(cart.prune(&catalog), vec!["gone".to_string()]);
		assert!(cart.contains("a"));
		assert_eq!(cart.iter().count(), 1);
	}
}
