//! Composition root for the remote adapters.

use std::sync::Arc;

use thiserror::Error;

use crate::config::StorefrontConfig;
use crate::error::{FeedError, ImageHostError, StoreError};
use crate::feed::{CatalogFeed, FirebaseFeed};
use crate::image::{ImageHost, ImgurClient};
use crate::payment::{PaymentGateway, StubPaymentGateway};
use crate::store::{DocumentStore, FirestoreStore};

/// Adapter that could not be constructed from configuration.
#[derive(Debug, Error)]
pub enum BuildError {
	#[error("feed: {0}")]
	Feed(#[from] FeedError),
	#[error("document store: {0}")]
	Store(#[from] StoreError),
	#[error("image host: {0}")]
	ImageHost(#[from] ImageHostError),
}

/// Every external collaborator of a [`crate::Storefront`].
#[derive(Clone)]
pub struct Services {
	pub feed: Arc<dyn CatalogFeed>,
	pub store: Arc<dyn DocumentStore>,
	pub image_host: Arc<dyn ImageHost>,
	pub payments: Arc<dyn PaymentGateway>,
}

impl std::fmt::Debug for Services {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Services").finish_non_exhaustive()
	}
}

impl Services {
	/// Builds the HTTP adapters described by `config`.
	pub fn from_config(config: &StorefrontConfig) -> Result<Self, BuildError> {
		let feed = FirebaseFeed::new(&config.feed)?;
		let store = FirestoreStore::new(&config.store)?;
		let image_host = ImgurClient::new(&config.image_host)?;
		tracing::debug!(
			feed_collection = %config.feed.collection,
			store_collection = %config.store.collection,
			"services.built"
		);
		Ok(Self {
			feed: Arc::new(feed),
			store: Arc::new(store),
			image_host: Arc::new(image_host),
			payments: Arc::new(StubPaymentGateway),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_project_id_is_a_config_error() {
		let mut config = StorefrontConfig::default();
		config.feed.base_url = "https://shop.example.firebaseio.com".into();
		config.image_host.client_id = Some("abc".into());
		let err = Services::from_config(&config).unwrap_err();
		assert!(matches!(err, BuildError::Store(StoreError::Config(_))), "got {err:?}");
	}

	#[test]
	fn complete_config_builds() {
		let config = StorefrontConfig::parse_str(
			r#"
			[feed]
			base_url = "https://shop.example.firebaseio.com"
			[store]
			project_id = "shop"
			[image_host]
			client_id = "abc"
			"#,
		)
		.unwrap();
		assert!(Services::from_config(&config).is_ok());
	}
}
