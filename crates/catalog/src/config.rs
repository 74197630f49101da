//! Runtime configuration.
//!
//! Configuration lives in a TOML file, by default
//! `$XDG_CONFIG_HOME/storefront/config.toml`:
//!
//! ```toml
//! [feed]
//! base_url = "https://shop-default-rtdb.firebaseio.com"
//! collection = "Products"
//!
//! [store]
//! project_id = "shop"
//! collection = "products"
//!
//! [image_host]
//! client_id = "..."            # or STOREFRONT_IMAGE_HOST_CLIENT_ID
//!
//! [pipeline]
//! refresh_after_create = false
//! empty_snapshot_selection = "retain"
//! orphaned_uploads = "retain"
//! ```
//!
//! Only the image host client id is required. Secrets can be supplied through
//! the environment so they never need to be written to disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable overriding `image_host.client_id`.
pub const ENV_IMAGE_HOST_CLIENT_ID: &str = "STOREFRONT_IMAGE_HOST_CLIENT_ID";
/// Environment variable overriding `feed.auth_token`.
pub const ENV_FEED_AUTH_TOKEN: &str = "STOREFRONT_FEED_AUTH_TOKEN";
/// Environment variable overriding `store.api_key`.
pub const ENV_STORE_API_KEY: &str = "STOREFRONT_STORE_API_KEY";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},
	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),
	#[error("missing required field: {0}")]
	MissingField(&'static str),
	#[error("invalid value for {field}: {reason}")]
	Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// What happens to the current selection when a snapshot arrives empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptySnapshotSelection {
	/// Keep pointing at the last selected product.
	#[default]
	Retain,
	/// Clear the selection.
	Clear,
}

/// What happens to an image uploaded by a create whose document write failed.
///
/// The image is never deleted from the host; this only controls how loudly
/// the orphan is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanedUploadPolicy {
	/// Log the orphaned link.
	#[default]
	Retain,
	/// Log it and raise a warning notification naming the link.
	Notify,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
	pub base_url: String,
	/// Realtime collection the catalog is mirrored from.
	pub collection: String,
	pub auth_token: Option<String>,
	pub reconnect_delay_ms: u64,
}

impl Default for FeedConfig {
	fn default() -> Self {
		Self {
			base_url: String::new(),
			collection: "Products".into(),
			auth_token: None,
			reconnect_delay_ms: 2_000,
		}
	}
}

impl FeedConfig {
	pub fn reconnect_delay(&self) -> Duration {
		Duration::from_millis(self.reconnect_delay_ms)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
	pub base_url: String,
	pub project_id: String,
	pub database: String,
	/// Document collection mutations are written to.
	pub collection: String,
	pub api_key: Option<String>,
	pub timeout_secs: u64,
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self {
			base_url: "https://firestore.googleapis.com/v1".into(),
			project_id: String::new(),
			database: "(default)".into(),
			collection: "products".into(),
			api_key: None,
			timeout_secs: 30,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageHostConfig {
	pub base_url: String,
	/// Client identifier sent with every upload. Sensitive.
	pub client_id: Option<String>,
	pub connect_timeout_secs: u64,
	pub timeout_secs: u64,
}

impl Default for ImageHostConfig {
	fn default() -> Self {
		Self {
			base_url: "https://api.imgur.com".into(),
			client_id: None,
			connect_timeout_secs: 30,
			timeout_secs: 120,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
	/// Directory for transient upload artifacts.
	pub scratch_dir: Option<PathBuf>,
	/// Re-subscribe to the feed after a successful create, as update does.
	pub refresh_after_create: bool,
	pub empty_snapshot_selection: EmptySnapshotSelection,
	pub orphaned_uploads: OrphanedUploadPolicy,
}

impl Default for PipelineConfig {
	fn default() -> Self {
		Self {
			scratch_dir: None,
			refresh_after_create: false,
			empty_snapshot_selection: EmptySnapshotSelection::default(),
			orphaned_uploads: OrphanedUploadPolicy::default(),
		}
	}
}

impl PipelineConfig {
	/// Scratch directory, falling back to the platform cache directory.
	pub fn scratch_dir(&self) -> PathBuf {
		self.scratch_dir
			.clone()
			.or_else(|| dirs::cache_dir().map(|d| d.join("storefront")))
			.unwrap_or_else(|| std::env::temp_dir().join("storefront"))
	}
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorefrontConfig {
	pub feed: FeedConfig,
	pub store: StoreConfig,
	pub image_host: ImageHostConfig,
	pub pipeline: PipelineConfig,
}

impl StorefrontConfig {
	/// Default config file location.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|d| d.join("storefront").join("config.toml"))
	}

	/// Parses configuration text without consulting the environment.
	pub fn parse_str(input: &str) -> Result<Self> {
		Ok(toml::from_str(input)?)
	}

	/// Loads a config file and applies environment overrides.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let mut config = Self::parse_str(&text)?;
		config.apply_env_overrides(|key| std::env::var(key).ok());
		config.validate()?;
		tracing::debug!(path = %path.display(), "config.loaded");
		Ok(config)
	}

	/// Overrides secrets from `lookup` (normally the process environment).
	pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		let present = |key: &str| lookup(key).filter(|v| !v.is_empty());
		if let Some(id) = present(ENV_IMAGE_HOST_CLIENT_ID) {
			self.image_host.client_id = Some(id);
		}
		if let Some(token) = present(ENV_FEED_AUTH_TOKEN) {
			self.feed.auth_token = Some(token);
		}
		if let Some(key) = present(ENV_STORE_API_KEY) {
			self.store.api_key = Some(key);
		}
	}

	/// Checks fields that have no usable default.
	pub fn validate(&self) -> Result<()> {
		match self.image_host.client_id.as_deref() {
			None | Some("") => return Err(ConfigError::MissingField("image_host.client_id")),
			Some(_) => {}
		}
		for (field, value) in [("feed.base_url", &self.feed.base_url), ("store.base_url", &self.store.base_url), ("image_host.base_url", &self.image_host.base_url)] {
			if !value.is_empty() {
				url::Url::parse(value).map_err(|e| ConfigError::Invalid { field, reason: e.to_string() })?;
			}
		}
		if self.feed.collection.is_empty() {
			return Err(ConfigError::MissingField("feed.collection"));
		}
		if self.store.collection.is_empty() {
			return Err(ConfigError::MissingField("store.collection"));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_file_uses_defaults() {
		let config = StorefrontConfig::parse_str("").unwrap();
		assert_eq!(config.feed.collection, "Products");
		assert_eq!(config.store.collection, "products");
		assert_eq!(config.image_host.base_url, "https://api.imgur.com");
		assert!(!config.pipeline.refresh_after_create);
		assert_eq!(config.pipeline.empty_snapshot_selection, EmptySnapshotSelection::Retain);
		assert_eq!(config.pipeline.orphaned_uploads, OrphanedUploadPolicy::Retain);
	}

	#[test]
	fn parses_policies() {
		let config = StorefrontConfig::parse_str(
			r#"
			[pipeline]
			refresh_after_create = true
			empty_snapshot_selection = "clear"
			orphaned_uploads = "notify"
			"#,
		)
		.unwrap();
		assert!(config.pipeline.refresh_after_create);
		assert_eq!(config.pipeline.empty_snapshot_selection, EmptySnapshotSelection::Clear);
		assert_eq!(config.pipeline.orphaned_uploads, OrphanedUploadPolicy::Notify);
	}

	#[test]
	fn unknown_fields_are_rejected() {
		assert!(matches!(StorefrontConfig::parse_str("[feed]\ncolection = \"x\""), Err(ConfigError::Parse(_))));
	}

	#[test]
	fn client_id_is_required() {
		let config = StorefrontConfig::parse_str("").unwrap();
		assert!(matches!(config.validate(), Err(ConfigError::MissingField("image_host.client_id"))));
	}

	#[test]
	fn env_overrides_secrets() {
		let mut config = StorefrontConfig::parse_str("[image_host]\nclient_id = \"from-file\"").unwrap();
		config.apply_env_overrides(|key| match key {
			ENV_IMAGE_HOST_CLIENT_ID => Some("from-env".into()),
			ENV_FEED_AUTH_TOKEN => Some(String::new()),
			_ => None,
		});
		assert_eq!(config.image_host.client_id.as_deref(), Some("from-env"));
		assert_eq!(config.feed.auth_token, None);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn invalid_urls_are_rejected() {
		let config = StorefrontConfig::parse_str("[image_host]\nclient_id = \"x\"\nbase_url = \"not a url\"").unwrap();
		assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "image_host.base_url", .. })));
	}

	#[test]
	fn load_reports_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let err = StorefrontConfig::load(&dir.path().join("absent.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Io { .. }));
	}
}
