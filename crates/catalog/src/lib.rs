//! Catalog synchronization and mutation pipeline for the storefront client.
//!
//! A realtime feed pushes full catalog snapshots into a [`CatalogCache`];
//! product writes go to an authoritative [`DocumentStore`], with product
//! images uploaded to an [`ImageHost`] first. Every observable change is
//! applied by the interactive owner, [`Storefront`], after background work
//! reports back over the [`msg`] bus.
//!
//! # Modules
//!
//! - [`feed`] - push-based snapshot subscriptions (Firebase SSE, in-memory)
//! - [`cache`] - the atomically swapped product list
//! - [`pipeline`] - async create/update/delete cores
//! - [`store`] / [`image`] - remote adapters and their in-memory doubles
//! - [`session`] - [`Storefront`], the interactive-context owner
//! - [`config`] - TOML configuration with environment overrides

pub mod cache;
pub mod cart;
pub mod config;
pub mod error;
pub mod feed;
pub mod image;
pub mod msg;
pub mod mutation;
pub mod notify;
pub mod payment;
pub mod pipeline;
pub mod product;
pub mod services;
pub mod session;
pub mod store;

pub use cache::{CatalogCache, CatalogReader, SnapshotReport};
pub use cart::CartLedger;
pub use config::{ConfigError, StorefrontConfig};
pub use error::{FeedError, ImageHostError, PipelineError, StoreError};
pub use feed::{CatalogFeed, FeedEvent, FeedSubscription, Snapshot};
pub use image::{ImageHost, ImageResource, UploadArtifact, UploadReceipt};
pub use msg::Dirty;
pub use mutation::{Callbacks, MutationId, MutationKind, MutationPhase, MutationSuccess};
pub use notify::{Level, Notification};
pub use payment::{PaymentGateway, PaymentReceipt, PaymentRequest, StubPaymentGateway};
pub use pipeline::MutationPipeline;
pub use product::{FieldUpdate, Product, ProductDraft, ProductId, RawRecord};
pub use services::{BuildError, Services};
pub use session::Storefront;
pub use store::DocumentStore;
