//! The interactive-context owner of catalog state.
//!
//! [`Storefront`] is the only place observable state changes. Work that
//! touches the network or the filesystem runs on background tasks, which
//! report back through the [`crate::msg`] bus; the owner applies those
//! reports when it drains the bus, and caller callbacks run there too.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;

use storefront_worker::{InFlight, TaskClass, TaskFailure};
use tokio_util::sync::CancellationToken;

use crate::cache::{CatalogCache, CatalogReader};
use crate::cart::CartLedger;
use crate::config::{OrphanedUploadPolicy, StorefrontConfig};
use crate::error::PipelineError;
use crate::feed::{CatalogFeed, FeedEvent};
use crate::image::ImageResource;
use crate::msg::{self, CatalogMsg, Dirty, FeedMsg, MsgReceiver, MsgSender};
use crate::mutation::{Callbacks, MutationId, MutationKind, MutationOutcome, MutationPhase, MutationRecord, MutationSuccess};
use crate::notify::Notification;
use crate::payment::{self, PaymentGateway, PaymentRequest};
use crate::pipeline::MutationPipeline;
use crate::product::{FieldUpdate, ProductDraft, ProductId};
use crate::services::Services;

/// Finished mutations kept for inspection; older ones are forgotten.
pub const FINISHED_MUTATION_HISTORY: usize = 64;

/// Cancellation handle for the task forwarding one feed subscription.
#[derive(Debug)]
struct Forwarder {
	generation: u64,
	cancel: CancellationToken,
}

/// Owns the catalog cache, the cart and every in-flight mutation.
///
/// Not `Send`: it lives on the interactive context and caller callbacks are
/// stored alongside it.
pub struct Storefront {
	feed: Arc<dyn CatalogFeed>,
	payments: Arc<dyn PaymentGateway>,
	pipeline: MutationPipeline,
	feed_collection: String,
	refresh_after_create: bool,
	orphaned_uploads: OrphanedUploadPolicy,

	cache: CatalogCache,
	cart: CartLedger,
	notifications: Vec<Notification>,
	mutations: BTreeMap<MutationId, MutationRecord>,
	/// Terminal mutations, oldest first.
	finished: VecDeque<MutationId>,
	callbacks: HashMap<MutationId, Callbacks>,
	in_flight: InFlight,

	msg_tx: MsgSender,
	msg_rx: MsgReceiver,
	forwarder: Option<Forwarder>,
	/// Generation of the live subscription; deliveries tagged otherwise are stale.
	feed_generation: u64,
	next_mutation: u64,
}

impl std::fmt::Debug for Storefront {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Storefront")
			.field("feed_collection", &self.feed_collection)
			.field("feed_generation", &self.feed_generation)
			.field("products", &self.cache.len())
			.field("cart", &self.cart.len())
			.field("in_flight", &self.in_flight.len())
			.finish_non_exhaustive()
	}
}

impl Storefront {
	pub fn new(services: Services, config: &StorefrontConfig) -> Self {
		let Services {
			feed,
			store,
			image_host,
			payments,
		} = services;
		let pipeline = MutationPipeline::new(store, image_host, config.store.collection.clone(), config.pipeline.scratch_dir());
		let (msg_tx, msg_rx) = msg::channel();

		Self {
			feed,
			payments,
			pipeline,
			feed_collection: config.feed.collection.clone(),
			refresh_after_create: config.pipeline.refresh_after_create,
			orphaned_uploads: config.pipeline.orphaned_uploads,
			cache: CatalogCache::new(config.pipeline.empty_snapshot_selection),
			cart: CartLedger::new(),
			notifications: Vec::new(),
			mutations: BTreeMap::new(),
			finished: VecDeque::new(),
			callbacks: HashMap::new(),
			in_flight: InFlight::new(TaskClass::Background),
			msg_tx,
			msg_rx,
			forwarder: None,
			feed_generation: 0,
			next_mutation: 0,
		}
	}

	/// Starts listening to the catalog feed, replacing any live subscription.
	///
	/// Deliveries from the replaced subscription that are still queued are
	/// discarded when drained.
	pub fn subscribe_catalog(&mut self) {
		self.stop_forwarder();
		self.feed_generation += 1;
		let generation = self.feed_generation;

		let mut subscription = self.feed.subscribe(&self.feed_collection);
		let cancel = CancellationToken::new();
		let token = cancel.clone();
		let tx = self.msg_tx.clone();
		let forward = async move {
			loop {
				let event = tokio::select! {
					_ = token.cancelled() => break,
					event = subscription.next_event() => event,
				};
				let msg = match event {
					Some(FeedEvent::Snapshot(snapshot)) => FeedMsg::Snapshot { generation, snapshot },
					Some(FeedEvent::Error(error)) => FeedMsg::Error { generation, error },
					None => {
						let _ = tx.send(FeedMsg::Closed { generation }.into());
						break;
					}
				};
				if tx.send(msg.into()).is_err() {
					break;
				}
			}
			tracing::debug!(generation, "storefront.feed.forwarder_stopped");
		};

		match storefront_worker::spawn(TaskClass::Background, forward) {
			Ok(_) => {
				tracing::debug!(collection = %self.feed_collection, generation, "storefront.feed.subscribed");
				self.forwarder = Some(Forwarder { generation, cancel });
			}
			Err(err) => {
				tracing::error!(collection = %self.feed_collection, error = %err, "storefront.feed.subscribe_failed");
				self.notify(Notification::error(format!("Failed to fetch products: {err}")));
			}
		}
	}

	/// Re-subscribes to pick up a fresh snapshot.
	pub fn refresh_catalog(&mut self) {
		tracing::debug!(generation = self.feed_generation, "storefront.feed.refresh");
		self.subscribe_catalog();
	}

	pub(crate) fn apply_feed_msg(&mut self, msg: FeedMsg) -> Dirty {
		let generation = match &msg {
			FeedMsg::Snapshot { generation, .. } | FeedMsg::Error { generation, .. } | FeedMsg::Closed { generation } => *generation,
		};
		if generation != self.feed_generation {
			tracing::trace!(generation, live = self.feed_generation, "storefront.feed.stale");
			return Dirty::NONE;
		}

		match msg {
			FeedMsg::Snapshot { snapshot, .. } => {
				self.cache.on_snapshot(&snapshot.records);
				Dirty::CATALOG
			}
			FeedMsg::Error { error, .. } => {
				self.cache.on_feed_error(&error);
				self.notify(Notification::error(format!("Failed to fetch products: {error}")));
				Dirty::NOTIFICATIONS
			}
			FeedMsg::Closed { .. } => {
				tracing::debug!(generation, "storefront.feed.closed");
				self.forwarder = None;
				Dirty::NONE
			}
		}
	}

	/// Uploads `image` and creates a product linking it.
	pub fn create_product(&mut self, draft: ProductDraft, image: ImageResource, callbacks: Callbacks) -> MutationId {
		let pipeline = self.pipeline.clone();
		self.launch(MutationKind::Create, None, callbacks, async move {
			pipeline.create(draft, image).await.map(MutationSuccess::Created)
		})
	}

	/// Writes a subset of fields. On success the catalog is re-subscribed; on
	/// failure an error notification is raised.
	pub fn update_product(&mut self, id: impl Into<ProductId>, fields: FieldUpdate, callbacks: Callbacks) -> MutationId {
		let id = id.into();
		let pipeline = self.pipeline.clone();
		let target = id.clone();
		self.launch(MutationKind::Update, Some(id), callbacks, async move {
			pipeline.update(&target, fields).await.map(|()| MutationSuccess::Updated)
		})
	}

	/// Fire-and-forget delete. The outcome is only logged and the cache keeps
	/// the product until the next snapshot.
	pub fn delete_product(&mut self, id: impl Into<ProductId>) -> MutationId {
		let id = id.into();
		let pipeline = self.pipeline.clone();
		let target = id.clone();
		self.launch(MutationKind::Delete, Some(id), Callbacks::new(), async move {
			pipeline.delete(&target).await.map(|()| MutationSuccess::Deleted)
		})
	}

	pub fn initiate_payment(&mut self, phone_number: impl Into<String>, amount: f64, callbacks: Callbacks) -> MutationId {
		let request = PaymentRequest::new(phone_number, amount);
		let payments = Arc::clone(&self.payments);
		self.launch(MutationKind::Payment, None, callbacks, async move {
			let receipt = payment::initiate(&*payments, request?).await?;
			Ok::<_, PipelineError>(MutationSuccess::Paid(receipt))
		})
	}

	/// Charges the current cart subtotal.
	pub fn initiate_checkout(&mut self, phone_number: impl Into<String>, callbacks: Callbacks) -> MutationId {
		let amount = self.cart.subtotal();
		self.initiate_payment(phone_number, amount, callbacks)
	}

	fn launch<F>(&mut self, kind: MutationKind, product_id: Option<ProductId>, callbacks: Callbacks, work: F) -> MutationId
	where
		F: Future<Output = MutationOutcome> + Send + 'static,
	{
		self.next_mutation += 1;
		let id = MutationId(self.next_mutation);
		let mut record = MutationRecord::new(kind, product_id);
		record.start();
		self.mutations.insert(id, record);
		self.callbacks.insert(id, callbacks);

		let tx = self.msg_tx.clone();
		let spawned = self.in_flight.spawn(id.0, async move {
			let outcome = work.await;
			let _ = tx.send(CatalogMsg::MutationDone { id, outcome });
		});
		match spawned {
			Ok(()) => tracing::debug!(%id, ?kind, "storefront.mutation.started"),
			Err(err) => {
				tracing::error!(%id, ?kind, error = %err, "storefront.mutation.spawn_failed");
				let _ = self.msg_tx.send(CatalogMsg::MutationDone {
					id,
					outcome: Err(PipelineError::Aborted(err.to_string())),
				});
			}
		}
		id
	}

	pub(crate) fn complete_mutation(&mut self, id: MutationId, outcome: MutationOutcome) -> Dirty {
		let Some(record) = self.mutations.get_mut(&id) else {
			tracing::warn!(%id, "storefront.mutation.unknown");
			return Dirty::NONE;
		};
		if !record.finish(&outcome) {
			tracing::debug!(%id, "storefront.mutation.already_finished");
			return Dirty::NONE;
		}
		let kind = record.kind;
		let product_id = record.product_id.clone();
		let mut dirty = Dirty::MUTATIONS;

		match (kind, &outcome) {
			(MutationKind::Create, Ok(_)) => {
				tracing::info!(%id, product_id = ?product_id, "storefront.create.succeeded");
				if self.refresh_after_create {
					self.refresh_catalog();
				}
			}
			(MutationKind::Create, Err(err)) => {
				tracing::warn!(%id, error = %err, "storefront.create.failed");
				if let (OrphanedUploadPolicy::Notify, Some(link)) = (self.orphaned_uploads, err.orphaned_link()) {
					self.notify(Notification::warn(format!("Uploaded image was not saved: {link}")));
					dirty |= Dirty::NOTIFICATIONS;
				}
			}
			(MutationKind::Update, Ok(_)) => {
				tracing::info!(%id, product_id = ?product_id, "storefront.update.succeeded");
				self.refresh_catalog();
			}
			(MutationKind::Update, Err(err)) => {
				tracing::warn!(%id, product_id = ?product_id, error = %err, "storefront.update.failed");
				self.notify(Notification::error(format!("Update failed: {err}")));
				dirty |= Dirty::NOTIFICATIONS;
			}
			(MutationKind::Delete, Ok(_)) => tracing::info!(%id, product_id = ?product_id, "storefront.delete.succeeded"),
			(MutationKind::Delete, Err(err)) => tracing::warn!(%id, product_id = ?product_id, error = %err, "storefront.delete.failed"),
			(MutationKind::Payment, Ok(success)) => {
				tracing::info!(%id, "storefront.payment.succeeded");
				if let MutationSuccess::Paid(receipt) = success {
					self.notify(Notification::success(receipt.message.clone()));
					dirty |= Dirty::NOTIFICATIONS;
				}
			}
			(MutationKind::Payment, Err(err)) => tracing::warn!(%id, error = %err, "storefront.payment.failed"),
		}

		if let Some(callbacks) = self.callbacks.remove(&id) {
			callbacks.resolve(&outcome);
		}
		self.retire(id);
		dirty
	}

	fn retire(&mut self, id: MutationId) {
		self.finished.push_back(id);
		while self.finished.len() > FINISHED_MUTATION_HISTORY {
			if let Some(oldest) = self.finished.pop_front() {
				self.mutations.remove(&oldest);
				tracing::trace!(id = %oldest, "storefront.mutation.forgotten");
			}
		}
	}

	fn abort_mutation(&mut self, failure: TaskFailure) -> Dirty {
		self.complete_mutation(MutationId(failure.key), Err(PipelineError::Aborted(failure.error.to_string())))
	}

	/// Applies every pending message without waiting.
	pub fn drain_messages(&mut self) -> Dirty {
		let mut dirty = Dirty::NONE;
		for failure in self.in_flight.reap() {
			dirty |= self.abort_mutation(failure);
		}
		while let Ok(msg) = self.msg_rx.try_recv() {
			dirty |= msg.apply(self);
		}
		dirty
	}

	/// Waits for at least one message or a mutation task that died without
	/// reporting, then drains the rest.
	pub async fn pump(&mut self) -> Dirty {
		let dirty = tokio::select! {
			Some(msg) = self.msg_rx.recv() => msg.apply(self),
			failure = self.in_flight.next_failure() => self.abort_mutation(failure),
		};
		dirty | self.drain_messages()
	}

	/// Waits for every in-flight mutation to finish and applies the results.
	///
	/// The feed forwarder is not waited for.
	pub async fn settle(&mut self) -> Dirty {
		let mut dirty = Dirty::NONE;
		for failure in self.in_flight.settle().await {
			dirty |= self.abort_mutation(failure);
		}
		dirty | self.drain_messages()
	}

	pub fn catalog(&self) -> &CatalogCache {
		&self.cache
	}

	/// Thread-safe view of the product list.
	pub fn reader(&self) -> CatalogReader {
		self.cache.reader()
	}

	pub fn select(&mut self, id: &str) -> bool {
		self.cache.select(id)
	}

	pub fn cart(&self) -> &CartLedger {
		&self.cart
	}

	pub fn cart_mut(&mut self) -> &mut CartLedger {
		&mut self.cart
	}

	/// Adds a listed product to the cart by id. Nothing changes if it is not
	/// listed or already in the cart.
	pub fn add_to_cart(&mut self, id: &str) -> Dirty {
		let Some(product) = self.cache.get(id) else {
			return Dirty::NONE;
		};
		if self.cart.add(product) { Dirty::CART } else { Dirty::NONE }
	}

	pub fn remove_from_cart(&mut self, id: &str) -> Dirty {
		match self.cart.remove(id) {
			Some(_) => Dirty::CART,
			None => Dirty::NONE,
		}
	}

	pub fn mutation(&self, id: MutationId) -> Option<&MutationRecord> {
		self.mutations.get(&id)
	}

	pub fn mutation_phase(&self, id: MutationId) -> Option<MutationPhase> {
		self.mutations.get(&id).map(|record| record.phase)
	}

	/// Number of mutations whose background task has not been reaped.
	pub fn pending_mutations(&self) -> usize {
		self.in_flight.len()
	}

	pub fn notifications(&self) -> &[Notification] {
		&self.notifications
	}

	pub fn take_notifications(&mut self) -> Vec<Notification> {
		std::mem::take(&mut self.notifications)
	}

	/// Stops the feed subscription. Queued deliveries become stale.
	pub fn shutdown(&mut self) {
		self.stop_forwarder();
		self.feed_generation += 1;
		tracing::debug!(pending = self.in_flight.len(), "storefront.shutdown");
	}

	fn stop_forwarder(&mut self) {
		if let Some(forwarder) = self.forwarder.take() {
			tracing::trace!(generation = forwarder.generation, "storefront.feed.cancel");
			forwarder.cancel.cancel();
		}
	}

	fn notify(&mut self, notification: Notification) {
		tracing::debug!(level = ?notification.level, message = %notification.message, "storefront.notify");
		self.notifications.push(notification);
	}
}

impl Drop for Storefront {
	fn drop(&mut self) {
		self.stop_forwarder();
	}
}
