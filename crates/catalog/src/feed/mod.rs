//! Push-based catalog feed.
//!
//! A [`CatalogFeed`] hands out [`FeedSubscription`]s: long-lived streams of
//! full snapshots interleaved with non-fatal errors. Nothing is diffed; every
//! snapshot replaces whatever the consumer had before.
//!
//! ```text
//! producer task ──► mpsc ──► FeedSubscription (Stream) ──► consumer
//!        │  (full)    overflow ──┘      │
//!        ▲                              │
//!        └────── CancellationToken ◄────┘ (cancel / drop)
//! ```
//!
//! Synchronous producers never wait. Once the buffer is full, further events
//! collapse into a single overflow slot that always holds the newest one, so
//! the last event a consumer sees is the last one produced.

mod firebase;
mod memory;
mod sse;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

pub use firebase::FirebaseFeed;
use futures::Stream;
pub use memory::MemoryFeed;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::FeedError;
use crate::product::RawRecord;

/// Buffered events per subscription before the producer waits.
pub const SUBSCRIPTION_BUFFER: usize = 16;

/// Newest event that did not fit in the buffer.
///
/// Held locked while either side touches the channel, so everything in the
/// channel is always older than the slot.
type Overflow = Arc<Mutex<Option<FeedEvent>>>;

/// A complete set of records meant to replace all prior state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
	pub records: Vec<RawRecord>,
}

impl Snapshot {
	pub fn new(records: Vec<RawRecord>) -> Self {
		Self { records }
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

/// One delivery from a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
	Snapshot(Snapshot),
	Error(FeedError),
}

/// Source of catalog snapshots.
pub trait CatalogFeed: Send + Sync + 'static {
	/// Starts a subscription to `collection`.
	///
	/// Delivery begins asynchronously; the subscription stays open across
	/// errors until it is cancelled or dropped.
	fn subscribe(&self, collection: &str) -> FeedSubscription;
}

/// Producer half of a subscription, held by feed implementations.
#[derive(Debug, Clone)]
pub struct FeedSink {
	tx: mpsc::Sender<FeedEvent>,
	overflow: Overflow,
	cancel: CancellationToken,
}

impl FeedSink {
	/// Delivers one event. Returns `false` once the consumer is gone.
	pub async fn deliver(&self, event: FeedEvent) -> bool {
		if self.cancel.is_cancelled() {
			return false;
		}
		{
			let mut overflow = self.overflow.lock();
			if overflow.is_some() {
				*overflow = Some(event);
				return !self.tx.is_closed();
			}
		}
		tokio::select! {
			sent = self.tx.send(event) => sent.is_ok(),
			_ = self.cancel.cancelled() => false,
		}
	}

	/// Non-waiting delivery used from synchronous producers.
	///
	/// When the buffer is full the event replaces whatever sits in the
	/// overflow slot; only the event it displaces is lost.
	pub fn try_deliver(&self, event: FeedEvent) -> bool {
		if self.cancel.is_cancelled() {
			return false;
		}
		let mut overflow = self.overflow.lock();
		if overflow.is_some() {
			tracing::debug!("feed.subscription.overflow_replaced");
			*overflow = Some(event);
			return !self.tx.is_closed();
		}
		match self.tx.try_send(event) {
			Ok(()) => true,
			Err(mpsc::error::TrySendError::Full(event)) => {
				tracing::debug!(buffer = SUBSCRIPTION_BUFFER, "feed.subscription.overflow");
				*overflow = Some(event);
				true
			}
			Err(mpsc::error::TrySendError::Closed(_)) => false,
		}
	}

	pub fn is_closed(&self) -> bool {
		self.cancel.is_cancelled() || self.tx.is_closed()
	}

	/// Resolves when the consumer cancels or drops the subscription.
	pub async fn closed(&self) {
		tokio::select! {
			_ = self.cancel.cancelled() => {}
			_ = self.tx.closed() => {}
		}
	}

	pub fn cancellation(&self) -> &CancellationToken {
		&self.cancel
	}
}

/// Consumer half: a lazy, non-restartable stream of [`FeedEvent`]s.
///
/// Dropping the subscription cancels the producer.
#[derive(Debug)]
pub struct FeedSubscription {
	rx: mpsc::Receiver<FeedEvent>,
	overflow: Overflow,
	cancel: CancellationToken,
}

impl FeedSubscription {
	/// Creates a connected sink/subscription pair.
	pub fn channel() -> (FeedSink, Self) {
		let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
		let overflow = Overflow::default();
		let cancel = CancellationToken::new();
		(
			FeedSink { tx, overflow: Arc::clone(&overflow), cancel: cancel.clone() },
			Self { rx, overflow, cancel },
		)
	}

	/// Waits for the next event; `None` once the producer has stopped.
	pub async fn next_event(&mut self) -> Option<FeedEvent> {
		std::future::poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
	}

	/// Unregisters from the producer. Already buffered events are discarded.
	pub fn cancel(&mut self) {
		self.cancel.cancel();
		self.rx.close();
		self.overflow.lock().take();
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}
}

impl Stream for FeedSubscription {
	type Item = FeedEvent;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		if this.cancel.is_cancelled() {
			return Poll::Ready(None);
		}
		// The channel drains before the overflow slot is read.
		let mut overflow = this.overflow.lock();
		match this.rx.poll_recv(cx) {
			Poll::Ready(Some(event)) => Poll::Ready(Some(event)),
			Poll::Ready(None) => Poll::Ready(overflow.take()),
			Poll::Pending => match overflow.take() {
				Some(event) => Poll::Ready(Some(event)),
				None => Poll::Pending,
			},
		}
	}
}

impl Drop for FeedSubscription {
	fn drop(&mut self) {
		self.cancel.cancel();
	}
}

#[cfg(test)]
mod tests {
	use futures::{FutureExt, StreamExt};

	use super::*;

	fn error(n: usize) -> FeedEvent {
		FeedEvent::Error(FeedError::new(format!("e{n}")))
	}

	#[tokio::test]
	async fn dropping_subscription_closes_sink() {
		let (sink, sub) = FeedSubscription::channel();
		assert!(!sink.is_closed());
		drop(sub);
		assert!(sink.is_closed());
		assert!(!sink.deliver(FeedEvent::Snapshot(Snapshot::default())).await);
	}

	#[tokio::test]
	async fn errors_do_not_end_the_stream() {
		let (sink, mut sub) = FeedSubscription::channel();
		assert!(sink.deliver(FeedEvent::Error(FeedError::new("offline"))).await);
		assert!(sink.deliver(FeedEvent::Snapshot(Snapshot::default())).await);

		assert_eq!(sub.next().await, Some(FeedEvent::Error(FeedError::new("offline"))));
		assert_eq!(sub.next().await, Some(FeedEvent::Snapshot(Snapshot::default())));
	}

	#[tokio::test]
	async fn cancelled_stream_yields_none() {
		let (sink, mut sub) = FeedSubscription::channel();
		assert!(sink.try_deliver(FeedEvent::Snapshot(Snapshot::default())));
		sub.cancel();
		assert_eq!(sub.next().await, None);
		assert!(!sink.try_deliver(FeedEvent::Snapshot(Snapshot::default())));
	}

	#[tokio::test]
	async fn overflow_keeps_the_newest_event() {
		let (sink, mut sub) = FeedSubscription::channel();
		let produced = SUBSCRIPTION_BUFFER + 4;
		for n in 0..produced {
			assert!(sink.try_deliver(error(n)));
		}

		let mut seen = Vec::new();
		while let Some(Some(event)) = sub.next().now_or_never() {
			seen.push(event);
		}
		assert_eq!(seen.len(), SUBSCRIPTION_BUFFER + 1);
		assert_eq!(seen.first(), Some(&error(0)));
		assert_eq!(seen.last(), Some(&error(produced - 1)));
	}

	#[tokio::test]
	async fn overflow_is_delivered_after_the_producer_stops() {
		let (sink, mut sub) = FeedSubscription::channel();
		for n in 0..=SUBSCRIPTION_BUFFER {
			assert!(sink.try_deliver(error(n)));
		}
		drop(sink);

		let mut last = None;
		while let Some(event) = sub.next_event().await {
			last = Some(event);
		}
		assert_eq!(last, Some(error(SUBSCRIPTION_BUFFER)));
	}

	#[tokio::test]
	async fn delivery_resumes_through_the_channel_once_drained() {
		let (sink, mut sub) = FeedSubscription::channel();
		for n in 0..=SUBSCRIPTION_BUFFER {
			assert!(sink.try_deliver(error(n)));
		}
		while sub.next().now_or_never().flatten().is_some() {}

		assert!(sink.try_deliver(error(99)));
		assert_eq!(sub.next().await, Some(error(99)));
	}
}
