//! Message bus into the interactive context.
//!
//! Background tasks never touch observable state. They post a
//! [`CatalogMsg`] instead, and the interactive owner applies it when it
//! drains the bus, collecting [`Dirty`] flags for the presentation layer.
//!
//! ```text
//! feed forwarder ──┐
//!                  ├──► CatalogMsg ──► Storefront::drain_messages() ──► cache / callbacks
//! mutation task ───┘
//! ```

mod dirty;

pub use dirty::Dirty;
use tokio::sync::mpsc;

use crate::error::FeedError;
use crate::feed::Snapshot;
use crate::mutation::{MutationId, MutationOutcome};
use crate::session::Storefront;

/// Sender held by background tasks.
pub type MsgSender = mpsc::UnboundedSender<CatalogMsg>;

/// Receiver drained by the interactive context.
pub type MsgReceiver = mpsc::UnboundedReceiver<CatalogMsg>;

pub fn channel() -> (MsgSender, MsgReceiver) {
	mpsc::unbounded_channel()
}

/// Deliveries from a feed subscription, tagged with its generation so that
/// events from a superseded subscription can be discarded.
#[derive(Debug)]
pub enum FeedMsg {
	Snapshot { generation: u64, snapshot: Snapshot },
	Error { generation: u64, error: FeedError },
	/// The producer ended the subscription on its own.
	Closed { generation: u64 },
}

/// Top-level message applied on the interactive context.
#[derive(Debug)]
pub enum CatalogMsg {
	Feed(FeedMsg),
	/// A background mutation finished.
	MutationDone { id: MutationId, outcome: MutationOutcome },
}

impl CatalogMsg {
	/// Applies this message to the session, returning what changed.
	pub fn apply(self, session: &mut Storefront) -> Dirty {
		match self {
			Self::Feed(msg) => session.apply_feed_msg(msg),
			Self::MutationDone { id, outcome } => session.complete_mutation(id, outcome),
		}
	}
}

impl From<FeedMsg> for CatalogMsg {
	fn from(msg: FeedMsg) -> Self {
		Self::Feed(msg)
	}
}
