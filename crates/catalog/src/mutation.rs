//! Per-mutation bookkeeping on the interactive side.

use std::fmt;

use crate::error::PipelineError;
use crate::payment::PaymentReceipt;
use crate::product::ProductId;

/// Handle returned when a mutation is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MutationId(pub u64);

impl fmt::Display for MutationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "m{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
	Create,
	Update,
	Delete,
	Payment,
}

/// `Idle → InFlight → {Succeeded, Failed}`. Both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MutationPhase {
	#[default]
	Idle,
	InFlight,
	Succeeded,
	Failed,
}

impl MutationPhase {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Succeeded | Self::Failed)
	}
}

/// What a finished mutation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationSuccess {
	Created(ProductId),
	Updated,
	Deleted,
	Paid(PaymentReceipt),
}

pub type MutationOutcome = Result<MutationSuccess, PipelineError>;

/// Interactive-side view of one mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
	pub kind: MutationKind,
	pub phase: MutationPhase,
	/// Target product; for creates, filled in once the store assigns an id.
	pub product_id: Option<ProductId>,
	/// User-facing error text when the mutation failed.
	pub error: Option<String>,
}

impl MutationRecord {
	pub(crate) fn new(kind: MutationKind, product_id: Option<ProductId>) -> Self {
		Self {
			kind,
			phase: MutationPhase::Idle,
			product_id,
			error: None,
		}
	}

	pub(crate) fn start(&mut self) {
		debug_assert_eq!(self.phase, MutationPhase::Idle);
		self.phase = MutationPhase::InFlight;
	}

	/// Moves to a terminal phase. Returns `false` if already terminal.
	pub(crate) fn finish(&mut self, outcome: &MutationOutcome) -> bool {
		if self.phase.is_terminal() {
			return false;
		}
		match outcome {
			Ok(success) => {
				if let MutationSuccess::Created(id) = success {
					self.product_id = Some(id.clone());
				}
				self.phase = MutationPhase::Succeeded;
			}
			Err(err) => {
				self.error = Some(err.to_string());
				self.phase = MutationPhase::Failed;
			}
		}
		true
	}
}

type SuccessFn = Box<dyn FnOnce(&MutationSuccess)>;
type ErrorFn = Box<dyn FnOnce(&PipelineError)>;

/// Caller callbacks, always invoked on the interactive context.
///
/// They never leave the interactive side, so they need not be `Send`.
#[derive(Default)]
pub struct Callbacks {
	on_success: Option<SuccessFn>,
	on_error: Option<ErrorFn>,
}

impl fmt::Debug for Callbacks {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Callbacks")
			.field("on_success", &self.on_success.is_some())
			.field("on_error", &self.on_error.is_some())
			.finish()
	}
}

impl Callbacks {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn on_success(mut self, f: impl FnOnce(&MutationSuccess) + 'static) -> Self {
		self.on_success = Some(Box::new(f));
		self
	}

	pub fn on_error(mut self, f: impl FnOnce(&PipelineError) + 'static) -> Self {
		self.on_error = Some(Box::new(f));
		self
	}

	pub(crate) fn resolve(self, outcome: &MutationOutcome) {
		match outcome {
			Ok(success) => {
				if let Some(f) = self.on_success {
					f(success);
				}
			}
			Err(err) => {
				if let Some(f) = self.on_error {
					f(err);
				}
			}
		}
	}
}
