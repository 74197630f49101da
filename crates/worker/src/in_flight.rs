use std::collections::HashMap;
use std::future::Future;

use tokio::task::{Id, JoinSet};

use crate::TaskClass;
use crate::error::{WorkerError, join_error_panic_message};

/// A background task that ended without running to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
	/// Caller-supplied key passed to [`InFlight::spawn`].
	pub key: u64,
	pub error: WorkerError,
}

/// Tracks fire-and-forget background tasks so their failures are observed
/// instead of silently dropped with the join handle.
#[derive(Debug)]
pub struct InFlight {
	class: TaskClass,
	inner: JoinSet<()>,
	keys: HashMap<Id, u64>,
}

impl InFlight {
	/// Creates an empty tracker whose tasks run on `class`.
	pub fn new(class: TaskClass) -> Self {
		Self {
			class,
			inner: JoinSet::new(),
			keys: HashMap::new(),
		}
	}

	/// Number of tasks not yet reaped.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Spawns `fut` on the ambient (or fallback) runtime under `key`.
	pub fn spawn<F>(&mut self, key: u64, fut: F) -> Result<(), WorkerError>
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let handle = match tokio::runtime::Handle::try_current() {
			Ok(handle) => handle,
			Err(_) => return Err(WorkerError::RuntimeUnavailable("in-flight tasks need an ambient runtime".into())),
		};
		tracing::trace!(worker_class = self.class.as_str(), key, pending = self.inner.len(), "worker.in_flight.spawn");
		let abort = self.inner.spawn_on(fut, &handle);
		self.keys.insert(abort.id(), key);
		Ok(())
	}

	/// Reaps already finished tasks without waiting.
	pub fn reap(&mut self) -> Vec<TaskFailure> {
		let mut failures = Vec::new();
		while let Some(result) = self.inner.try_join_next_with_id() {
			if let Some(failure) = self.record(result) {
				failures.push(failure);
			}
		}
		failures
	}

	/// Waits for every tracked task to finish.
	pub async fn settle(&mut self) -> Vec<TaskFailure> {
		let mut failures = Vec::new();
		while let Some(result) = self.inner.join_next_with_id().await {
			if let Some(failure) = self.record(result) {
				failures.push(failure);
			}
		}
		failures
	}

	/// Waits until a tracked task fails, reaping finished ones along the way.
	///
	/// Stays pending while nothing is tracked, so it can sit in a `select!`
	/// next to other wakeups. Cancel-safe.
	pub async fn next_failure(&mut self) -> TaskFailure {
		loop {
			match self.inner.join_next_with_id().await {
				Some(result) => {
					if let Some(failure) = self.record(result) {
						return failure;
					}
				}
				None => std::future::pending::<()>().await,
			}
		}
	}

	fn record(&mut self, result: Result<(Id, ()), tokio::task::JoinError>) -> Option<TaskFailure> {
		match result {
			Ok((id, ())) => {
				self.keys.remove(&id);
				None
			}
			Err(err) => {
				let key = self.keys.remove(&err.id()).unwrap_or_default();
				let error = match join_error_panic_message(err) {
					Some(message) => WorkerError::Panicked(message),
					None => WorkerError::Cancelled,
				};
				tracing::error!(worker_class = self.class.as_str(), key, %error, "worker.in_flight.failed");
				Some(TaskFailure { key, error })
			}
		}
	}
}

impl Drop for InFlight {
	fn drop(&mut self) {
		if !self.inner.is_empty() {
			tracing::debug!(worker_class = self.class.as_str(), pending = self.inner.len(), "worker.in_flight.detach");
			self.inner.detach_all();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn settle_waits_for_all_tasks() {
		let mut tracker = InFlight::new(TaskClass::Background);
		let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
		for key in 0..3u64 {
			let tx = tx.clone();
			tracker
				.spawn(key, async move {
					tokio::task::yield_now().await;
					let _ = tx.send(key);
				})
				.unwrap();
		}
		assert_eq!(tracker.len(), 3);
		assert!(tracker.settle().await.is_empty());
		assert!(tracker.is_empty());

		let mut seen = Vec::new();
		while let Ok(key) = rx.try_recv() {
			seen.push(key);
		}
		seen.sort_unstable();
		assert_eq!(seen, vec![0, 1, 2]);
	}

	#[tokio::test]
	async fn panics_are_reported_with_their_key() {
		let mut tracker = InFlight::new(TaskClass::Background);
		tracker.spawn(9, async { panic!("upload exploded") }).unwrap();
		tracker.spawn(10, async {}).unwrap();

		let failures = tracker.settle().await;
		assert_eq!(failures.len(), 1);
		assert_eq!(failures[0].key, 9);
		assert!(matches!(&failures[0].error, WorkerError::Panicked(m) if m.contains("upload exploded")));
	}

	#[test]
	fn spawn_without_runtime_is_an_error() {
		let mut tracker = InFlight::new(TaskClass::Background);
		let err = tracker.spawn(1, async {}).unwrap_err();
		assert!(matches!(err, WorkerError::RuntimeUnavailable(_)));
	}

	#[tokio::test]
	async fn next_failure_skips_clean_exits() {
		let mut tracker = InFlight::new(TaskClass::Background);
		tracker.spawn(1, async {}).unwrap();
		tracker
			.spawn(2, async {
				tokio::task::yield_now().await;
				panic!("late failure");
			})
			.unwrap();

		let failure = tracker.next_failure().await;
		assert_eq!(failure.key, 2);
		assert!(tracker.is_empty());
	}

	#[tokio::test]
	async fn next_failure_waits_while_idle() {
		let mut tracker = InFlight::new(TaskClass::Background);
		let idle = tokio::time::timeout(std::time::Duration::from_millis(20), tracker.next_failure()).await;
		assert!(idle.is_err());

		tracker.spawn(3, async { panic!("now") }).unwrap();
		let failure = tracker.next_failure().await;
		assert_eq!(failure.error, WorkerError::Panicked("now".into()));
	}
}
