use std::future::Future;
use std::sync::OnceLock;

use tokio::task::JoinHandle;

use crate::TaskClass;
use crate::error::{WorkerError, join_error_panic_message};

/// Returns the ambient tokio handle, falling back to a small shared runtime
/// when called from outside any runtime (e.g. a synchronous UI thread).
fn runtime_handle() -> Result<tokio::runtime::Handle, WorkerError> {
	if let Ok(handle) = tokio::runtime::Handle::try_current() {
		return Ok(handle);
	}

	static FALLBACK_RT: OnceLock<Result<tokio::runtime::Runtime, String>> = OnceLock::new();
	let runtime = FALLBACK_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("storefront-worker")
			.build()
			.map_err(|e| e.to_string())
	});
	match runtime {
		Ok(rt) => Ok(rt.handle().clone()),
		Err(reason) => Err(WorkerError::RuntimeUnavailable(reason.clone())),
	}
}

/// Spawns an async task on the given execution class.
pub fn spawn<F>(class: TaskClass, fut: F) -> Result<JoinHandle<F::Output>, WorkerError>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	Ok(runtime_handle()?.spawn(fut))
}

/// Spawns blocking work on the blocking pool.
pub fn spawn_blocking<F, R>(class: TaskClass, f: F) -> Result<JoinHandle<R>, WorkerError>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn_blocking");
	Ok(runtime_handle()?.spawn_blocking(f))
}

/// Runs blocking work off the calling task and waits for its result.
///
/// A panic inside `f` is reported as [`WorkerError::Panicked`] instead of
/// unwinding into the caller.
pub async fn run_blocking<F, R>(class: TaskClass, f: F) -> Result<R, WorkerError>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	let handle = spawn_blocking(class, f)?;
	handle.await.map_err(|err| match join_error_panic_message(err) {
		Some(message) => WorkerError::Panicked(message),
		None => WorkerError::Cancelled,
	})
}
