use thiserror::Error;
use tokio::task::JoinError;

/// Failures raised by the worker layer itself, never by the work it runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkerError {
	/// No tokio runtime was reachable and the fallback could not be built.
	#[error("worker runtime unavailable: {0}")]
	RuntimeUnavailable(String),
	/// The task panicked; carries the panic payload when it was a string.
	#[error("worker task panicked: {0}")]
	Panicked(String),
	/// The task was aborted before completing.
	#[error("worker task cancelled")]
	Cancelled,
}

/// Extracts the panic message from a join error, or `None` if the task was
/// cancelled instead.
pub fn join_error_panic_message(err: JoinError) -> Option<String> {
	if !err.is_panic() {
		return None;
	}
	let payload = err.into_panic();
	if let Some(s) = payload.downcast_ref::<&'static str>() {
		Some((*s).to_string())
	} else if let Some(s) = payload.downcast_ref::<String>() {
		Some(s.clone())
	} else {
		Some("non-string panic payload".to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn opaque_payloads_still_count_as_panics() {
		let err = tokio::spawn(async { std::panic::panic_any(404_u16) }).await.unwrap_err();
		assert_eq!(join_error_panic_message(err).as_deref(), Some("non-string panic payload"));
	}

	#[tokio::test]
	async fn panic_message_survives_into_display() {
		let err = tokio::spawn(async { panic!("upload {} failed", 7) }).await.unwrap_err();
		let error = WorkerError::Panicked(join_error_panic_message(err).unwrap());
		assert_eq!(error.to_string(), "worker task panicked: upload 7 failed");
	}

	#[test]
	fn errors_render_their_cause() {
		assert_eq!(WorkerError::Cancelled.to_string(), "worker task cancelled");
		assert_eq!(
			WorkerError::RuntimeUnavailable("no threads".into()).to_string(),
			"worker runtime unavailable: no threads"
		);
	}
}
