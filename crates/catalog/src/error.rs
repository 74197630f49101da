//! Error taxonomy for the catalog pipeline.
//!
//! Adapter errors ([`StoreError`], [`ImageHostError`], [`FeedError`]) are
//! passed through untouched by their adapters. The pipeline folds them into
//! [`PipelineError`], whose `Display` text is what the user ends up seeing.

use thiserror::Error;

use crate::product::FieldError;

/// A subscription-level problem reported by the realtime feed.
///
/// Non-fatal: the subscription keeps delivering after an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FeedError {
	pub message: String,
}

impl FeedError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

/// Failures from the authoritative document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
	/// The adapter was built from incomplete settings.
	#[error("configuration error: {0}")]
	Config(String),
	/// The request never produced a response.
	#[error("transport error: {0}")]
	Transport(String),
	/// The store answered with a non-success status.
	#[error("status {status}: {body}")]
	Status { status: u16, body: String },
	/// The referenced document does not exist.
	#[error("document `{0}` not found")]
	NotFound(String),
	/// The response could not be understood.
	#[error("invalid response: {0}")]
	Decode(String),
}

/// Failures from the remote image host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageHostError {
	#[error("configuration error: {0}")]
	Config(String),
	#[error("transport error: {0}")]
	Transport(String),
	#[error("status {status}: {body}")]
	Status { status: u16, body: String },
	/// The host answered 2xx but flagged the upload as unsuccessful.
	#[error("upload rejected by host (status {status})")]
	Rejected { status: u16 },
	#[error("invalid response: {0}")]
	Decode(String),
}

/// Errors surfaced by pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
	/// The selected image could not be turned into a local file.
	#[error("Failed to process image: {0}")]
	ImageProcessingFailed(#[source] std::io::Error),
	#[error("Image upload failed: {detail}")]
	UploadFailed { detail: String },
	#[error("Image host response missing image URL")]
	UploadResponseMalformed,
	/// The store rejected the write. For creates, `orphaned_link` names the
	/// image that was already uploaded and is now unreferenced.
	#[error("Persistence failed: {detail}")]
	PersistenceFailed { detail: String, orphaned_link: Option<String> },
	#[error("Invalid update: {0}")]
	InvalidInput(#[from] FieldError),
	#[error("Payment failed: {0}")]
	PaymentFailed(String),
	/// The background task running the operation died.
	#[error("Operation aborted: {0}")]
	Aborted(String),
}

impl PipelineError {
	pub(crate) fn persistence(err: StoreError) -> Self {
		Self::PersistenceFailed {
			detail: err.to_string(),
			orphaned_link: None,
		}
	}

	/// Link of an uploaded image left behind by a failed create, if any.
	pub fn orphaned_link(&self) -> Option<&str> {
		match self {
			Self::PersistenceFailed { orphaned_link, .. } => orphaned_link.as_deref(),
			_ => None,
		}
	}
}

impl From<ImageHostError> for PipelineError {
	fn from(err: ImageHostError) -> Self {
		match err {
			ImageHostError::Decode(_) => Self::UploadResponseMalformed,
			other => Self::UploadFailed { detail: other.to_string() },
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn undecodable_upload_response_is_malformed() {
		let err: PipelineError = ImageHostError::Decode("eof".into()).into();
		assert!(matches!(err, PipelineError::UploadResponseMalformed));
	}

	#[test]
	fn host_status_becomes_upload_failed() {
		let err: PipelineError = ImageHostError::Status {
			status: 429,
			body: "slow down".into(),
		}
		.into();
		assert_eq!(err.to_string(), "Image upload failed: status 429: slow down");
	}

	#[test]
	fn orphaned_link_only_on_persistence_failures() {
		let err = PipelineError::PersistenceFailed {
			detail: "denied".into(),
			orphaned_link: Some("https://i.example/a.jpg".into()),
		};
		assert_eq!(err.orphaned_link(), Some("https://i.example/a.jpg"));
		assert_eq!(PipelineError::UploadResponseMalformed.orphaned_link(), None);
	}
}
