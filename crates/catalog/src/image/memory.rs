use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ImageHost, UploadArtifact, UploadReceipt};
use crate::error::ImageHostError;

/// How [`MemoryImageHost`] answers the next uploads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadBehavior {
	/// Succeed with a generated link.
	#[default]
	Succeed,
	/// Succeed but omit the link from the receipt.
	OmitLink,
	Fail(ImageHostError),
}

/// An upload as the host saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
	/// Scratch path of the artifact at upload time.
	pub path: PathBuf,
	pub bytes: Vec<u8>,
	/// Link handed back, if the upload succeeded.
	pub link: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
	behavior: UploadBehavior,
	uploads: Vec<RecordedUpload>,
}

/// In-process image host recording every upload.
#[derive(Debug, Clone, Default)]
pub struct MemoryImageHost {
	inner: Arc<Mutex<Inner>>,
}

impl MemoryImageHost {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_behavior(&self, behavior: UploadBehavior) {
		self.inner.lock().behavior = behavior;
	}

	pub fn uploads(&self) -> Vec<RecordedUpload> {
		self.inner.lock().uploads.clone()
	}
}

#[async_trait]
impl ImageHost for MemoryImageHost {
	async fn upload(&self, artifact: &UploadArtifact) -> Result<UploadReceipt, ImageHostError> {
		let bytes = tokio::fs::read(artifact.path())
			.await
			.map_err(|e| ImageHostError::Transport(format!("failed to read upload artifact: {e}")))?;

		let mut inner = self.inner.lock();
		let n = inner.uploads.len() + 1;
		let (result, link) = match inner.behavior.clone() {
			UploadBehavior::Succeed => {
				let link = format!("https://images.invalid/{n}.jpg");
				(
					Ok(UploadReceipt {
						id: Some(n.to_string()),
						link: Some(link.clone()),
					}),
					Some(link),
				)
			}
			UploadBehavior::OmitLink => (
				Ok(UploadReceipt {
					id: Some(n.to_string()),
					link: None,
				}),
				None,
			),
			UploadBehavior::Fail(err) => (Err(err), None),
		};
		inner.uploads.push(RecordedUpload {
			path: artifact.path().to_path_buf(),
			bytes,
			link,
		});
		result
	}
}
