//! Async cores of the catalog mutations.
//!
//! These functions only sequence I/O and classify failures. They do not know
//! about the interactive context; [`crate::Storefront`] runs them on a
//! background task and applies their outcome afterwards.

use std::path::PathBuf;
use std::sync::Arc;

use storefront_worker::{TaskClass, run_blocking};

use crate::error::PipelineError;
use crate::image::{ImageHost, ImageResource, UploadArtifact};
use crate::product::{FieldError, FieldUpdate, ProductDraft, ProductId};
use crate::store::DocumentStore;

/// Create/update/delete against the document store and image host.
#[derive(Clone)]
pub struct MutationPipeline {
	store: Arc<dyn DocumentStore>,
	image_host: Arc<dyn ImageHost>,
	collection: String,
	scratch_dir: PathBuf,
}

impl std::fmt::Debug for MutationPipeline {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MutationPipeline")
			.field("collection", &self.collection)
			.field("scratch_dir", &self.scratch_dir)
			.finish_non_exhaustive()
	}
}

impl MutationPipeline {
	pub fn new(store: Arc<dyn DocumentStore>, image_host: Arc<dyn ImageHost>, collection: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
		Self {
			store,
			image_host,
			collection: collection.into(),
			scratch_dir: scratch_dir.into(),
		}
	}

	pub fn collection(&self) -> &str {
		&self.collection
	}

	/// Materializes and uploads `image`, then creates the product document
	/// linking it.
	///
	/// The document is only written once a link is in hand, so a failed
	/// upload never reaches the store. A store failure after a successful
	/// upload leaves the image on the host; its link is reported in
	/// [`PipelineError::PersistenceFailed`].
	pub async fn create(&self, draft: ProductDraft, image: ImageResource) -> Result<ProductId, PipelineError> {
		draft.validate()?;

		let scratch_dir = self.scratch_dir.clone();
		let artifact = run_blocking(TaskClass::IoBlocking, move || UploadArtifact::materialize(image, &scratch_dir))
			.await
			.map_err(|e| PipelineError::ImageProcessingFailed(std::io::Error::other(e)))?
			.map_err(PipelineError::ImageProcessingFailed)?;
		tracing::debug!(bytes = artifact.len(), "pipeline.create.materialized");

		let uploaded = self.image_host.upload(&artifact).await;
		release(artifact).await;

		let receipt = uploaded?;
		let link = receipt.link.filter(|link| !link.is_empty()).ok_or(PipelineError::UploadResponseMalformed)?;
		tracing::debug!(%link, "pipeline.create.uploaded");

		let document = draft.into_document(&link);
		match self.store.create(&self.collection, document).await {
			Ok(id) => {
				tracing::info!(collection = %self.collection, %id, "pipeline.create.persisted");
				Ok(id)
			}
			Err(err) => {
				tracing::warn!(collection = %self.collection, error = %err, orphaned_link = %link, "pipeline.create.persist_failed");
				Err(PipelineError::PersistenceFailed {
					detail: err.to_string(),
					orphaned_link: Some(link),
				})
			}
		}
	}

	/// Writes only the fields in `fields`; the rest of the document is kept.
	pub async fn update(&self, id: &str, fields: FieldUpdate) -> Result<(), PipelineError> {
		if fields.is_empty() {
			return Err(FieldError::Empty.into());
		}
		self.store.update(&self.collection, id, fields.to_document()).await.map_err(|err| {
			tracing::warn!(collection = %self.collection, %id, error = %err, "pipeline.update.failed");
			PipelineError::persistence(err)
		})?;
		tracing::info!(collection = %self.collection, %id, fields = fields.len(), "pipeline.update.persisted");
		Ok(())
	}

	pub async fn delete(&self, id: &str) -> Result<(), PipelineError> {
		self.store.delete(&self.collection, id).await.map_err(PipelineError::persistence)
	}
}

/// Removes the scratch file off the async executor; failure is only logged.
async fn release(artifact: UploadArtifact) {
	let path = artifact.path().to_path_buf();
	match run_blocking(TaskClass::IoBlocking, move || artifact.release()).await {
		Ok(Ok(())) => tracing::trace!(path = %path.display(), "pipeline.artifact.released"),
		Ok(Err(err)) => tracing::warn!(path = %path.display(), error = %err, "pipeline.artifact.release_failed"),
		Err(err) => tracing::warn!(path = %path.display(), error = %err, "pipeline.artifact.release_failed"),
	}
}

#[cfg(test)]
mod tests;
