use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use super::*;
use crate::error::{ImageHostError, StoreError};
use crate::image::{MemoryImageHost, UploadBehavior};
use crate::store::{MemoryStore, StoreCall, StoreOp};

struct Fixture {
	store: MemoryStore,
	host: MemoryImageHost,
	pipeline: MutationPipeline,
	_scratch: tempfile::TempDir,
}

fn fixture() -> Fixture {
	let scratch = tempfile::tempdir().unwrap();
	let store = MemoryStore::new();
	let host = MemoryImageHost::new();
	let pipeline = MutationPipeline::new(Arc::new(store.clone()), Arc::new(host.clone()), "products", scratch.path());
	Fixture {
		store,
		host,
		pipeline,
		_scratch: scratch,
	}
}

fn jpeg() -> ImageResource {
	vec![0xff, 0xd8, 0xff, 0xe0].into()
}

fn creates(store: &MemoryStore) -> usize {
	store.calls().iter().filter(|c| matches!(c, StoreCall::Create { .. })).count()
}

#[tokio::test]
async fn create_uploads_then_persists_with_link() {
	let fx = fixture();
	let id = fx.pipeline.create(ProductDraft::new("Lamp", "Brass", 40.0), jpeg()).await.unwrap();

	let uploads = fx.host.uploads();
	assert_eq!(uploads.len(), 1);
	assert_eq!(uploads[0].bytes, vec![0xff, 0xd8, 0xff, 0xe0]);
	assert!(!uploads[0].path.exists(), "scratch artifact must be released after upload");

	let stored = fx.store.get("products", &id).unwrap();
	assert_eq!(
		Value::Object(stored),
		json!({ "name": "Lamp", "description": "Brass", "price": 40.0, "imageUrl": uploads[0].link.clone().unwrap() })
	);
}

#[tokio::test]
async fn failed_upload_never_reaches_the_store() {
	let fx = fixture();
	fx.host.set_behavior(UploadBehavior::Fail(ImageHostError::Status {
		status: 500,
		body: "host down".into(),
	}));

	let err = fx.pipeline.create(ProductDraft::new("Lamp", "", 1.0), jpeg()).await.unwrap_err();
	assert!(matches!(err, PipelineError::UploadFailed { .. }), "got {err:?}");
	assert_eq!(creates(&fx.store), 0);
	assert!(!fx.host.uploads()[0].path.exists(), "artifact released on failure too");
}

#[tokio::test]
async fn missing_link_is_malformed_and_not_persisted() {
	let fx = fixture();
	fx.host.set_behavior(UploadBehavior::OmitLink);

	let err = fx.pipeline.create(ProductDraft::new("Lamp", "", 1.0), jpeg()).await.unwrap_err();
	assert!(matches!(err, PipelineError::UploadResponseMalformed));
	assert_eq!(creates(&fx.store), 0);
}

#[tokio::test]
async fn unreadable_image_short_circuits() {
	let fx = fixture();
	let err = fx
		.pipeline
		.create(ProductDraft::new("Lamp", "", 1.0), ImageResource::File("/definitely/not/here.jpg".into()))
		.await
		.unwrap_err();
	assert!(matches!(err, PipelineError::ImageProcessingFailed(_)));
	assert!(fx.host.uploads().is_empty());
	assert!(fx.store.calls().is_empty());
}

#[tokio::test]
async fn invalid_draft_is_rejected_before_io() {
	let fx = fixture();
	let err = fx.pipeline.create(ProductDraft::new("Lamp", "", -2.0), jpeg()).await.unwrap_err();
	assert!(matches!(err, PipelineError::InvalidInput(_)));
	assert!(fx.host.uploads().is_empty());
}

#[tokio::test]
async fn store_failure_reports_orphaned_link() {
	let fx = fixture();
	fx.store.fail_on(StoreOp::Create);

	let err = fx.pipeline.create(ProductDraft::new("Lamp", "", 1.0), jpeg()).await.unwrap_err();
	let link = fx.host.uploads()[0].link.clone();
	assert!(link.is_some());
	assert_eq!(err.orphaned_link(), link.as_deref());
	assert_eq!(fx.store.len("products"), 0);
}

#[tokio::test]
async fn update_merges_only_given_fields() {
	let fx = fixture();
	fx.store.insert(
		"products",
		"p1",
		json!({ "name": "Mug", "description": "Blue", "price": 4.0, "imageUrl": "https://i/1.jpg" })
			.as_object()
			.cloned()
			.unwrap(),
	);

	fx.pipeline.update("p1", FieldUpdate::new().price(9.99).unwrap()).await.unwrap();

	assert_eq!(
		Value::Object(fx.store.get("products", "p1").unwrap()),
		json!({ "name": "Mug", "description": "Blue", "price": 9.99, "imageUrl": "https://i/1.jpg" })
	);
}

#[tokio::test]
async fn update_failures_are_persistence_errors() {
	let fx = fixture();
	let err = fx.pipeline.update("ghost", FieldUpdate::new().name("x")).await.unwrap_err();
	match err {
		PipelineError::PersistenceFailed { detail, orphaned_link } => {
			assert_eq!(detail, StoreError::NotFound("ghost".into()).to_string());
			assert_eq!(orphaned_link, None);
		}
		other => panic!("unexpected {other:?}"),
	}

	let empty = fx.pipeline.update("ghost", FieldUpdate::new()).await.unwrap_err();
	assert!(matches!(empty, PipelineError::InvalidInput(FieldError::Empty)));
}

#[tokio::test]
async fn delete_passes_through() {
	let fx = fixture();
	fx.store.insert("products", "x", Default::default());
	fx.pipeline.delete("x").await.unwrap();
	assert_eq!(fx.store.get("products", "x"), None);

	fx.store.fail_on(StoreOp::Delete);
	assert!(fx.pipeline.delete("x").await.is_err());
}
