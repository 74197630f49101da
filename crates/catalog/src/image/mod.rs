//! Image hosting boundary and upload artifacts.
//!
//! Before an image can be uploaded it is materialized into an
//! [`UploadArtifact`]: a scratch file owned by exactly one upload. The file is
//! removed when the artifact is released or dropped, whatever the outcome of
//! the upload.

mod imgur;
mod memory;

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
pub use imgur::ImgurClient;
pub use memory::{MemoryImageHost, RecordedUpload, UploadBehavior};
use tempfile::NamedTempFile;

use crate::error::ImageHostError;

/// Multipart field carrying the image.
pub const UPLOAD_FIELD: &str = "image";
/// Content type declared for every upload.
pub const UPLOAD_CONTENT_TYPE: &str = "image/jpeg";
/// File name declared for every upload.
pub const UPLOAD_FILE_NAME: &str = "temp_image.jpg";

/// What the host returned for a finished upload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadReceipt {
	pub id: Option<String>,
	/// Durable public link to the image, when the host provided one.
	pub link: Option<String>,
}

/// Remote image host that turns a local file into a durable link.
#[async_trait]
pub trait ImageHost: Send + Sync + 'static {
	async fn upload(&self, artifact: &UploadArtifact) -> Result<UploadReceipt, ImageHostError>;
}

/// A user-selected image, not yet on disk in the scratch directory.
pub enum ImageResource {
	/// An existing file to copy from.
	File(PathBuf),
	/// Image bytes already in memory.
	Bytes(Bytes),
	/// A stream such as a platform content resolver handle.
	Reader(Box<dyn Read + Send>),
}

impl std::fmt::Debug for ImageResource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::File(path) => f.debug_tuple("File").field(path).finish(),
			Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
			Self::Reader(_) => f.write_str("Reader(..)"),
		}
	}
}

impl From<PathBuf> for ImageResource {
	fn from(path: PathBuf) -> Self {
		Self::File(path)
	}
}

impl From<Vec<u8>> for ImageResource {
	fn from(bytes: Vec<u8>) -> Self {
		Self::Bytes(Bytes::from(bytes))
	}
}

/// Scratch file holding one image for one upload attempt.
#[derive(Debug)]
pub struct UploadArtifact {
	file: NamedTempFile,
	len: u64,
}

impl UploadArtifact {
	/// Copies `resource` into a fresh scratch file under `scratch_dir`.
	///
	/// Blocking; run it on a blocking context.
	pub fn materialize(resource: ImageResource, scratch_dir: &Path) -> io::Result<Self> {
		std::fs::create_dir_all(scratch_dir)?;
		let mut file = tempfile::Builder::new().prefix("temp_image").suffix(".jpg").tempfile_in(scratch_dir)?;

		let len = match resource {
			ImageResource::File(path) => io::copy(&mut File::open(path)?, file.as_file_mut())?,
			ImageResource::Bytes(bytes) => {
				file.as_file_mut().write_all(&bytes)?;
				bytes.len() as u64
			}
			ImageResource::Reader(mut reader) => io::copy(&mut reader, file.as_file_mut())?,
		};
		if len == 0 {
			return Err(io::Error::new(io::ErrorKind::InvalidData, "image resource is empty"));
		}
		file.as_file_mut().flush()?;
		Ok(Self { file, len })
	}

	pub fn path(&self) -> &Path {
		self.file.path()
	}

	/// Size of the materialized image in bytes.
	pub fn len(&self) -> u64 {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Deletes the scratch file now, reporting failure instead of ignoring it.
	pub fn release(self) -> io::Result<()> {
		self.file.close()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn materialize_copies_file_and_release_removes_it() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("picked.png");
		std::fs::write(&source, b"\xff\xd8jpeg").unwrap();

		let artifact = UploadArtifact::materialize(ImageResource::File(source), &dir.path().join("scratch")).unwrap();
		let path = artifact.path().to_path_buf();
		assert_eq!(artifact.len(), 6);
		assert_eq!(std::fs::read(&path).unwrap(), b"\xff\xd8jpeg");

		artifact.release().unwrap();
		assert!(!path.exists());
	}

	#[test]
	fn dropping_artifact_removes_file() {
		let dir = tempfile::tempdir().unwrap();
		let artifact = UploadArtifact::materialize(vec![1, 2, 3].into(), dir.path()).unwrap();
		let path = artifact.path().to_path_buf();
		drop(artifact);
		assert!(!path.exists());
	}

	#[test]
	fn concurrent_artifacts_do_not_share_files() {
		let dir = tempfile::tempdir().unwrap();
		let a = UploadArtifact::materialize(vec![1].into(), dir.path()).unwrap();
		let b = UploadArtifact::materialize(vec![2].into(), dir.path()).unwrap();
		assert_ne!(a.path(), b.path());
	}

	#[test]
	fn missing_or_empty_sources_fail() {
		let dir = tempfile::tempdir().unwrap();
		assert!(UploadArtifact::materialize(ImageResource::File(dir.path().join("nope.jpg")), dir.path()).is_err());
		assert!(UploadArtifact::materialize(Vec::new().into(), dir.path()).is_err());
		assert!(UploadArtifact::materialize(ImageResource::Reader(Box::new(io::empty())), dir.path()).is_err());
	}
}
