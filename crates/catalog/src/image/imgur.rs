//! Imgur upload client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{ImageHost, UPLOAD_CONTENT_TYPE, UPLOAD_FIELD, UPLOAD_FILE_NAME, UploadArtifact, UploadReceipt};
use crate::config::ImageHostConfig;
use crate::error::ImageHostError;

#[derive(Debug, Deserialize)]
struct ImgurResponse {
	#[serde(default)]
	data: ImgurData,
	#[serde(default)]
	success: bool,
	#[serde(default)]
	status: u16,
}

#[derive(Debug, Default, Deserialize)]
struct ImgurData {
	#[serde(default)]
	id: Option<String>,
	#[serde(default)]
	link: Option<String>,
}

/// Uploads images to Imgur's anonymous upload endpoint.
#[derive(Clone)]
pub struct ImgurClient {
	client: reqwest::Client,
	upload_url: String,
	client_id: String,
}

impl std::fmt::Debug for ImgurClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ImgurClient")
			.field("upload_url", &self.upload_url)
			.field("client_id", &"<redacted>")
			.finish()
	}
}

impl ImgurClient {
	pub fn new(config: &ImageHostConfig) -> Result<Self, ImageHostError> {
		let client_id = config
			.client_id
			.clone()
			.filter(|id| !id.is_empty())
			.ok_or_else(|| ImageHostError::Config("image_host.client_id is not configured".into()))?;
		let client = reqwest::Client::builder()
			.connect_timeout(Duration::from_secs(config.connect_timeout_secs))
			.timeout(Duration::from_secs(config.timeout_secs))
			.build()
			.map_err(|e| ImageHostError::Transport(format!("failed to build http client: {e}")))?;
		Ok(Self {
			client,
			upload_url: format!("{}/3/image", config.base_url.trim_end_matches('/')),
			client_id,
		})
	}
}

#[async_trait]
impl ImageHost for ImgurClient {
	async fn upload(&self, artifact: &UploadArtifact) -> Result<UploadReceipt, ImageHostError> {
		let bytes = tokio::fs::read(artifact.path())
			.await
			.map_err(|e| ImageHostError::Transport(format!("failed to read upload artifact: {e}")))?;
		let part = Part::bytes(bytes)
			.file_name(UPLOAD_FILE_NAME)
			.mime_str(UPLOAD_CONTENT_TYPE)
			.map_err(|e| ImageHostError::Transport(e.to_string()))?;
		let form = Form::new().part(UPLOAD_FIELD, part);

		tracing::debug!(bytes = artifact.len(), "image.imgur.upload");
		let response = self
			.client
			.post(&self.upload_url)
			.header(AUTHORIZATION, format!("Client-ID {}", self.client_id))
			.multipart(form)
			.send()
			.await
			.map_err(|e| ImageHostError::Transport(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(ImageHostError::Status {
				status: status.as_u16(),
				body,
			});
		}

		let body = response.text().await.map_err(|e| ImageHostError::Transport(e.to_string()))?;
		parse_response(&body)
	}
}

fn parse_response(body: &str) -> Result<UploadReceipt, ImageHostError> {
	let parsed: ImgurResponse = serde_json::from_str(body).map_err(|e| ImageHostError::Decode(e.to_string()))?;
	if !parsed.success {
		return Err(ImageHostError::Rejected { status: parsed.status });
	}
	Ok(UploadReceipt {
		id: parsed.data.id,
		link: parsed.data.link,
	})
}
