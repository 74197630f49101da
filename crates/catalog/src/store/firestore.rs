//! Cloud Firestore REST adapter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;

use super::{Document, DocumentStore, Result};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::product::ProductId;

/// Document store backed by the Firestore REST API.
#[derive(Debug, Clone)]
pub struct FirestoreStore {
	client: reqwest::Client,
	documents_url: String,
	api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedDocument {
	name: String,
}

impl FirestoreStore {
	pub fn new(config: &StoreConfig) -> Result<Self> {
		if config.project_id.is_empty() {
			return Err(StoreError::Config("store.project_id is not configured".into()));
		}
		let client = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.build()
			.map_err(|e| StoreError::Transport(format!("failed to build http client: {e}")))?;
		let documents_url = format!(
			"{}/projects/{}/databases/{}/documents",
			config.base_url.trim_end_matches('/'),
			config.project_id,
			config.database
		);
		Ok(Self {
			client,
			documents_url,
			api_key: config.api_key.clone(),
		})
	}

	fn url(&self, segments: &[&str]) -> Result<Url> {
		let mut url = Url::parse(&self.documents_url).map_err(|e| StoreError::Transport(format!("invalid store url: {e}")))?;
		url.path_segments_mut()
			.map_err(|()| StoreError::Transport("store url cannot be a base".into()))?
			.extend(segments);
		if let Some(key) = &self.api_key {
			url.query_pairs_mut().append_pair("key", key);
		}
		Ok(url)
	}

	async fn send(&self, request: reqwest::RequestBuilder, id: Option<&str>) -> Result<reqwest::Response> {
		let response = request.send().await.map_err(|e| StoreError::Transport(e.to_string()))?;
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}
		if status == reqwest::StatusCode::NOT_FOUND {
			if let Some(id) = id {
				return Err(StoreError::NotFound(id.to_string()));
			}
		}
		let body = response.text().await.unwrap_or_default();
		Err(StoreError::Status {
			status: status.as_u16(),
			body,
		})
	}
}

#[async_trait]
impl DocumentStore for FirestoreStore {
	async fn create(&self, collection: &str, document: Document) -> Result<ProductId> {
		let url = self.url(&[collection])?;
		let body = json!({ "fields": encode_fields(&document) });
		let response = self.send(self.client.post(url).json(&body), None).await?;
		let created: CreatedDocument = response.json().await.map_err(|e| StoreError::Decode(e.to_string()))?;
		let id = document_id(&created.name).ok_or_else(|| StoreError::Decode(format!("unexpected document name `{}`", created.name)))?;
		tracing::debug!(collection, id, "store.firestore.created");
		Ok(id)
	}

	async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<()> {
		let mut url = self.url(&[collection, id])?;
		{
			let mut query = url.query_pairs_mut();
			for field in fields.keys() {
				query.append_pair("updateMask.fieldPaths", &field_path(field));
			}
			query.append_pair("currentDocument.exists", "true");
		}
		let body = json!({ "fields": encode_fields(&fields) });
		self.send(self.client.patch(url).json(&body), Some(id)).await?;
		tracing::debug!(collection, id, fields = fields.len(), "store.firestore.updated");
		Ok(())
	}

	async fn delete(&self, collection: &str, id: &str) -> Result<()> {
		let url = self.url(&[collection, id])?;
		self.send(self.client.delete(url), Some(id)).await?;
		tracing::debug!(collection, id, "store.firestore.deleted");
		Ok(())
	}
}

/// Last path segment of a fully qualified document name.
fn document_id(name: &str) -> Option<String> {
	name.rsplit('/').next().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Field path usable in an update mask; non-identifier names are backquoted.
fn field_path(field: &str) -> String {
	let mut chars = field.chars();
	let simple = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
	if simple {
		field.to_string()
	} else {
		format!("`{}`", field.replace('\\', "\\\\").replace('`', "\\`"))
	}
}

fn encode_fields(document: &Document) -> Value {
	Value::Object(document.iter().map(|(k, v)| (k.clone(), encode_value(v))).collect())
}

/// Converts plain JSON into Firestore's typed value representation.
fn encode_value(value: &Value) -> Value {
	match value {
		Value::Null => json!({ "nullValue": null }),
		Value::Bool(b) => json!({ "booleanValue": b }),
		Value::Number(n) => match n.as_i64() {
			Some(i) => json!({ "integerValue": i.to_string() }),
			None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
		},
		Value::String(s) => json!({ "stringValue": s }),
		Value::Array(items) => json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } }),
		Value::Object(map) => {
			let fields: Map<String, Value> = map.iter().map(|(k, v)| (k.clone(), encode_value(v))).collect();
			json!({ "mapValue": { "fields": fields } })
		}
	}
}
