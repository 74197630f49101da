//! Catalog entries and their wire shapes.
//!
//! A [`Product`] always carries the id the document store assigned to it; a
//! [`ProductDraft`] is what the presentation layer builds before the first
//! save. Feed records arrive as [`RawRecord`]s and are decoded leniently:
//! missing attributes take defaults, wrongly typed ones make the whole record
//! malformed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Identifier assigned by the document store.
pub type ProductId = String;

/// Field names as they appear in stored documents and feed records.
pub mod fields {
	pub const NAME: &str = "name";
	pub const DESCRIPTION: &str = "description";
	pub const PRICE: &str = "price";
	pub const IMAGE_URL: &str = "imageUrl";
	pub const ID: &str = "id";

	/// Fields a [`super::FieldUpdate`] may touch.
	pub const WRITABLE: [&str; 4] = [NAME, DESCRIPTION, PRICE, IMAGE_URL];
}

/// A persisted catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
	pub id: ProductId,
	pub name: String,
	pub description: String,
	pub price: f64,
	pub image_url: String,
}

/// A product that has not been saved yet and therefore has no id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductDraft {
	pub name: String,
	pub description: String,
	pub price: f64,
}

impl ProductDraft {
	pub fn new(name: impl Into<String>, description: impl Into<String>, price: f64) -> Self {
		Self {
			name: name.into(),
			description: description.into(),
			price,
		}
	}

	/// Checks the draft before any I/O is spent on it.
	pub fn validate(&self) -> Result<(), FieldError> {
		validate_price(self.price)
	}

	/// Document payload for a create call, linking the uploaded image.
	pub fn into_document(self, image_url: &str) -> Map<String, Value> {
		let mut doc = Map::new();
		doc.insert(fields::NAME.into(), Value::String(self.name));
		doc.insert(fields::DESCRIPTION.into(), Value::String(self.description));
		doc.insert(fields::PRICE.into(), Value::from(self.price));
		doc.insert(fields::IMAGE_URL.into(), Value::String(image_url.to_string()));
		doc
	}
}

/// Rejected field values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
	#[error("price must be a finite, non-negative number (got {0})")]
	InvalidPrice(f64),
	#[error("field `{field}` must be a {expected}")]
	WrongType { field: &'static str, expected: &'static str },
	#[error("unknown field `{0}`")]
	Unknown(String),
	#[error("update contains no fields")]
	Empty,
}

fn validate_price(price: f64) -> Result<(), FieldError> {
	if price.is_finite() && price >= 0.0 {
		Ok(())
	} else {
		Err(FieldError::InvalidPrice(price))
	}
}

/// A partial update: only the fields present are written, the rest of the
/// stored document is left untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldUpdate {
	fields: IndexMap<&'static str, Value>,
}

impl FieldUpdate {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.fields.insert(fields::NAME, Value::String(name.into()));
		self
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.fields.insert(fields::DESCRIPTION, Value::String(description.into()));
		self
	}

	pub fn price(mut self, price: f64) -> Result<Self, FieldError> {
		validate_price(price)?;
		self.fields.insert(fields::PRICE, Value::from(price));
		Ok(self)
	}

	pub fn image_url(mut self, url: impl Into<String>) -> Self {
		self.fields.insert(fields::IMAGE_URL, Value::String(url.into()));
		self
	}

	/// Builds an update from loosely typed input such as a form submission.
	pub fn from_map(map: Map<String, Value>) -> Result<Self, FieldError> {
		let mut update = Self::new();
		for (key, value) in map {
			let field = fields::WRITABLE
				.iter()
				.copied()
				.find(|f| *f == key)
				.ok_or_else(|| FieldError::Unknown(key.clone()))?;
			if field == fields::PRICE {
				let price = value.as_f64().ok_or(FieldError::WrongType {
					field: fields::PRICE,
					expected: "number",
				})?;
				update = update.price(price)?;
			} else {
				let Value::String(_) = value else {
					return Err(FieldError::WrongType { field, expected: "string" });
				};
				update.fields.insert(field, value);
			}
		}
		Ok(update)
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	/// Names of the fields this update writes, in insertion order.
	pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
		self.fields.keys().copied()
	}

	/// The update as a document fragment.
	pub fn to_document(&self) -> Map<String, Value> {
		self.fields.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
	}
}

/// Wholesale update writing every writable field of `product`.
impl From<&Product> for FieldUpdate {
	fn from(product: &Product) -> Self {
		let mut map = IndexMap::with_capacity(fields::WRITABLE.len());
		map.insert(fields::NAME, Value::String(product.name.clone()));
		map.insert(fields::DESCRIPTION, Value::String(product.description.clone()));
		map.insert(fields::PRICE, Value::from(product.price));
		map.insert(fields::IMAGE_URL, Value::String(product.image_url.clone()));
		Self { fields: map }
	}
}

/// One child of a feed snapshot, not yet decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
	/// Key of the child node in the feed.
	pub key: String,
	pub value: Value,
}

impl RawRecord {
	pub fn new(key: impl Into<String>, value: Value) -> Self {
		Self { key: key.into(), value }
	}

	/// Decodes this record into a persisted product.
	pub fn decode(&self) -> Result<Product, DecodeError> {
		let Value::Object(obj) = &self.value else {
			return Err(DecodeError::NotAnObject);
		};

		let text = |field: &'static str| -> Result<String, DecodeError> {
			match obj.get(field) {
				None | Some(Value::Null) => Ok(String::new()),
				Some(Value::String(s)) => Ok(s.clone()),
				Some(_) => Err(DecodeError::WrongType(field)),
			}
		};

		let price = match obj.get(fields::PRICE) {
			None | Some(Value::Null) => 0.0,
			Some(v) => v.as_f64().ok_or(DecodeError::WrongType(fields::PRICE))?,
		};
		validate_price(price).map_err(|_| DecodeError::InvalidPrice(price))?;

		let own_id = text(fields::ID)?;
		let id = if own_id.is_empty() { self.key.clone() } else { own_id };
		if id.is_empty() {
			return Err(DecodeError::MissingId);
		}

		Ok(Product {
			id,
			name: text(fields::NAME)?,
			description: text(fields::DESCRIPTION)?,
			price,
			image_url: text(fields::IMAGE_URL)?,
		})
	}
}

/// Why a feed record was dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
	#[error("record is not an object")]
	NotAnObject,
	#[error("field `{0}` has the wrong type")]
	WrongType(&'static str),
	#[error("price {0} is negative or not finite")]
	InvalidPrice(f64),
	#[error("record has no id")]
	MissingId,
}
