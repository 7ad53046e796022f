pub mod filters;

pub use filters::{Filters, NumericRange, PropertyType};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque row identifier assigned by the backing service.
///
/// The hosted table hands out integer keys, older exports carry strings;
/// both deserialize into the same textual id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PropertyId(String);

impl PropertyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PropertyId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for PropertyId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Integer(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(id) => Self(id),
            RawId::Integer(id) => Self(id.to_string()),
        })
    }
}

/// A real-estate listing as stored in the `properties` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub id: PropertyId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Display text, e.g. "R$ 450.000" or "Sob consulta"
    #[serde(default, deserialize_with = "text_or_number")]
    pub price: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<u32>,
    /// Square meters
    #[serde(default)]
    pub area: Option<f64>,
    /// Public image URLs; the first one is the cover
    #[serde(default, deserialize_with = "image_list")]
    pub images: Vec<String>,
    #[serde(default)]
    pub featured: Option<bool>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub youtube_video: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Property {
    pub fn is_featured(&self) -> bool {
        self.featured.unwrap_or(false)
    }
}

/// Writable columns of a listing, sent on insert and update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyDraft {
    pub title: String,
    pub location: String,
    pub price: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub area: f64,
    pub images: Vec<String>,
    pub featured: bool,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_video: Option<String>,
}

impl Default for PropertyDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            location: String::new(),
            price: String::new(),
            bedrooms: 1,
            bathrooms: 1,
            area: 0.0,
            images: Vec::new(),
            featured: false,
            description: String::new(),
            property_type: None,
            youtube_video: None,
        }
    }
}

impl From<&Property> for PropertyDraft {
    fn from(property: &Property) -> Self {
        Self {
            title: property.title.clone().unwrap_or_default(),
            location: property.location.clone().unwrap_or_default(),
            price: property.price.clone().unwrap_or_default(),
            bedrooms: property.bedrooms.filter(|n| *n > 0).unwrap_or(1),
            bathrooms: property.bathrooms.filter(|n| *n > 0).unwrap_or(1),
            area: property.area.unwrap_or(0.0),
            images: property.images.clone(),
            featured: property.is_featured(),
            description: property.description.clone().unwrap_or_default(),
            property_type: property.property_type.clone(),
            youtube_video: property.youtube_video.clone(),
        }
    }
}

/// An image file waiting to be pushed to object storage
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Read an image from disk, guessing its content type from the extension.
    pub async fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(file_name, bytes))
    }

    /// File extension without the dot; "bin" when the name has none.
    pub fn extension(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext,
            _ => "bin",
        }
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

/// Normalise an `images` column: a text array, a legacy comma-separated
/// string, or null. Blank entries are dropped.
pub fn normalize_images(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|img| !img.is_empty())
            .map(str::to_string)
            .collect(),
        Value::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|img| !img.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn image_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.map(|value| normalize_images(&value)).unwrap_or_default())
}

fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(Value::Null) | None => Ok(None),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected price text, got {}",
            other
        ))),
    }
}
