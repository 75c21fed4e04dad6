use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{ClientError, ClientResult};
use crate::models::{MaintenanceRequest, PhotoUpload};

static WRAPPING_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^\[?"|"\]?$"#).unwrap());

static MAINTENANCE_FOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/?maintenance/").unwrap());

pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB

const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

pub fn validate_image_content_type(content_type: &str) -> bool {
    matches!(
        content_type,
        "image/jpeg" | "image/png" | "image/gif" | "image/webp"
    )
}

pub fn validate_image_extension(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}

/// Content type for a photo picked from disk, by extension.
pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub fn validate_photo(photo: &PhotoUpload) -> ClientResult<()> {
    if !validate_image_content_type(&photo.content_type) {
        return Err(ClientError::Validation(format!(
            "Unsupported image type: {}",
            photo.content_type
        )));
    }
    if !validate_image_extension(&photo.file_name) {
        return Err(ClientError::Validation(format!(
            "Unsupported image file: {}",
            photo.file_name
        )));
    }
    if photo.bytes.is_empty() {
        return Err(ClientError::Validation("Image is empty".to_string()));
    }
    if photo.bytes.len() > MAX_IMAGE_SIZE {
        return Err(ClientError::Validation("Image is larger than 10MB".to_string()));
    }
    Ok(())
}

/// Splits whatever the backend stored in `images` into individual entries:
/// a JSON array, a JSON-encoded array inside a string, or a bare path.
pub fn raw_entries(value: &Value) -> Vec<String> {
    fn strings(items: &[Value]) -> Vec<String> {
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()
    }

    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => strings(items),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => strings(&items),
            Ok(Value::String(inner)) => vec![inner],
            _ => vec![raw.clone()],
        },
        other => {
            tracing::warn!("Ignoring malformed image list: {}", other);
            Vec::new()
        }
    }
}

/// Absolute URL for one stored entry, or `None` when nothing is left of it.
pub fn absolutize(entry: &str, static_base_url: &str) -> Option<String> {
    let entry = entry.trim();
    if entry.starts_with("http") {
        return Some(entry.to_string());
    }

    let cleaned = WRAPPING_QUOTES.replace_all(entry, "");
    let cleaned = MAINTENANCE_FOLDER.replace(&cleaned, "");
    let cleaned = cleaned.trim().trim_start_matches('/');
    if cleaned.is_empty() {
        return None;
    }

    Some(format!(
        "{}/static/{}",
        static_base_url.trim_end_matches('/'),
        cleaned
    ))
}

pub fn normalize_images(value: &Value, static_base_url: &str) -> Vec<String> {
    raw_entries(value)
        .iter()
        .filter_map(|entry| absolutize(entry, static_base_url))
        .collect()
}

pub fn normalize_record(record: &mut MaintenanceRequest, static_base_url: &str) {
    record.images = record
        .images
        .iter()
        .filter_map(|entry| absolutize(entry, static_base_url))
        .collect();
}

/// Serde hook for `MaintenanceRequest::images`; never fails.
pub fn deserialize_image_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(raw_entries(&Value::deserialize(deserializer)?))
}
