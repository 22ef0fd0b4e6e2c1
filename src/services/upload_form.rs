use std::collections::HashMap;

use actix_multipart::Multipart;
use futures::StreamExt;

use crate::error::{AppError, AppResult};
use crate::services::image_service::ImageFile;

pub const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;
/// Budget shared by all text fields of one form.
pub const MAX_TEXT_BYTES: usize = 64 * 1024;

/// A multipart body split into text fields and uploaded files.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<ImageFile>>,
}

impl UploadForm {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn required(&self, name: &str) -> AppResult<String> {
        self.text(name)
            .map(str::to_string)
            .ok_or_else(|| AppError::bad_request(format!("{} is required", name)))
    }

    /// Parses a field holding a JSON value, e.g. an array of ids.
    pub fn json<T: serde::de::DeserializeOwned>(&self, name: &str) -> AppResult<Option<T>> {
        match self.text(name) {
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|_| AppError::bad_request(format!("{} is not valid JSON", name))),
            None => Ok(None),
        }
    }

    pub fn take_files(&mut self, name: &str) -> Vec<ImageFile> {
        self.files.remove(name).unwrap_or_default()
    }

    pub fn insert_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn insert_file(&mut self, name: impl Into<String>, file: ImageFile) {
        self.files.entry(name.into()).or_default().push(file);
    }
}

/// Buffers a multipart body, refusing it once it carries more than
/// `max_files` files or more text than `MAX_TEXT_BYTES`.
pub async fn read_form(mut payload: Multipart, max_files: usize) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();
    let mut file_count = 0;
    let mut text_bytes = 0;

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::bad_request(format!("Malformed form data: {}", e)))?;

        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.essence_str().to_string());

        let limit = if file_name.is_some() {
            file_count += 1;
            if file_count > max_files {
                return Err(AppError::bad_request(format!(
                    "At most {} file(s) can be uploaded at once",
                    max_files
                )));
            }
            MAX_FILE_BYTES
        } else {
            MAX_TEXT_BYTES - text_bytes
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| AppError::bad_request(format!("Failed to read upload: {}", e)))?;
            if bytes.len() + chunk.len() > limit {
                return Err(AppError::bad_request(format!(
                    "{} exceeds the upload size limit",
                    name
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        match file_name {
            Some(file_name) => form.insert_file(
                name,
                ImageFile {
                    file_name,
                    content_type: content_type.unwrap_or_default(),
                    bytes,
                },
            ),
            None => {
                text_bytes += bytes.len();
                let value = String::from_utf8(bytes)
                    .map_err(|_| AppError::bad_request(format!("{} is not valid text", name)))?;
                form.insert_text(name, value);
            }
        }
    }

    Ok(form)
}
