use base64::{engine::general_purpose, Engine as _};
use log::{error, info};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::CloudinaryConfig;

const CLOUDINARY_API: &str = "https://api.cloudinary.com/v1_1";

/// An image received from a multipart form, not yet uploaded.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageUploadError {
    #[error("Invalid image format: {0}")]
    InvalidImageFormat(String),
    #[error("Image host request failed: {0}")]
    RequestError(String),
    #[error("Image host returned status {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("Could not parse image host response: {0}")]
    ResponseParseFailed(String),
    #[error("Not an image host URL: {0}")]
    UnknownUrl(String),
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

pub struct ImageService {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    base_url: String,
}

impl ImageService {
    pub fn new(config: &CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url: CLOUDINARY_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Uploads every image in order and returns their URLs. Stops at the
    /// first failure.
    pub async fn upload_images(
        &self,
        images: Vec<ImageFile>,
        folder: &str,
    ) -> Result<Vec<String>, ImageUploadError> {
        let mut urls = Vec::with_capacity(images.len());
        for image in images {
            match self.upload_single_image(image, folder).await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    error!("Failed to upload image: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(urls)
    }

    pub async fn upload_single_image(
        &self,
        image: ImageFile,
        folder: &str,
    ) -> Result<String, ImageUploadError> {
        get_file_extension(&image.content_type)?;
        if image.bytes.is_empty() {
            return Err(ImageUploadError::InvalidImageFormat(format!(
                "{} is empty",
                image.file_name
            )));
        }

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let public_id = Uuid::new_v4().to_string();
        let data_uri = format!(
            "data:{};base64,{}",
            image.content_type,
            general_purpose::STANDARD.encode(&image.bytes)
        );

        let signature = self.sign(&[
            ("folder", folder),
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);

        let params = [
            ("file", data_uri.as_str()),
            ("api_key", self.api_key.as_str()),
            ("folder", folder),
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let uploaded: UploadResponse = self.post("image/upload", &params).await?;
        info!("Uploaded {} to {}", image.file_name, uploaded.secure_url);
        Ok(uploaded.secure_url)
    }

    pub async fn delete_image(&self, url: &str) -> Result<(), ImageUploadError> {
        let public_id = public_id_from_url(url)?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);

        let params = [
            ("public_id", public_id.as_str()),
            ("api_key", self.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let destroyed: DestroyResponse = self.post("image/destroy", &params).await?;
        if destroyed.result != "ok" {
            // "not found" means it is already gone
            info!("Image host reported '{}' for {}", destroyed.result, public_id);
        }
        Ok(())
    }

    async fn post<R: serde::de::DeserializeOwned>(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<R, ImageUploadError> {
        let response = self
            .client
            .post(format!("{}/{}/{}", self.base_url, self.cloud_name, action))
            .form(params)
            .send()
            .await
            .map_err(|e| ImageUploadError::RequestError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ImageUploadError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ImageUploadError::ResponseParseFailed(e.to_string()))
    }

    fn sign(&self, params: &[(&str, &str)]) -> String {
        signature(params, &self.api_secret)
    }
}

/// Request signature: parameters sorted by name, joined as `k=v&k=v`, with
/// the API secret appended, hashed with SHA-256.
pub fn signature(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let digest = Sha256::digest(format!("{}{}", to_sign, api_secret).as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// `https://res.cloudinary.com/<cloud>/image/upload/v123/folder/name.jpg`
/// has public id `folder/name`.
pub fn public_id_from_url(url: &str) -> Result<String, ImageUploadError> {
    let (_, after) = url
        .split_once("/upload/")
        .ok_or_else(|| ImageUploadError::UnknownUrl(url.to_string()))?;

    let mut segments: Vec<&str> = after.split('/').filter(|s| !s.is_empty()).collect();
    let versioned = segments.first().map_or(false, |first| {
        first.len() > 1 && first.starts_with('v') && first[1..].chars().all(|c| c.is_ascii_digit())
    });
    if versioned {
        segments.remove(0);
    }

    let path = segments.join("/");
    let public_id = match path.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => path,
    };

    if public_id.is_empty() {
        return Err(ImageUploadError::UnknownUrl(url.to_string()));
    }
    Ok(public_id)
}

pub fn get_file_extension(file_type: &str) -> Result<&'static str, ImageUploadError> {
    match file_type {
        "image/jpeg" | "image/jpg" => Ok("jpg"),
        "image/png" => Ok("png"),
        "image/gif" => Ok("gif"),
        "image/webp" => Ok("webp"),
        _ => Err(ImageUploadError::InvalidImageFormat(format!(
            "Unsupported file type: {}",
            file_type
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> ImageService {
        ImageService::new(&CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "1234".to_string(),
            api_secret: "shh".to_string(),
        })
        .with_base_url(server.uri())
    }

    fn png() -> ImageFile {
        ImageFile {
            file_name: "lake.png".to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        }
    }

    #[test]
    fn signature_sorts_parameters() {
        let a = signature(&[("timestamp", "1"), ("folder", "x")], "secret");
        let b = signature(&[("folder", "x"), ("timestamp", "1")], "secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, signature(&[("folder", "x"), ("timestamp", "1")], "other"));
    }

    #[test]
    fn public_id_is_taken_from_delivery_url() {
        assert_eq!(
            public_id_from_url(
                "https://res.cloudinary.com/demo/image/upload/v1712345678/tourease/destinations/abc.jpg"
            )
            .unwrap(),
            "tourease/destinations/abc"
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/sample.png").unwrap(),
            "sample"
        );
        assert!(public_id_from_url("https://example.com/picture.jpg").is_err());
    }

    #[test]
    fn only_web_image_types_are_accepted() {
        assert_eq!(get_file_extension("image/jpeg").unwrap(), "jpg");
        assert_eq!(get_file_extension("image/webp").unwrap(), "webp");
        assert!(get_file_extension("application/pdf").is_err());
    }

    #[tokio::test]
    async fn upload_returns_secure_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/upload"))
            .and(body_string_contains("signature_algorithm=sha256"))
            .and(body_string_contains("api_key=1234"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_id": "tourease/photos/abc",
                "secure_url": "https://res.cloudinary.com/demo/image/upload/v1/tourease/photos/abc.png"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = service(&server)
            .upload_single_image(png(), "tourease/photos")
            .await
            .unwrap();
        assert!(url.ends_with("abc.png"));
    }

    #[tokio::test]
    async fn unsupported_type_never_reaches_host() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut file = png();
        file.content_type = "text/plain".to_string();
        let err = service(&server)
            .upload_images(vec![file], "tourease/photos")
            .await
            .unwrap_err();
        assert!(matches!(err, ImageUploadError::InvalidImageFormat(_)));
    }

    #[tokio::test]
    async fn delete_sends_public_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/demo/image/destroy"))
            .and(body_string_contains("public_id=tourease%2Fphotos%2Fabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        service(&server)
            .delete_image("https://res.cloudinary.com/demo/image/upload/v1/tourease/photos/abc.png")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn host_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Signature"))
            .mount(&server)
            .await;

        let err = service(&server)
            .upload_single_image(png(), "tourease/photos")
            .await
            .unwrap_err();
        assert!(matches!(err, ImageUploadError::ApiError { status: 401, .. }));
    }
}
