use axum::extract::Multipart;
use reqwest::{StatusCode, multipart};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::UploadConfig;

pub const MAX_IMAGE_BYTES: usize = 3 * 1024 * 1024;

/// Image hosting endpoint taking an unsigned upload preset.
#[derive(Debug, Clone)]
pub struct ImageHost {
    http: reqwest::Client,
    url: String,
    preset: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Image must be less than 3MB")]
    TooLarge,

    #[error("image uploads are not configured")]
    NotConfigured,

    #[error("image host responded with {0}")]
    Rejected(StatusCode),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("could not read form: {0}")]
    Form(String),
}

impl MediaError {
    pub fn user_message(&self) -> &'static str {
        match self {
            MediaError::TooLarge => "Image must be less than 3MB",
            MediaError::NotConfigured => "Image uploads are not available, paste an image URL instead",
            MediaError::Form(_) => "Could not read the submitted form",
            MediaError::Rejected(_) | MediaError::Transport(_) => "Image upload failed!",
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Text fields and the (optional) image of a multipart form.
#[derive(Debug, Default)]
pub struct FormFields {
    fields: HashMap<String, String>,
    pub image: Option<UploadedFile>,
}

impl FormFields {
    /// Reads every part; the part named `image_field` is kept as the file.
    pub async fn read(mut multipart: Multipart, image_field: &str) -> Result<Self, MediaError> {
        let mut form = FormFields::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| MediaError::Form(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == image_field {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| MediaError::Form(e.to_string()))?;
                if !bytes.is_empty() {
                    form.image = Some(UploadedFile {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|e| MediaError::Form(e.to_string()))?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn with_text(mut self, name: &str, value: &str) -> Self {
        self.fields.insert(name.to_string(), value.to_string());
        self
    }
}

impl ImageHost {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: config.url.clone(),
            preset: config.preset.clone(),
        }
    }

    pub async fn upload(&self, file: UploadedFile) -> Result<String, MediaError> {
        check_size(&file)?;
        debug!("uploading {} ({} bytes)", file.file_name, file.bytes.len());

        let mut part = multipart::Part::bytes(file.bytes).file_name(file.file_name);
        if let Some(content_type) = file.content_type.as_deref() {
            part = part.mime_str(content_type)?;
        }
        let form = multipart::Form::new()
            .part("file", part)
            .text("upload_preset", self.preset.clone());

        let response = self.http.post(&self.url).multipart(form).send().await?;
        if !response.status().is_success() {
            warn!("image upload rejected with {}", response.status());
            return Err(MediaError::Rejected(response.status()));
        }
        Ok(response.json::<UploadResponse>().await?.secure_url)
    }
}

fn check_size(file: &UploadedFile) -> Result<(), MediaError> {
    if file.bytes.len() > MAX_IMAGE_BYTES {
        return Err(MediaError::TooLarge);
    }
    Ok(())
}

/// Picks the image URL for a form: a fresh upload wins over a pasted URL,
/// which wins over `current`.
pub async fn resolve_image(
    host: Option<&ImageHost>,
    form: &mut FormFields,
    url_field: &str,
    current: Option<&str>,
) -> Result<Option<String>, MediaError> {
    if let Some(file) = form.image.take() {
        check_size(&file)?;
        let host = host.ok_or(MediaError::NotConfigured)?;
        return host.upload(file).await.map(Some);
    }
    let pasted = form.text(url_field).trim();
    if !pasted.is_empty() {
        return Ok(Some(pasted.to_string()));
    }
    Ok(current.map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(len: usize) -> UploadedFile {
        UploadedFile {
            file_name: "banner.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![0; len],
        }
    }

    #[test]
    fn large_images_are_refused() {
        assert!(check_size(&file(MAX_IMAGE_BYTES)).is_ok());
        let err = check_size(&file(MAX_IMAGE_BYTES + 1)).unwrap_err();
        assert_eq!(err.user_message(), "Image must be less than 3MB");
    }

    #[tokio::test]
    async fn pasted_url_is_used_without_a_host() {
        let mut form = FormFields::default().with_text("bannerImageUrl", " https://img/x.png ");
        let image = resolve_image(None, &mut form, "bannerImageUrl", Some("https://img/old.png"))
            .await
            .unwrap();
        assert_eq!(image.as_deref(), Some("https://img/x.png"));
    }

    #[tokio::test]
    async fn current_image_is_kept_when_nothing_new_arrives() {
        let mut form = FormFields::default();
        let image = resolve_image(None, &mut form, "bannerImageUrl", Some("https://img/old.png"))
            .await
            .unwrap();
        assert_eq!(image.as_deref(), Some("https://img/old.png"));
    }

    #[tokio::test]
    async fn upload_without_host_is_an_error() {
        let mut form = FormFields::default();
        form.image = Some(file(10));
        let err = resolve_image(None, &mut form, "bannerImageUrl", None)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NotConfigured));
    }
}
