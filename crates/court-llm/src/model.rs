//! Model service abstraction

use crate::failure::ServiceFailure;
use crate::salvage::salvage;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Requested output shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Free text
    #[default]
    Text,
    /// A single JSON object
    JsonObject,
}

/// Inline image sent with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// MIME type, e.g. `image/png`
    pub mime: String,
    /// Base64-encoded bytes
    pub data_base64: String,
}

impl ImageAttachment {
    /// Encode raw bytes
    #[must_use]
    pub fn from_bytes(mime: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime: mime.into(),
            data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Read and encode an image file, guessing the MIME type from its extension
    ///
    /// # Errors
    /// Returns the I/O error if the file cannot be read.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let mime = mime_guess::from_path(path)
            .first()
            .filter(|m| m.type_() == mime_guess::mime::IMAGE)
            .map_or_else(|| "image/png".to_string(), |m| m.essence_str().to_string());
        Ok(Self::from_bytes(mime, &bytes))
    }

    /// `data:` URL form
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.data_base64)
    }
}

/// One chat-style request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Optional system instruction
    pub system: Option<String>,
    /// User prompt
    pub prompt: String,
    /// Images sent alongside the prompt
    pub images: Vec<ImageAttachment>,
    /// Requested output shape
    pub format: ResponseFormat,
    /// Sampling temperature
    pub temperature: f32,
}

impl ChatRequest {
    /// Create a text request
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: None,
            prompt: prompt.into(),
            images: Vec::new(),
            format: ResponseFormat::Text,
            temperature: 0.0,
        }
    }

    /// Set the system instruction
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Request a JSON object
    #[must_use]
    pub fn json(mut self) -> Self {
        self.format = ResponseFormat::JsonObject;
        self
    }

    /// Attach images
    #[must_use]
    pub fn with_images(mut self, images: Vec<ImageAttachment>) -> Self {
        self.images = images;
        self
    }

    /// Set the temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// External generative service
///
/// Implementations perform exactly one call; retries, pacing and
/// serialization belong to [`crate::Invoker`].
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send one request and return the generated text
    async fn complete(&self, request: &ChatRequest) -> Result<String, ServiceFailure>;

    /// Backend name (for logs)
    fn name(&self) -> &str;
}

/// Complete a request and validate the text as `T`
///
/// Accepts a bare JSON document or one embedded in surrounding prose.
///
/// # Errors
/// Propagates the call failure, or returns [`ServiceFailure::Malformed`]
/// with the raw text when no valid `T` is found.
pub async fn complete_json<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    request: &ChatRequest,
) -> Result<T, ServiceFailure> {
    let text = model.complete(request).await?;
    salvage(&text).ok_or_else(|| {
        ServiceFailure::malformed(format!("response is not a valid {}", short_type_name::<T>()), text)
    })
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    struct Canned(&'static str);

    #[async_trait::async_trait]
    impl LanguageModel for Canned {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ServiceFailure> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[derive(Debug, Deserialize)]
    struct Summary {
        executive_summary: String,
    }

    #[tokio::test]
    async fn complete_json_accepts_embedded_objects() {
        let model = Canned("Here you go: {\"executive_summary\": \"solid\"}");
        let summary: Summary = complete_json(&model, &ChatRequest::new("m", "p")).await.unwrap();
        assert_eq!(summary.executive_summary, "solid");
    }

    #[tokio::test]
    async fn complete_json_keeps_raw_text_on_failure() {
        let model = Canned("no structure here");
        let err = complete_json::<Summary>(&model, &ChatRequest::new("m", "p"))
            .await
            .unwrap_err();
        assert_eq!(err.raw_payload(), Some("no structure here"));
    }

    #[tokio::test]
    async fn image_mime_is_guessed_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagram.jpg");
        tokio::fs::write(&path, [0xFF, 0xD8, 0xFF]).await.unwrap();

        let image = ImageAttachment::from_path(&path).await.unwrap();
        assert_eq!(image.mime, "image/jpeg");
        assert!(image.data_url().starts_with("data:image/jpeg;base64,"));
    }
}
