use std::fs;
use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::domain::{MediaType, media_type_of};
use crate::error::AvisetError;

/// Narrow seam around the external classification service. The model itself
/// is an opaque collaborator; all this crate knows is "image in, label out".
pub trait ClassifierClient: Send + Sync {
    fn classify(&self, image: &Utf8Path) -> Result<String, AvisetError>;
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: String,
}

/// HTTP-backed classifier handle. Constructed once at startup and handed
/// around by reference; there is no teardown.
#[derive(Clone)]
pub struct HttpClassifierClient {
    client: Client,
    endpoint: String,
}

impl HttpClassifierClient {
    pub fn new(endpoint: String) -> Result<Self, AvisetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("aviset/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AvisetError::ClassifierHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| AvisetError::ClassifierHttp(err.to_string()))?;
        Ok(Self { client, endpoint })
    }
}

impl ClassifierClient for HttpClassifierClient {
    fn classify(&self, image: &Utf8Path) -> Result<String, AvisetError> {
        let media_type = media_type_of(image.as_str())
            .ok_or_else(|| AvisetError::UnsupportedImageType(image.to_string()))?;
        let content_type = match media_type {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
        };

        let bytes = fs::read(image.as_std_path())
            .map_err(|err| AvisetError::Filesystem(err.to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .map_err(|err| AvisetError::ClassifierHttp(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "classifier request failed".to_string());
            return Err(AvisetError::ClassifierStatus { status, message });
        }

        let body: ClassifyResponse = response
            .json()
            .map_err(|err| AvisetError::ClassifierHttp(err.to_string()))?;
        Ok(body.label)
    }
}
