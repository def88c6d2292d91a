// SPDX-License-Identifier: MIT
//! Screenshot collaborator interface.
//!
//! The rasterizer is a black box: an async operation that either produces
//! an image payload or fails with a [`CaptureError`]. Completion may be
//! arbitrarily slow; the interaction flow keeps working either way.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Screenshot pipeline failure. Recoverable: surfaced as status text,
/// never affects session state.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("screenshot capture failed: {0}")]
    Failed(String),
    #[error("no screenshot source configured")]
    Unavailable,
}

/// An image carried in a debug report, encoded as a data URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImagePayload(String);

impl ImagePayload {
    pub fn from_data_uri(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn from_png_bytes(bytes: &[u8]) -> Self {
        Self(format!("data:image/png;base64,{}", STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Payload size in bytes as carried on the wire.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    async fn capture(&self) -> Result<ImagePayload, CaptureError>;
}

/// Source for hosts without a rasterizer: every capture fails with
/// [`CaptureError::Unavailable`].
pub struct NoScreenshot;

#[async_trait]
impl ScreenshotSource for NoScreenshot {
    async fn capture(&self) -> Result<ImagePayload, CaptureError> {
        Err(CaptureError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_bytes_become_a_data_uri() {
        let payload = ImagePayload::from_png_bytes(&[0x89, 0x50, 0x4e, 0x47]);
        assert!(payload.as_str().starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn null_source_always_fails() {
        let err = NoScreenshot.capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::Unavailable));
    }
}
