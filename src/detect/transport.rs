//! Host request primitives.
//!
//! Editors send requests through one of two shapes: a fetch-style call that
//! hands the response back to the caller, or a legacy request object that
//! reports completion through a load callback.

use thiserror::Error;
use url::Url;

use crate::builder::RequestPayload;

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub method: String,
    pub url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

impl OutgoingRequest {
    pub fn post(url: Url, content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            url,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn payload(&self) -> RequestPayload {
        RequestPayload::parse(self.content_type.as_deref(), &self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

/// Load callback of a legacy request.
pub type OnLoad = Box<dyn FnOnce(&Response) + Send>;

pub trait FetchTransport: Send + Sync {
    fn fetch(&self, request: &OutgoingRequest) -> Result<Response, TransportError>;
}

pub trait LegacyTransport: Send + Sync {
    /// Send `request`; `on_load` runs once the response is complete.
    fn send(&self, request: OutgoingRequest, on_load: OnLoad);
}
