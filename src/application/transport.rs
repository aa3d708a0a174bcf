//! Outbound port to the remote API.
//!
//! The coordination layer only ever calls [`Transport::call`] and reads the
//! [`Connectivity`] signal at failure time. Encoding, authentication, and
//! timeouts belong to the implementation behind the trait.

use async_trait::async_trait;
use dojo_api_types::Cursor;
use serde_json::Value;
use thiserror::Error;

/// Query parameter carrying the continuation cursor.
pub const START_KEY_PARAM: &str = "startKey";

/// A read request against the API: path segments plus query pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl ApiRequest {
    /// Build a request from raw path segments. Segments are encoded by the
    /// transport, so they may contain any characters.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach the continuation cursor, replacing any previous one.
    pub fn with_cursor(mut self, cursor: Option<&Cursor>) -> Self {
        self.query.retain(|(key, _)| key != START_KEY_PARAM);
        if let Some(cursor) = cursor {
            self.query
                .push((START_KEY_PARAM.to_string(), cursor.as_str().to_string()));
        }
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, value)| value.as_str())
    }

    /// `/`-joined path, for logs and test doubles.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

/// Transport failure. `Clone` so it can be shared across joined loaders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network unavailable: {message}")]
    Offline { message: String },
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {message}")]
    Decode { message: String },
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl TransportError {
    pub fn offline(message: impl Into<String>) -> Self {
        Self::Offline {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, TransportError::Offline { .. })
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one request and return the decoded JSON body of a 2xx response.
    async fn call(&self, request: ApiRequest) -> Result<Value, TransportError>;
}

/// Whether the local network is currently reachable.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Supplier of the opaque API credential.
pub trait CredentialSource: Send + Sync {
    fn token(&self) -> Option<String>;
}
