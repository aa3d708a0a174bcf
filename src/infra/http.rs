//! reqwest-backed [`Transport`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::transport::{ApiRequest, CredentialSource, Transport, TransportError};

use super::connectivity::ConnectivityFlag;
use super::error::InfraError;

/// Credential fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|token| !token.is_empty()))
    }
}

impl CredentialSource for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

pub struct HttpTransport {
    client: Client,
    base: Url,
    credentials: Arc<dyn CredentialSource>,
    connectivity: ConnectivityFlag,
}

impl HttpTransport {
    pub fn new(
        base: Url,
        timeout: Duration,
        credentials: Arc<dyn CredentialSource>,
        connectivity: ConnectivityFlag,
    ) -> Result<Self, InfraError> {
        if base.cannot_be_a_base() {
            return Err(InfraError::configuration(format!(
                "API base URL `{base}` cannot carry a path"
            )));
        }
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;
        Ok(Self {
            client,
            base,
            credentials,
            connectivity,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("dojo-sync/", env!("CARGO_PKG_VERSION"))
    }

    /// Absolute URL for a request. Segments are percent-encoded individually.
    pub fn url(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::invalid_request(format!("cannot extend `{}`", self.base)))?
            .pop_if_empty()
            .extend(request.segments());

        url.set_query(None);
        if !request.query().is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in request.query() {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_connect() || err.is_timeout() {
            self.connectivity.set_online(false);
            warn!(error = %err, "API unreachable");
            TransportError::offline(err.to_string())
        } else if err.is_body() || err.is_decode() {
            TransportError::decode(err.to_string())
        } else {
            TransportError::invalid_request(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let url = self.url(&request)?;
        debug!(%url, "GET");

        let mut builder = self.client.get(url);
        if let Some(token) = self.credentials.token() {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|err| self.classify(err))?;
        self.connectivity.set_online(true);

        let status = response.status();
        // The server answered, so a failure while reading the body is not a
        // connectivity loss.
        let bytes = response.bytes().await.map_err(|err| {
            warn!(error = %err, %status, "Failed to read response body");
            TransportError::decode(err.to_string())
        })?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|err| TransportError::decode(err.to_string()))
    }
}
