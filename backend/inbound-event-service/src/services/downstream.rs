//! Downstream gateway
//!
//! Calls the third-party dependency for each new event and classifies the
//! outcome. The classification decides whether the retry executor re-invokes
//! the whole pipeline, so it must never call a permanent failure retryable or
//! a transient one fatal.
//!
//! | Outcome                                   | Classification |
//! |-------------------------------------------|----------------|
//! | 200                                       | Success        |
//! | 5xx                                       | Retryable      |
//! | timeout / connect / send / body read      | Retryable      |
//! | any other status (incl. non-200 2xx, 429) | Fatal          |
//! | request build / redirect / anything else  | Fatal          |

use crate::config::ThirdpartyConfig;
use crate::error::{DownstreamFailure, UnexpectedStatus};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, error};

#[async_trait]
pub trait DownstreamGateway: Send + Sync {
    /// Call the dependency for `key`. `Ok(())` is Success.
    async fn invoke(&self, key: &str) -> Result<(), DownstreamFailure>;
}

/// HTTP gateway: `GET {endpoint}/{key}`
#[derive(Clone)]
pub struct HttpDownstreamGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDownstreamGateway {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Self { client, endpoint }
    }

    /// Build a gateway with its own client and request timeout
    pub fn from_config(config: &ThirdpartyConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build thirdparty HTTP client")?;

        Ok(Self::new(client, config.endpoint.clone()))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.endpoint, urlencoding::encode(key))
    }
}

#[async_trait]
impl DownstreamGateway for HttpDownstreamGateway {
    async fn invoke(&self, key: &str) -> Result<(), DownstreamFailure> {
        let url = self.url_for(key);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!(key = %key, error = %e, "Error calling thirdparty api");
            classify_transport_error(e)
        })?;

        let status = response.status();
        if let Err(failure) = classify_status(status) {
            error!(
                key = %key,
                status = status.as_u16(),
                retryable = failure.is_retryable(),
                "Error calling thirdparty api"
            );
            return Err(failure);
        }

        // A body that cannot be read is a read failure, not a contract error
        response.bytes().await.map_err(|e| {
            error!(key = %key, error = %e, "Error reading thirdparty api response");
            classify_transport_error(e)
        })?;

        debug!(key = %key, "Thirdparty api call succeeded");
        Ok(())
    }
}

/// Classify an HTTP status returned by the dependency
pub fn classify_status(status: StatusCode) -> Result<(), DownstreamFailure> {
    if status == StatusCode::OK {
        return Ok(());
    }

    let cause = anyhow::Error::new(UnexpectedStatus {
        status: status.as_u16(),
    });

    if status.is_server_error() {
        Err(DownstreamFailure::Retryable(cause))
    } else {
        Err(DownstreamFailure::Fatal(cause))
    }
}

/// Classify a client-side error raised before or while reading a response
pub fn classify_transport_error(err: reqwest::Error) -> DownstreamFailure {
    let transient = !err.is_builder()
        && !err.is_redirect()
        && (err.is_timeout()
            || err.is_connect()
            || err.is_request()
            || err.is_body()
            || err.is_decode());

    let cause = anyhow::Error::new(err).context("Error calling thirdparty api");

    if transient {
        DownstreamFailure::Retryable(cause)
    } else {
        DownstreamFailure::Fatal(cause)
    }
}
