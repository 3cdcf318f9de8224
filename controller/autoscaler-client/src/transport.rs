//! HTTP transport for autoscaler requests
//!
//! The dispatcher only sees the [`Transport`] trait. [`ReqwestTransport`] is
//! the production implementation; tests can swap in anything that returns a
//! status and a body.

use crate::params::ParamSet;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed: {message}")]
    RequestFailed { message: String },

    #[error("Failed to read response body: {message}")]
    BodyUnreadable { message: String },
}

/// Outbound request, relative to the transport's base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub query: ParamSet,
    pub body: Option<Value>,
}

/// Raw response: status plus the unparsed body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and return whatever the server answered.
    ///
    /// Non-2xx statuses are not errors at this level.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Transport backed by a shared `reqwest::Client`
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Create a transport for `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let base_url = base_url.into();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            bail!(
                "Invalid autoscaler API URL: {}. Must start with http:// or https://",
                base_url
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, url = %url, "Sending autoscaler request");

        let mut builder = self.client.request(request.method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::BodyUnreadable {
                message: e.to_string(),
            })?;

        Ok(ApiResponse { status, body })
    }
}
