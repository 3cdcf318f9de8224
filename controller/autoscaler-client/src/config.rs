//! Configuration for the autoscaler client

use crate::dispatch::common_prefix;
use crate::transport::ReqwestTransport;
use anyhow::Result;
use clap::Args;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_PROXY_API_VERSION: &str = "v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Connection settings shared by every command
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Base URL of the dashboard backend proxying to the autoscaler
    #[arg(long, env = "AUTOSCALER_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Proxy API version used in the request prefix
    #[arg(long, env, default_value = DEFAULT_PROXY_API_VERSION)]
    pub proxy_api_version: String,

    /// Endpoint (connection) id the proxy should route to
    #[arg(long, env)]
    pub endpoint_id: String,

    /// Request timeout in seconds
    #[arg(long, env, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub request_timeout_secs: u64,

    /// Output logs in JSON format
    #[arg(long, env)]
    pub log_json: bool,
}

impl Config {
    /// Path prefix every autoscaler request lives under
    pub fn common_prefix(&self) -> String {
        common_prefix(&self.proxy_api_version)
    }

    pub fn build_transport(&self) -> Result<ReqwestTransport> {
        ReqwestTransport::new(self.api_url.clone(), self.request_timeout_secs)
    }
}
