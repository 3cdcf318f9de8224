//! Operation descriptors for the autoscaler API

use crate::params::{ParamSet, TimeRange};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const HEALTH_ENTITY_KEY: &str = "autoscalerHealth";
pub const POLICY_ENTITY_KEY: &str = "autoscalerPolicy";
pub const TRIGGER_ENTITY_KEY: &str = "autoscalerPolicyTrigger";
pub const SCALING_HISTORY_ENTITY_KEY: &str = "autoscalerScalingHistory";
pub const METRIC_ENTITY_KEY: &str = "autoscalerAppMetric";

/// Kind of request reported to the state sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Fetch,
    Update,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Fetch => "fetch",
            RequestKind::Update => "update",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which resource a request is about and where its result is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Application guid
    pub app_id: String,
    /// Endpoint (connection) id the proxy routes to
    pub endpoint_id: String,
    /// Collection the normalized entities are stored under
    pub entity_key: String,
}

impl Target {
    pub fn new(
        app_id: impl Into<String>,
        endpoint_id: impl Into<String>,
        entity_key: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            endpoint_id: endpoint_id.into(),
            entity_key: entity_key.into(),
        }
    }
}

/// Scaling history query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryQuery {
    pub initial_params: Option<ParamSet>,
    pub params: Option<ParamSet>,
    /// Key of the pagination section the caller's snapshot came from.
    /// Informational only: it is logged with the request and never sent.
    pub pagination_key: Option<String>,
    pub range: Option<TimeRange>,
    /// Store the whole page as one entity instead of one per event
    pub normal_format: bool,
}

/// Metric series query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricQuery {
    /// Path below the autoscaler prefix, without a leading slash
    pub relative_url: String,
    pub metric_name: String,
    pub initial_params: Option<ParamSet>,
    pub params: Option<ParamSet>,
    pub skip_format: bool,
    pub trigger: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Health,
    GetPolicy,
    UpdatePolicy { policy: Value },
    DetachPolicy,
    GetTrigger { query: Value },
    ScalingHistory(HistoryQuery),
    GetMetric(MetricQuery),
}

impl Operation {
    pub fn kind(&self) -> RequestKind {
        match self {
            Operation::UpdatePolicy { .. } | Operation::DetachPolicy => RequestKind::Update,
            _ => RequestKind::Fetch,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Operation::UpdatePolicy { .. } => Method::PUT,
            Operation::DetachPolicy => Method::DELETE,
            _ => Method::GET,
        }
    }

    /// Path below the autoscaler prefix
    pub fn path(&self, app_id: &str) -> String {
        match self {
            Operation::Health => "/health".to_string(),
            Operation::GetPolicy
            | Operation::UpdatePolicy { .. }
            | Operation::DetachPolicy
            | Operation::GetTrigger { .. } => format!("/apps/{}/policy", app_id),
            Operation::ScalingHistory(_) => format!("/apps/{}/event", app_id),
            Operation::GetMetric(query) => {
                format!("/{}", query.relative_url.trim_start_matches('/'))
            }
        }
    }

    /// Verb phrase used in failure messages
    pub fn failure_verb(&self) -> &'static str {
        match self {
            Operation::Health => "fetch health info",
            Operation::GetPolicy => "fetch policy",
            Operation::UpdatePolicy { .. } | Operation::DetachPolicy => "update policy",
            Operation::GetTrigger { .. } => "fetch scaling policy trigger",
            Operation::ScalingHistory(_) => "fetch scaling history",
            Operation::GetMetric(_) => "fetch metrics",
        }
    }

    /// Collection this operation's results usually live under
    pub fn default_entity_key(&self) -> &'static str {
        match self {
            Operation::Health => HEALTH_ENTITY_KEY,
            Operation::GetPolicy | Operation::UpdatePolicy { .. } | Operation::DetachPolicy => {
                POLICY_ENTITY_KEY
            }
            Operation::GetTrigger { .. } => TRIGGER_ENTITY_KEY,
            Operation::ScalingHistory(_) => SCALING_HISTORY_ENTITY_KEY,
            Operation::GetMetric(_) => METRIC_ENTITY_KEY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Health => "health",
            Operation::GetPolicy => "get_policy",
            Operation::UpdatePolicy { .. } => "update_policy",
            Operation::DetachPolicy => "detach_policy",
            Operation::GetTrigger { .. } => "get_trigger",
            Operation::ScalingHistory(_) => "scaling_history",
            Operation::GetMetric(_) => "get_metric",
        }
    }
}

/// An operation bound to its target
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub target: Target,
    pub operation: Operation,
}

impl OperationRequest {
    pub fn new(target: Target, operation: Operation) -> Self {
        Self { target, operation }
    }
}
