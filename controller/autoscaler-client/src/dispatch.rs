//! Request dispatch
//!
//! One operation produces one HTTP call and one [`Outcome`]. Each operation
//! variant maps to a request plan and a `Shape` describing how its response
//! body becomes an entity map.

use crate::metric::{MetricBuilder, SeriesMetricBuilder};
use crate::normalize::{self, EntityMap};
use crate::operation::{Operation, OperationRequest, Target};
use crate::params::{self, PaginationSnapshot};
use crate::policy::{PolicyCodec, ScalingRulesCodec};
use crate::sink::StateSink;
use crate::transport::{ApiRequest, Transport, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument};

pub const POLICY_NOT_FOUND_MESSAGE: &str = "No policy is defined for this application.";

pub const API_HOST_HEADER: &str = "x-cap-api-host";
pub const PASSTHROUGH_HEADER: &str = "x-cap-passthrough";
pub const ENDPOINT_LIST_HEADER: &str = "x-cap-cnsi-list";
const AUTOSCALER_API_HOST: &str = "autoscaler";

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("{status} {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{status} invalid response body: {message}")]
    Decode { status: u16, message: String },
}

/// Terminal result of one dispatched operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        data: EntityMap,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_results: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total_pages: Option<u64>,
    },
    Failure {
        message: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// How a response body is turned into entities
#[derive(Debug, Clone, Copy)]
enum Shape<'a> {
    Direct,
    Policy,
    Detached,
    Trigger(&'a Value),
    History { normal_format: bool },
    Metric(&'a crate::operation::MetricQuery),
}

struct RequestPlan<'a> {
    request: ApiRequest,
    shape: Shape<'a>,
}

struct Shaped {
    data: EntityMap,
    total_results: Option<u64>,
    total_pages: Option<u64>,
}

impl Shaped {
    fn entities(data: EntityMap) -> Self {
        Self {
            data,
            total_results: None,
            total_pages: None,
        }
    }
}

/// Autoscaler prefix under the proxy for a given proxy API version
pub fn common_prefix(proxy_api_version: &str) -> String {
    format!("/pp/{}/autoscaler", proxy_api_version)
}

/// Routing headers the proxy uses to reach the autoscaler behind an endpoint
pub fn routing_headers(endpoint_id: &str) -> Vec<(String, String)> {
    vec![
        (API_HOST_HEADER.to_string(), AUTOSCALER_API_HOST.to_string()),
        (PASSTHROUGH_HEADER.to_string(), "true".to_string()),
        (ENDPOINT_LIST_HEADER.to_string(), endpoint_id.to_string()),
    ]
}

/// Message handed to the failure sink for an operation's error
pub fn failure_message(operation: &Operation, error: &DispatchError) -> String {
    match (operation, error) {
        (Operation::GetPolicy, DispatchError::Status { status: 404, body }) if body == "{}" => {
            POLICY_NOT_FOUND_MESSAGE.to_string()
        }
        _ => format!("Unable to {}: {}", operation.failure_verb(), error),
    }
}

pub struct Dispatcher<T, S> {
    transport: T,
    sink: S,
    prefix: String,
    policy_codec: Box<dyn PolicyCodec>,
    metric_builder: Box<dyn MetricBuilder>,
}

impl<T: Transport, S: StateSink> Dispatcher<T, S> {
    pub fn new(transport: T, sink: S, proxy_api_version: &str) -> Self {
        Self {
            transport,
            sink,
            prefix: common_prefix(proxy_api_version),
            policy_codec: Box::new(ScalingRulesCodec),
            metric_builder: Box::new(SeriesMetricBuilder),
        }
    }

    pub fn with_policy_codec(mut self, codec: impl PolicyCodec + 'static) -> Self {
        self.policy_codec = Box::new(codec);
        self
    }

    pub fn with_metric_builder(mut self, builder: impl MetricBuilder + 'static) -> Self {
        self.metric_builder = Box::new(builder);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run one operation end to end and report it to the sink.
    ///
    /// `pagination` is the caller's current snapshot for the target
    /// collection; only scaling history reads it.
    #[instrument(
        skip_all,
        fields(operation = request.operation.name(), app_id = %request.target.app_id)
    )]
    pub async fn dispatch(
        &self,
        request: &OperationRequest,
        pagination: Option<&PaginationSnapshot>,
    ) -> Outcome {
        let kind = request.operation.kind();
        self.sink.request_started(&request.target, kind);

        let outcome = match self.execute(request, pagination).await {
            Ok(shaped) => Outcome::Success {
                data: shaped.data,
                total_results: shaped.total_results,
                total_pages: shaped.total_pages,
            },
            Err(e) => Outcome::Failure {
                message: failure_message(&request.operation, &e),
            },
        };

        match &outcome {
            Outcome::Success {
                data,
                total_results,
                total_pages,
            } => self.sink.request_succeeded(
                &request.target,
                data,
                kind,
                *total_results,
                *total_pages,
            ),
            Outcome::Failure { message } => {
                self.sink.request_failed(&request.target, message, kind)
            }
        }

        outcome
    }

    async fn execute(
        &self,
        request: &OperationRequest,
        pagination: Option<&PaginationSnapshot>,
    ) -> Result<Shaped, DispatchError> {
        let plan = self.plan(request, pagination);
        debug!(
            method = %plan.request.method,
            path = %plan.request.path,
            params = ?plan.request.query,
            "Dispatching autoscaler request"
        );

        let response = self.transport.send(plan.request).await?;
        if !response.is_success() {
            return Err(DispatchError::Status {
                status: response.status,
                body: response.body,
            });
        }

        // detach answers with whatever the backend likes; it is never read
        let body = match plan.shape {
            Shape::Detached => Value::Null,
            _ => serde_json::from_str(&response.body).map_err(|e| DispatchError::Decode {
                status: response.status,
                message: e.to_string(),
            })?,
        };

        Ok(self.shape(&request.target, plan.shape, body))
    }

    fn plan<'a>(
        &self,
        request: &'a OperationRequest,
        pagination: Option<&PaginationSnapshot>,
    ) -> RequestPlan<'a> {
        let target = &request.target;
        let operation = &request.operation;

        let (query, body, shape) = match operation {
            Operation::Health => (params::ParamSet::new(), None, Shape::Direct),
            Operation::GetPolicy => (params::ParamSet::new(), None, Shape::Policy),
            Operation::UpdatePolicy { policy } => (
                params::ParamSet::new(),
                Some(self.policy_codec.map_to_array(policy.clone())),
                Shape::Policy,
            ),
            Operation::DetachPolicy => (params::ParamSet::new(), None, Shape::Detached),
            Operation::GetTrigger { query } => {
                (params::ParamSet::new(), None, Shape::Trigger(query))
            }
            Operation::ScalingHistory(history) => {
                debug!(
                    pagination_key = ?history.pagination_key,
                    page = params::page_number(pagination),
                    "Building scaling history params"
                );
                let query = params::history_params(
                    history.initial_params.as_ref(),
                    pagination,
                    history.params.as_ref(),
                    history.range.as_ref(),
                );
                (
                    query,
                    None,
                    Shape::History {
                        normal_format: history.normal_format,
                    },
                )
            }
            Operation::GetMetric(metric) => {
                let query =
                    params::merge_params([metric.initial_params.as_ref(), metric.params.as_ref()]);
                (query, None, Shape::Metric(metric))
            }
        };

        RequestPlan {
            request: ApiRequest {
                method: operation.method(),
                path: format!("{}{}", self.prefix, operation.path(&target.app_id)),
                headers: routing_headers(&target.endpoint_id),
                query,
                body,
            },
            shape,
        }
    }

    fn shape(&self, target: &Target, shape: Shape<'_>, body: Value) -> Shaped {
        let key = target.entity_key.as_str();

        match shape {
            Shape::Direct => Shaped::entities(normalize::direct(key, &target.app_id, body)),
            Shape::Policy => {
                let policy = self.policy_codec.array_to_map(body);
                Shaped::entities(normalize::direct(key, &target.app_id, policy))
            }
            Shape::Detached => Shaped::entities(normalize::direct(
                key,
                &target.app_id,
                json!({ "enabled": false }),
            )),
            Shape::Trigger(query) => {
                let policy = self.policy_codec.array_to_map(body);
                let data = normalize::trigger_map(key, policy, query);
                Shaped {
                    total_results: Some(data.result.len() as u64),
                    total_pages: Some(1),
                    data,
                }
            }
            Shape::History { normal_format } => {
                let total_results = body.get("total_results").and_then(Value::as_u64);
                let total_pages = body.get("total_pages").and_then(Value::as_u64);
                let data = if normal_format {
                    normalize::direct(key, &target.app_id, body)
                } else {
                    normalize::event_list(key, body)
                };
                Shaped {
                    data,
                    total_results,
                    total_pages,
                }
            }
            Shape::Metric(metric) => {
                let initial = metric.initial_params.as_ref();
                let series = self.metric_builder.build(
                    &metric.metric_name,
                    &body,
                    initial.and_then(|p| p.get("start-time")).map(String::as_str),
                    initial.and_then(|p| p.get("end-time")).map(String::as_str),
                    metric.skip_format,
                    metric.trigger.as_ref(),
                );
                Shaped::entities(normalize::metric_sample(
                    key,
                    &target.app_id,
                    &metric.metric_name,
                    series,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ApiResponse;

    #[test]
    fn test_policy_not_found_message() {
        let not_found = DispatchError::Status {
            status: 404,
            body: "{}".to_string(),
        };
        assert_eq!(
            failure_message(&Operation::GetPolicy, &not_found),
            POLICY_NOT_FOUND_MESSAGE
        );
    }

    #[test]
    fn test_other_errors_use_generic_message() {
        let other_404 = DispatchError::Status {
            status: 404,
            body: "not here".to_string(),
        };
        assert_eq!(
            failure_message(&Operation::GetPolicy, &other_404),
            "Unable to fetch policy: 404 not here"
        );

        let empty_404 = DispatchError::Status {
            status: 404,
            body: "{}".to_string(),
        };
        assert_eq!(
            failure_message(&Operation::DetachPolicy, &empty_404),
            "Unable to update policy: 404 {}"
        );

        let server_error = DispatchError::Status {
            status: 500,
            body: "{}".to_string(),
        };
        assert_eq!(
            failure_message(&Operation::GetPolicy, &server_error),
            "Unable to fetch policy: 500 {}"
        );
    }

    #[test]
    fn test_transport_error_message() {
        let error = DispatchError::from(TransportError::RequestFailed {
            message: "connection refused".to_string(),
        });
        assert_eq!(
            failure_message(&Operation::Health, &error),
            "Unable to fetch health info: HTTP request failed: connection refused"
        );
    }

    #[test]
    fn test_routing_headers() {
        let headers = routing_headers("cnsi-1");
        assert_eq!(
            headers,
            vec![
                ("x-cap-api-host".to_string(), "autoscaler".to_string()),
                ("x-cap-passthrough".to_string(), "true".to_string()),
                ("x-cap-cnsi-list".to_string(), "cnsi-1".to_string()),
            ]
        );
        assert_eq!(common_prefix("v1"), "/pp/v1/autoscaler");
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = Outcome::Failure {
            message: "Unable to fetch metrics: 500 boom".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"outcome": "failure", "message": "Unable to fetch metrics: 500 boom"})
        );
        assert!(!outcome.is_success());

        let response = ApiResponse {
            status: 201,
            body: String::new(),
        };
        assert!(response.is_success());
    }
}
