//! Autoscaler client - API integration layer for an application autoscaler
//!
//! Builds requests for the autoscaler endpoints reached through the dashboard
//! proxy, normalizes their responses into a flat entity map, and reports
//! every request's lifecycle to a pluggable state sink.

pub mod config;
pub mod dispatch;
pub mod metric;
pub mod normalize;
pub mod operation;
pub mod params;
pub mod policy;
pub mod sink;
pub mod transport;

pub use config::Config;
pub use dispatch::{DispatchError, Dispatcher, Outcome, POLICY_NOT_FOUND_MESSAGE};
pub use metric::{MetricBuilder, SeriesMetricBuilder};
pub use normalize::{EntityMap, NormalizedEntity};
pub use operation::{HistoryQuery, MetricQuery, Operation, OperationRequest, RequestKind, Target};
pub use params::{PaginationSnapshot, ParamSet, TimeRange};
pub use policy::{PolicyCodec, ScalingRulesCodec};
pub use sink::{StateSink, TracingSink};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport, TransportError};
