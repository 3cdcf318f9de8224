//! Autoscaler client binary - runs one autoscaler operation and prints the outcome

use anyhow::{anyhow, bail, Context, Result};
use autoscaler_client::{
    params::TimeRange, Config, Dispatcher, HistoryQuery, MetricQuery, Operation,
    OperationRequest, Outcome, PaginationSnapshot, ParamSet, Target, TracingSink,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "autoscaler-client")]
#[command(about = "Issues autoscaler API requests and prints the normalized result")]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Application guid the operation targets
    #[arg(long, env)]
    app_id: String,

    /// Collection key for the normalized entities (defaults per operation)
    #[arg(long)]
    entity_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch autoscaler health info
    Health,

    /// Fetch, replace or detach the application's scaling policy
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Fetch the scaling rules of the policy, one entity per metric type
    Trigger {
        /// JSON query object attached to every rule
        #[arg(long, default_value = "{}", value_parser = parse_json)]
        query: Value,
    },

    /// Fetch scaling history events
    History {
        /// Start of the time window, epoch seconds
        #[arg(long, requires = "end")]
        start: Option<u64>,

        /// End of the time window, epoch seconds
        #[arg(long, requires = "start")]
        end: Option<u64>,

        /// Page to request
        #[arg(long)]
        page: Option<u32>,

        /// Extra query parameters (key=value)
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Store the whole page as a single entity
        #[arg(long)]
        normal_format: bool,
    },

    /// Fetch a metric series
    Metric {
        /// Path below the autoscaler prefix
        #[arg(long)]
        url: String,

        /// Metric name, e.g. memoryused
        #[arg(long)]
        metric_name: String,

        /// Window start in nanoseconds
        #[arg(long)]
        start_time: Option<String>,

        /// Window end in nanoseconds
        #[arg(long)]
        end_time: Option<String>,

        /// Extra query parameters (key=value)
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Leave the raw series unpadded
        #[arg(long)]
        skip_format: bool,

        /// JSON trigger (upper/lower rules) to overlay thresholds from
        #[arg(long, value_parser = parse_json)]
        trigger: Option<Value>,
    },
}

#[derive(Debug, Subcommand)]
enum PolicyAction {
    /// Fetch the current policy
    Get,
    /// Replace the policy with the one in a JSON file
    Update {
        #[arg(long)]
        file: PathBuf,
    },
    /// Detach (delete) the policy
    Detach,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::from_default_env();
    if cli.config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    info!(
        api_url = %cli.config.api_url,
        prefix = %cli.config.common_prefix(),
        endpoint_id = %cli.config.endpoint_id,
        "Starting autoscaler client"
    );

    let (operation, pagination) = build_operation(cli.command)?;
    let entity_key = cli
        .entity_key
        .unwrap_or_else(|| operation.default_entity_key().to_string());
    let request = OperationRequest::new(
        Target::new(cli.app_id, cli.config.endpoint_id.clone(), entity_key),
        operation,
    );

    let transport = cli.config.build_transport()?;
    let dispatcher = Dispatcher::new(transport, TracingSink, &cli.config.proxy_api_version);

    let outcome = dispatcher.dispatch(&request, pagination.as_ref()).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
    );

    match outcome {
        Outcome::Success { .. } => Ok(()),
        Outcome::Failure { message } => Err(anyhow!(message)),
    }
}

fn build_operation(command: Command) -> Result<(Operation, Option<PaginationSnapshot>)> {
    let operation = match command {
        Command::Health => Operation::Health,
        Command::Policy { action } => match action {
            PolicyAction::Get => Operation::GetPolicy,
            PolicyAction::Update { file } => {
                let contents = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read policy file {}", file.display()))?;
                let policy = serde_json::from_str(&contents)
                    .with_context(|| format!("Invalid policy JSON in {}", file.display()))?;
                Operation::UpdatePolicy { policy }
            }
            PolicyAction::Detach => Operation::DetachPolicy,
        },
        Command::Trigger { query } => Operation::GetTrigger { query },
        Command::History {
            start,
            end,
            page,
            params,
            normal_format,
        } => {
            let range = match (start, end) {
                (Some(start), Some(end)) => Some(TimeRange { start, end }),
                _ => None,
            };
            let pagination = page.map(|current_page| PaginationSnapshot {
                current_page,
                ..Default::default()
            });
            let operation = Operation::ScalingHistory(HistoryQuery {
                params: to_param_set(params),
                range,
                normal_format,
                ..Default::default()
            });
            return Ok((operation, pagination));
        }
        Command::Metric {
            url,
            metric_name,
            start_time,
            end_time,
            params,
            skip_format,
            trigger,
        } => {
            let mut initial = ParamSet::new();
            if let Some(start_time) = start_time {
                initial.insert("start-time".to_string(), start_time);
            }
            if let Some(end_time) = end_time {
                initial.insert("end-time".to_string(), end_time);
            }
            Operation::GetMetric(MetricQuery {
                relative_url: url,
                metric_name,
                initial_params: Some(initial),
                params: to_param_set(params),
                skip_format,
                trigger,
            })
        }
    };

    Ok((operation, None))
}

fn to_param_set(pairs: Vec<(String, String)>) -> Option<ParamSet> {
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.into_iter().collect())
    }
}

fn parse_key_val(s: &str) -> Result<(String, String)> {
    let Some((key, value)) = s.split_once('=') else {
        bail!("invalid key=value pair: {}", s);
    };
    Ok((key.to_string(), value.to_string()))
}

fn parse_json(s: &str) -> Result<Value> {
    serde_json::from_str(s).context("invalid JSON")
}
