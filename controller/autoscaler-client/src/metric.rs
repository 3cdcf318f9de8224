//! Metric series shaping
//!
//! The autoscaler metric endpoints return raw samples with nanosecond
//! timestamps. A [`MetricBuilder`] turns them into a chartable series.

use serde_json::{json, Value};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Shapes raw metric samples into the entity stored for a metric.
///
/// `skip_format` and `trigger` are passed through untouched from the
/// operation; their meaning is up to the implementation.
pub trait MetricBuilder: Send + Sync {
    fn build(
        &self,
        metric_name: &str,
        raw: &Value,
        start_time: Option<&str>,
        end_time: Option<&str>,
        skip_format: bool,
        trigger: Option<&Value>,
    ) -> Value;
}

/// Default builder producing a time-ordered series in epoch seconds
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesMetricBuilder;

impl MetricBuilder for SeriesMetricBuilder {
    fn build(
        &self,
        metric_name: &str,
        raw: &Value,
        start_time: Option<&str>,
        end_time: Option<&str>,
        skip_format: bool,
        trigger: Option<&Value>,
    ) -> Value {
        let resources = raw
            .get("resources")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut samples: Vec<(u64, f64)> = resources
            .iter()
            .filter_map(|r| {
                let timestamp = r.get("timestamp").and_then(as_u64)?;
                let value = r.get("value").and_then(as_f64)?;
                Some((timestamp / NANOS_PER_SECOND, value))
            })
            .collect();
        samples.sort_by_key(|(time, _)| *time);

        let unit = resources
            .iter()
            .find_map(|r| r.get("unit").and_then(Value::as_str))
            .unwrap_or_default();

        let start = start_time.and_then(parse_seconds);
        let end = end_time.and_then(parse_seconds);

        let latest = samples
            .last()
            .map(|(time, value)| json!({"time": time, "value": value}))
            .unwrap_or(Value::Null);

        let mut series: Vec<(u64, f64)> = samples.clone();
        if !skip_format {
            if let Some(start) = start {
                if series.first().map_or(true, |(time, _)| *time > start) {
                    series.insert(0, (start, 0.0));
                }
            }
            if let Some(end) = end {
                if series.last().map_or(true, |(time, _)| *time < end) {
                    series.push((end, 0.0));
                }
            }
        }

        let thresholds =
            trigger.map(|t| (threshold_values(t, "upper"), threshold_values(t, "lower")));

        let chart_max_value = samples
            .iter()
            .map(|(_, value)| *value)
            .chain(
                thresholds
                    .iter()
                    .flat_map(|(upper, lower)| upper.iter().chain(lower.iter()).copied()),
            )
            .fold(1.0_f64, f64::max);

        let mut shaped = json!({
            "metric_name": metric_name,
            "unit": unit,
            "latest": latest,
            "series": series
                .iter()
                .map(|(time, value)| json!({"time": time, "value": value}))
                .collect::<Vec<_>>(),
            "chart_max_value": chart_max_value,
            "start_time": start,
            "end_time": end,
        });

        if let Some((upper, lower)) = thresholds {
            shaped["thresholds"] = json!({"upper": upper, "lower": lower});
        }

        shaped
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_seconds(nanos: &str) -> Option<u64> {
    nanos.parse::<u64>().ok().map(|n| n / NANOS_PER_SECOND)
}

fn threshold_values(trigger: &Value, bound: &str) -> Vec<f64> {
    trigger
        .get(bound)
        .and_then(Value::as_array)
        .map(|rules| {
            rules
                .iter()
                .filter_map(|r| r.get("threshold").and_then(as_f64))
                .collect()
        })
        .unwrap_or_default()
}
