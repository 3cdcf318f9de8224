//! Scaling policy wire format conversion
//!
//! The autoscaler stores a policy as a flat `scaling_rules` array. Callers
//! work with rules grouped per metric type into `upper` and `lower` lists.

use serde_json::{json, Map, Value};
use std::cmp::Ordering;

const SCALING_RULES: &str = "scaling_rules";
const SCALING_RULES_MAP: &str = "scaling_rules_map";
const SCALING_RULES_FORM: &str = "scaling_rules_form";
const SCHEDULES: &str = "schedules";
const RECURRING_SCHEDULE: &str = "recurring_schedule";
const SPECIFIC_DATE: &str = "specific_date";

pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Converts policies between the wire format and the grouped format.
pub trait PolicyCodec: Send + Sync {
    /// Wire format (rule array) to grouped format (rule map)
    fn array_to_map(&self, policy: Value) -> Value;

    /// Grouped format (rule map) back to wire format (rule array)
    fn map_to_array(&self, policy: Value) -> Value;
}

/// Default codec grouping rules by `metric_type` and comparison operator
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalingRulesCodec;

impl PolicyCodec for ScalingRulesCodec {
    fn array_to_map(&self, policy: Value) -> Value {
        let mut policy = match policy {
            Value::Object(policy) => policy,
            other => return other,
        };

        policy.insert("enabled".to_string(), Value::Bool(true));

        let rules = match policy.remove(SCALING_RULES) {
            Some(Value::Array(rules)) => rules,
            _ => Vec::new(),
        };

        let mut rules_map = Map::new();
        for rule in &rules {
            let metric_type = rule
                .get("metric_type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let bound = if is_upper_bound(rule) { "upper" } else { "lower" };

            let entry = rules_map
                .entry(metric_type)
                .or_insert_with(|| json!({"upper": [], "lower": []}));
            if let Some(Value::Array(list)) = entry.get_mut(bound) {
                list.push(rule.clone());
            }
        }

        for grouped in rules_map.values_mut() {
            for bound in ["upper", "lower"] {
                if let Some(Value::Array(list)) = grouped.get_mut(bound) {
                    list.sort_by(threshold_descending);
                }
            }
        }

        policy.insert(SCALING_RULES_MAP.to_string(), Value::Object(rules_map));
        policy.insert(SCALING_RULES_FORM.to_string(), Value::Array(rules));

        if !policy.contains_key(SCHEDULES) {
            policy.insert(
                SCHEDULES.to_string(),
                json!({
                    "timezone": DEFAULT_TIMEZONE,
                    "recurring_schedule": [],
                    "specific_date": []
                }),
            );
        }

        Value::Object(policy)
    }

    fn map_to_array(&self, policy: Value) -> Value {
        let mut policy = match policy {
            Value::Object(policy) => policy,
            other => return other,
        };

        policy.remove("enabled");

        let form = policy.remove(SCALING_RULES_FORM);
        let rules_map = policy.remove(SCALING_RULES_MAP);
        let rules = match (form, rules_map) {
            (Some(Value::Array(form)), _) => form,
            (_, Some(Value::Object(rules_map))) => flatten_rules(rules_map),
            _ => Vec::new(),
        };
        policy.insert(SCALING_RULES.to_string(), Value::Array(rules));

        let drop_schedules = match policy.get_mut(SCHEDULES) {
            Some(Value::Object(schedules)) => {
                for list in [RECURRING_SCHEDULE, SPECIFIC_DATE] {
                    if is_empty_list(schedules.get(list)) {
                        schedules.remove(list);
                    }
                }
                !schedules.contains_key(RECURRING_SCHEDULE)
                    && !schedules.contains_key(SPECIFIC_DATE)
            }
            _ => false,
        };
        if drop_schedules {
            policy.remove(SCHEDULES);
        }

        Value::Object(policy)
    }
}

fn is_upper_bound(rule: &Value) -> bool {
    matches!(
        rule.get("operator").and_then(Value::as_str),
        Some(">") | Some(">=")
    )
}

fn threshold_descending(a: &Value, b: &Value) -> Ordering {
    let threshold = |rule: &Value| rule.get("threshold").and_then(Value::as_f64);
    match (threshold(a), threshold(b)) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

fn flatten_rules(rules_map: Map<String, Value>) -> Vec<Value> {
    let mut rules = Vec::new();
    for (_, mut grouped) in rules_map {
        for bound in ["upper", "lower"] {
            if let Some(Value::Array(list)) = grouped.get_mut(bound).map(Value::take) {
                rules.extend(list);
            }
        }
    }
    rules
}

fn is_empty_list(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Array(list)) => list.is_empty(),
        None => true,
        _ => false,
    }
}
