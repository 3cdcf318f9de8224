//! Response normalization into a flat entity map
//!
//! Every shaping mode writes into a single collection bucket and records the
//! ids it touched in `result`. Ids are deduplicated and keep the order in
//! which they were first written.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// A stored entity plus its bookkeeping metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEntity {
    pub entity: Value,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Entities keyed by collection then id, plus the ids written by one call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMap {
    pub entities: BTreeMap<String, BTreeMap<String, NormalizedEntity>>,
    pub result: Vec<String>,
}

impl EntityMap {
    /// Empty map with an empty bucket for `collection`
    pub fn new(collection: &str) -> Self {
        let mut entities = BTreeMap::new();
        entities.insert(collection.to_string(), BTreeMap::new());
        Self {
            entities,
            result: Vec::new(),
        }
    }

    /// Store an entity, overwriting any earlier entry with the same id.
    pub fn insert(
        &mut self,
        collection: &str,
        id: impl Into<String>,
        entity: Value,
        metadata: BTreeMap<String, String>,
    ) {
        let id = id.into();
        let bucket = self.entities.entry(collection.to_string()).or_default();
        let previous = bucket.insert(id.clone(), NormalizedEntity { entity, metadata });
        if previous.is_none() {
            self.result.push(id);
        }
    }

    pub fn bucket(&self, collection: &str) -> Option<&BTreeMap<String, NormalizedEntity>> {
        self.entities.get(collection)
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<&NormalizedEntity> {
        self.bucket(collection).and_then(|bucket| bucket.get(id))
    }
}

/// Wrap the whole body as one entity keyed by the resource id.
pub fn direct(collection: &str, resource_id: &str, body: Value) -> EntityMap {
    let mut mapped = EntityMap::new(collection);
    mapped.insert(collection, resource_id, body, BTreeMap::new());
    mapped
}

/// One entity per item of `resources`, keyed by the item's `timestamp`.
pub fn event_list(collection: &str, body: Value) -> EntityMap {
    let mut mapped = EntityMap::new(collection);

    let resources = match body {
        Value::Object(mut object) => object.remove("resources"),
        _ => None,
    };
    let Some(Value::Array(items)) = resources else {
        return mapped;
    };

    for item in items {
        let Some(timestamp) = item.get("timestamp").and_then(timestamp_key) else {
            warn!("Skipping scaling event without a timestamp");
            continue;
        };

        let metadata = ["created_at", "guid", "updated_at"]
            .into_iter()
            .map(|field| (field.to_string(), timestamp.clone()))
            .collect();

        mapped.insert(collection, timestamp, item, metadata);
    }

    mapped
}

/// One entity per metric type of `scaling_rules_map`, each carrying the
/// caller's query under `query`.
pub fn trigger_map(collection: &str, body: Value, query: &Value) -> EntityMap {
    let mut mapped = EntityMap::new(collection);

    let rules = match body {
        Value::Object(mut object) => object.remove("scaling_rules_map"),
        _ => None,
    };
    let Some(Value::Object(rules)) = rules else {
        return mapped;
    };

    for (metric_type, mut rule) in rules {
        if let Value::Object(fields) = &mut rule {
            fields.insert("query".to_string(), query.clone());
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("guid".to_string(), metric_type.clone());

        mapped.insert(collection, metric_type, rule, metadata);
    }

    mapped
}

/// Id under which a metric series for a resource is stored.
pub fn metric_id(resource_id: &str, metric_name: &str) -> String {
    format!("{}-{}", resource_id, metric_name)
}

/// Store a shaped metric series under `{resource_id}-{metric_name}`.
pub fn metric_sample(
    collection: &str,
    resource_id: &str,
    metric_name: &str,
    series: Value,
) -> EntityMap {
    let mut mapped = EntityMap::new(collection);
    mapped.insert(
        collection,
        metric_id(resource_id, metric_name),
        series,
        BTreeMap::new(),
    );
    mapped
}

fn timestamp_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
