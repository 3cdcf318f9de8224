//! Query parameter assembly
//!
//! Parameter sources are merged right-biased: a key present in a later
//! source replaces the value from an earlier one. Absent sources count as
//! empty. The scaling-history endpoint gets a few extra rewrites on top.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Query parameter set sent with a request
pub type ParamSet = BTreeMap<String, String>;

pub const RESULTS_PER_PAGE_PARAM: &str = "results-per-page";
pub const RESULTS_PER_PAGE_DEFAULT: u32 = 100;

const ORDER_DIRECTION_FIELD_PARAM: &str = "order-direction-field";
const ORDER_DIRECTION_PARAM: &str = "order-direction";
const ORDER_PARAM: &str = "order";
const START_TIME_PARAM: &str = "start-time";
const END_TIME_PARAM: &str = "end-time";

/// Pagination state for one collection, as held by the caller's store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationSnapshot {
    #[serde(default)]
    pub params: ParamSet,
    /// Normalized query filters
    #[serde(default)]
    pub q: Vec<String>,
    pub current_page: u32,
}

impl Default for PaginationSnapshot {
    fn default() -> Self {
        Self {
            params: ParamSet::new(),
            q: Vec::new(),
            current_page: 1,
        }
    }
}

impl PaginationSnapshot {
    /// Flatten the snapshot into query parameters: its own params, the
    /// joined `q` filters and the current `page`.
    pub fn to_params(&self) -> ParamSet {
        let mut params = self.params.clone();
        if !self.q.is_empty() {
            params.insert("q".to_string(), self.q.join(","));
        }
        params.insert("page".to_string(), self.current_page.to_string());
        params
    }
}

/// Time window in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: u64,
    pub end: u64,
}

/// Merge parameter sources, later sources overriding earlier ones.
pub fn merge_params<'a, I>(sources: I) -> ParamSet
where
    I: IntoIterator<Item = Option<&'a ParamSet>>,
{
    let mut merged = ParamSet::new();
    for source in sources.into_iter().flatten() {
        for (key, value) in source {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Parameters derived from the caller's pagination snapshot.
pub fn pagination_params(snapshot: Option<&PaginationSnapshot>) -> ParamSet {
    snapshot.map(PaginationSnapshot::to_params).unwrap_or_default()
}

/// Page currently selected in the snapshot, 1 when there is none.
pub fn page_number(snapshot: Option<&PaginationSnapshot>) -> u32 {
    snapshot.map(|s| s.current_page).unwrap_or(1)
}

/// Epoch seconds scaled to the nanosecond strings the event API expects.
pub fn nanosecond_string(seconds: u64) -> String {
    format!("{}000000000", seconds)
}

/// Rewrites applied to merged scaling-history params.
pub fn rewrite_history_params(params: &mut ParamSet) {
    params
        .entry(RESULTS_PER_PAGE_PARAM.to_string())
        .or_insert_with(|| RESULTS_PER_PAGE_DEFAULT.to_string());

    params.remove(ORDER_DIRECTION_FIELD_PARAM);

    if let Some(direction) = params.remove(ORDER_DIRECTION_PARAM) {
        params.insert(ORDER_PARAM.to_string(), direction);
    }
}

/// Full parameter set for a scaling-history request.
///
/// Stored pagination params sit between the initial params and the
/// operation's own params, so an explicit ordering or filter from the caller
/// wins over whatever the store last held.
pub fn history_params(
    initial: Option<&ParamSet>,
    snapshot: Option<&PaginationSnapshot>,
    params: Option<&ParamSet>,
    range: Option<&TimeRange>,
) -> ParamSet {
    let pagination = pagination_params(snapshot);
    let mut merged = merge_params([initial, Some(&pagination), params]);
    rewrite_history_params(&mut merged);

    if let Some(range) = range {
        merged.insert(START_TIME_PARAM.to_string(), nanosecond_string(range.start));
        merged.insert(END_TIME_PARAM.to_string(), nanosecond_string(range.end));
    }

    merged
}
