//! Application state notifications
//!
//! The dispatcher reports every request to a [`StateSink`]: one
//! `request_started` followed by exactly one of `request_succeeded` or
//! `request_failed`.

use crate::normalize::EntityMap;
use crate::operation::{RequestKind, Target};
use std::sync::Arc;
use tracing::{info, warn};

/// Receiver of request lifecycle notifications
pub trait StateSink: Send + Sync {
    fn request_started(&self, target: &Target, kind: RequestKind);

    fn request_succeeded(
        &self,
        target: &Target,
        data: &EntityMap,
        kind: RequestKind,
        total_results: Option<u64>,
        total_pages: Option<u64>,
    );

    fn request_failed(&self, target: &Target, message: &str, kind: RequestKind);
}

impl<S: StateSink + ?Sized> StateSink for Arc<S> {
    fn request_started(&self, target: &Target, kind: RequestKind) {
        (**self).request_started(target, kind)
    }

    fn request_succeeded(
        &self,
        target: &Target,
        data: &EntityMap,
        kind: RequestKind,
        total_results: Option<u64>,
        total_pages: Option<u64>,
    ) {
        (**self).request_succeeded(target, data, kind, total_results, total_pages)
    }

    fn request_failed(&self, target: &Target, message: &str, kind: RequestKind) {
        (**self).request_failed(target, message, kind)
    }
}

/// Sink that only logs notifications
pub struct TracingSink;

impl StateSink for TracingSink {
    fn request_started(&self, target: &Target, kind: RequestKind) {
        info!(
            app_id = %target.app_id,
            entity_key = %target.entity_key,
            kind = %kind,
            "Autoscaler request started"
        );
    }

    fn request_succeeded(
        &self,
        target: &Target,
        data: &EntityMap,
        kind: RequestKind,
        total_results: Option<u64>,
        total_pages: Option<u64>,
    ) {
        info!(
            app_id = %target.app_id,
            entity_key = %target.entity_key,
            kind = %kind,
            entities = data.result.len(),
            total_results = ?total_results,
            total_pages = ?total_pages,
            "Autoscaler request succeeded"
        );
    }

    fn request_failed(&self, target: &Target, message: &str, kind: RequestKind) {
        warn!(
            app_id = %target.app_id,
            entity_key = %target.entity_key,
            kind = %kind,
            error = %message,
            "Autoscaler request failed"
        );
    }
}
