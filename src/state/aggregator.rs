//! Pure folds from inbound monitoring events into the next `SystemStatus`.
//!
//! Nothing here touches the clock or any shared state: callers pass `now_ms`
//! and receive the new snapshot together with the side-channel frames
//! (alerts, narrative text) the event generated.

use std::collections::BTreeMap;

use crate::config::MAX_ALERTS;
use crate::types::{
    Alert, AlertLevel, AlertPayload, Metric, NarrativeMessage, Overall, Service, ServiceState,
    SystemStatus,
};

/// Result of folding one event into the status.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub status: SystemStatus,
    /// Alerts recorded by this event, in the order they were inserted.
    pub alerts: Vec<Alert>,
    /// Narrative lines to fan out alongside the status update.
    pub narratives: Vec<NarrativeMessage>,
}

impl Applied {
    fn unchanged(status: SystemStatus) -> Self {
        Self { status, alerts: Vec::new(), narratives: Vec::new() }
    }
}

/// Upserts `delta` into the metric map and recomputes `overall`.
pub fn apply_metrics(current: SystemStatus, delta: BTreeMap<String, Metric>) -> Applied {
    let mut status = current;
    status.metrics.extend(delta);
    status.overall = recompute_overall(&status);
    Applied::unchanged(status)
}

/// Replaces the service list wholesale. Every service in `error` raises a
/// critical alert naming it.
pub fn apply_services(current: SystemStatus, services: Vec<Service>, now_ms: u64) -> Applied {
    let failed: Vec<String> = services
        .iter()
        .filter(|s| s.status == ServiceState::Error)
        .map(|s| s.name.clone())
        .collect();

    let mut status = current;
    status.services = services;

    let mut applied = Applied::unchanged(status);
    for name in failed {
        let alert = AlertPayload {
            level: AlertLevel::Critical,
            message: format!("Service {name} is down and requires immediate attention."),
            service: Some(name),
            timestamp: Some(now_ms),
            extra: serde_json::Map::new(),
        };
        applied = fold_alert(applied, alert, now_ms);
    }
    applied.status.overall = recompute_overall(&applied.status);
    applied
}

/// Prepends `alert` to the ring and trims it to `MAX_ALERTS`.
pub fn apply_alert(current: SystemStatus, alert: AlertPayload, now_ms: u64) -> Applied {
    let mut applied = fold_alert(Applied::unchanged(current), alert, now_ms);
    applied.status.overall = recompute_overall(&applied.status);
    applied
}

/// Events that carry no status input still count as a real update: a stale
/// `unknown` is replaced by the recomputed severity.
pub fn apply_passive(current: SystemStatus) -> Applied {
    let mut status = current;
    status.overall = recompute_overall(&status);
    Applied::unchanged(status)
}

fn fold_alert(mut applied: Applied, alert: AlertPayload, now_ms: u64) -> Applied {
    // Ids are millisecond timestamps, bumped past the newest id so that
    // alerts recorded within the same millisecond stay distinct.
    let id = match applied.status.alerts.first() {
        Some(newest) => now_ms.max(newest.id + 1),
        None => now_ms,
    };
    let mut extra = alert.extra;
    // The relay owns the id.
    extra.remove("id");
    let stored = Alert {
        id,
        level: alert.level,
        message: alert.message,
        service: alert.service,
        timestamp: alert.timestamp.unwrap_or(now_ms),
        extra,
    };

    if stored.level == AlertLevel::Critical {
        applied.narratives.push(NarrativeMessage::for_critical_alert(&stored.message));
    }

    applied.status.alerts.insert(0, stored.clone());
    applied.status.alerts.truncate(MAX_ALERTS);
    applied.alerts.push(stored);
    applied
}

/// Worst severity across every metric status and the service list.
/// A failed service forces `critical`. Never returns `Unknown`.
pub fn recompute_overall(status: &SystemStatus) -> Overall {
    let worst_metric = status
        .metrics
        .values()
        .map(|m| m.status.severity())
        .fold(Overall::Healthy, Overall::worst);

    if status.services.iter().any(|s| s.status == ServiceState::Error) {
        worst_metric.worst(Overall::Critical)
    } else {
        worst_metric
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
