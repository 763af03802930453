use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::broadcast::Broadcaster;
use crate::error::Result;
use crate::ingest::messages::{parse_ingest, IngestEvent};
use crate::state::aggregator::{self, Applied};
use crate::state::StatusStore;
use crate::types::{now_ms, Alert, NarrativeMessage, OutboundMessage, SystemStatus};

/// What happened to an ingest document that decoded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted { kind: String },
    Ignored { kind: String },
}

/// Entry point for producer events: decode, fold into the status, fan out.
#[derive(Clone)]
pub struct IngestGateway {
    store: Arc<StatusStore>,
    broadcaster: Arc<Broadcaster>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl IngestGateway {
    pub fn new(
        store: Arc<StatusStore>,
        broadcaster: Arc<Broadcaster>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Self {
        Self { store, broadcaster, health, latency }
    }

    /// Handle one raw request body. Malformed input leaves the status untouched.
    pub fn handle_raw(&self, body: &[u8]) -> Result<IngestOutcome> {
        let started = Instant::now();
        let event = match parse_ingest(body) {
            Ok(event) => event,
            Err(e) => {
                self.health.inc_rejected();
                warn!("rejected ingest document: {e}");
                return Err(e);
            }
        };
        let outcome = self.ingest(event, now_ms());
        if let IngestOutcome::Accepted { kind } = &outcome {
            self.latency.record(kind, started.elapsed());
        }
        Ok(outcome)
    }

    /// Fold a decoded event into the status at time `now_ms` and broadcast
    /// the result. Kinds the relay does not handle change nothing.
    pub fn ingest(&self, event: IngestEvent, now_ms: u64) -> IngestOutcome {
        let kind = event.kind().to_string();
        debug!(kind = %kind, "monitoring data received");

        let accepted = self.store.update(|status| {
            let Some(applied) = fold(status, event, now_ms) else {
                return false;
            };
            *status = applied.status;
            status.last_update = now_ms;
            self.fan_out(status, applied.alerts, applied.narratives);
            true
        });

        if accepted {
            self.health.inc_accepted();
            IngestOutcome::Accepted { kind }
        } else {
            self.health.inc_ignored();
            info!(kind = %kind, "unknown monitoring data type, ignoring");
            IngestOutcome::Ignored { kind }
        }
    }

    /// Broadcasts discrete alert and narrative frames, then the rolled-up
    /// status. Runs under the store lock so frames leave in arrival order.
    fn fan_out(
        &self,
        status: &SystemStatus,
        alerts: Vec<Alert>,
        narratives: Vec<NarrativeMessage>,
    ) {
        let frames = alerts
            .into_iter()
            .map(OutboundMessage::Alert)
            .chain(narratives.into_iter().map(OutboundMessage::ClaudeMessage))
            .chain(std::iter::once(OutboundMessage::SystemStatus(status.clone())));

        for msg in frames {
            if let Err(e) = self.broadcaster.broadcast(&msg) {
                error!(kind = msg.kind(), "broadcast failed: {e}");
            }
        }
    }
}

/// `None` for kinds that carry nothing to fold.
fn fold(current: &SystemStatus, event: IngestEvent, now_ms: u64) -> Option<Applied> {
    let applied = match event {
        IngestEvent::Unknown(_) => return None,
        IngestEvent::SystemMetrics(delta) => aggregator::apply_metrics(current.clone(), delta),
        IngestEvent::ServiceStatus(services) => {
            aggregator::apply_services(current.clone(), services, now_ms)
        }
        IngestEvent::Alert(alert) => {
            info!(level = %alert.level, "alert: {}", alert.message);
            aggregator::apply_alert(current.clone(), alert, now_ms)
        }
        IngestEvent::LogEvent(log) => {
            info!("log event: {}", log.summary());
            aggregator::apply_passive(current.clone())
        }
        IngestEvent::ClaudeMessage(narrative) => {
            debug!("narrative: {}", narrative.message);
            let mut applied = aggregator::apply_passive(current.clone());
            applied.narratives.push(narrative);
            applied
        }
    };
    Some(applied)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
