use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::types::{AlertPayload, LogEvent, Metric, NarrativeMessage, Service};

/// Envelope shared by every ingest document. The payload stays untyped until
/// the kind is known.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    payload: serde_json::Value,
}

/// A decoded ingest document.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// Partial metric map, upserted into the status.
    SystemMetrics(BTreeMap<String, Metric>),
    /// Full service list, replacing the previous one.
    ServiceStatus(Vec<Service>),
    Alert(AlertPayload),
    /// Accepted in any shape and logged; does not affect status.
    LogEvent(LogEvent),
    /// Narrative text relayed verbatim to subscribers.
    ClaudeMessage(NarrativeMessage),
    /// A kind this relay does not handle. Acknowledged and dropped.
    Unknown(String),
}

impl IngestEvent {
    pub fn kind(&self) -> &str {
        match self {
            IngestEvent::SystemMetrics(_) => "system_metrics",
            IngestEvent::ServiceStatus(_) => "service_status",
            IngestEvent::Alert(_) => "alert",
            IngestEvent::LogEvent(_) => "log_event",
            IngestEvent::ClaudeMessage(_) => "claude_message",
            IngestEvent::Unknown(kind) => kind,
        }
    }
}

/// Decode a raw request body into an [`IngestEvent`].
///
/// Undecodable JSON, a missing `type`, or a payload that does not fit its
/// kind is an error. An unrecognized `type` is not: it decodes to
/// [`IngestEvent::Unknown`].
pub fn parse_ingest(raw: &[u8]) -> Result<IngestEvent> {
    let envelope: RawEnvelope = serde_json::from_slice(raw)?;
    let kind = envelope
        .kind
        .ok_or_else(|| AppError::InvalidPayload("missing \"type\" field".to_string()))?;
    expand_envelope(kind, envelope.payload)
}

fn expand_envelope(kind: String, payload: serde_json::Value) -> Result<IngestEvent> {
    let event = match kind.as_str() {
        "system_metrics" => IngestEvent::SystemMetrics(typed(&kind, payload)?),
        "service_status" => IngestEvent::ServiceStatus(typed(&kind, payload)?),
        "alert" => IngestEvent::Alert(typed(&kind, payload)?),
        "log_event" => IngestEvent::LogEvent(LogEvent { body: payload }),
        "claude_message" => IngestEvent::ClaudeMessage(typed(&kind, payload)?),
        _ => IngestEvent::Unknown(kind),
    };
    Ok(event)
}

fn typed<T: serde::de::DeserializeOwned>(kind: &str, payload: serde_json::Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| AppError::InvalidPayload(format!("{kind} payload: {e}")))
}
