use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Rolled-up system health shown to every viewer.
///
/// `Unknown` is set only by the staleness check; it is never the result of
/// comparing severities and is cleared by the next accepted ingest event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Healthy,
    Warning,
    Critical,
    Unknown,
}

impl Overall {
    /// Severity rank used when folding inputs: healthy(0) < warning(1) < critical(2).
    fn rank(self) -> u8 {
        match self {
            Overall::Healthy => 0,
            Overall::Warning => 1,
            Overall::Critical | Overall::Unknown => 2,
        }
    }

    /// The worse of two severities. Only meaningful for healthy/warning/critical.
    pub fn worst(self, other: Overall) -> Overall {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for Overall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Overall::Healthy => "healthy",
            Overall::Warning => "warning",
            Overall::Critical => "critical",
            Overall::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Metrics and services
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    Healthy,
    Warning,
    Critical,
    /// Producers report hard failures as `error`; ranks with `critical`.
    Error,
}

impl MetricStatus {
    pub fn severity(self) -> Overall {
        match self {
            MetricStatus::Healthy => Overall::Healthy,
            MetricStatus::Warning => Overall::Warning,
            MetricStatus::Critical | MetricStatus::Error => Overall::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Human-readable value, e.g. "42%" or "1.2 GB".
    #[serde(default)]
    pub display: String,
    pub status: MetricStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Healthy,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub status: ServiceState,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Producer-chosen severity. Levels other than the three known ones are
/// kept as sent; only `critical` changes how an alert is handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
    Other(String),
}

impl AlertLevel {
    pub fn as_str(&self) -> &str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
            AlertLevel::Other(s) => s,
        }
    }
}

impl From<String> for AlertLevel {
    fn from(s: String) -> Self {
        match s.as_str() {
            "info" => AlertLevel::Info,
            "warning" => AlertLevel::Warning,
            "critical" => AlertLevel::Critical,
            _ => AlertLevel::Other(s),
        }
    }
}

impl From<AlertLevel> for String {
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert as submitted by a producer (or synthesized for a failed service).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub level: AlertLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Milliseconds since the Unix epoch. Defaults to receipt time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// Any other producer fields (`action`, ...), relayed untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Alert as retained in the status ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub level: AlertLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub timestamp: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// SystemStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub overall: Overall,
    /// Milliseconds since the Unix epoch of the last accepted ingest event.
    pub last_update: u64,
    pub metrics: BTreeMap<String, Metric>,
    pub services: Vec<Service>,
    /// Newest first.
    pub alerts: Vec<Alert>,
}

impl SystemStatus {
    pub fn new(now_ms: u64) -> Self {
        Self {
            overall: Overall::Healthy,
            last_update: now_ms,
            metrics: BTreeMap::new(),
            services: Vec::new(),
            alerts: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Narrative text
// ---------------------------------------------------------------------------

/// One-line human-readable summary for the dashboard's narrative channel.
/// Fields beyond `message` are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeMessage {
    pub message: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NarrativeMessage {
    /// Narrative emitted automatically whenever a critical alert is recorded.
    pub fn for_critical_alert(alert_message: &str) -> Self {
        let mut extra = serde_json::Map::new();
        extra.insert("urgency".to_string(), serde_json::Value::from("critical"));
        Self {
            message: format!("🚨 CRITICAL: {alert_message} - Investigating immediately."),
            extra,
        }
    }
}

/// A producer log line. The payload is kept exactly as sent; it never
/// affects status, so any JSON shape is accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEvent {
    pub body: serde_json::Value,
}

impl LogEvent {
    /// Best-effort one-line text: the `message` field when it is a string,
    /// a bare string payload, otherwise the compact JSON.
    pub fn summary(&self) -> String {
        match &self.body {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => match map.get("message") {
                Some(serde_json::Value::String(s)) => s.clone(),
                _ => self.body.to_string(),
            },
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound frames
// ---------------------------------------------------------------------------

/// Frames fanned out to every subscriber, encoded as `{"type": .., "payload": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum OutboundMessage {
    SystemStatus(SystemStatus),
    Alert(Alert),
    ClaudeMessage(NarrativeMessage),
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::SystemStatus(_) => "system_status",
            OutboundMessage::Alert(_) => "alert",
            OutboundMessage::ClaudeMessage(_) => "claude_message",
        }
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
