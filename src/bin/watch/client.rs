use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use mon_relay::types::{AlertLevel, OutboundMessage};

pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3001/ws";

/// Attempt N waits N × this before reconnecting.
pub const RECONNECT_BASE_DELAY_MS: u64 = 5_000;

/// Consecutive failed attempts before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("gave up after {0} reconnect attempts")]
    GaveUp(u32),
}

/// Linear backoff: attempt 1 waits `base`, attempt 2 waits `2 × base`, ...
pub fn reconnect_delay(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(attempt)
}

/// One-line summary of a relay frame, for the terminal.
pub fn describe(msg: &OutboundMessage) -> String {
    match msg {
        OutboundMessage::SystemStatus(s) => format!(
            "status {} | metrics={} services={} alerts={} | last_update={}",
            s.overall,
            s.metrics.len(),
            s.services.len(),
            s.alerts.len(),
            s.last_update,
        ),
        OutboundMessage::Alert(a) => match &a.service {
            Some(service) => format!("alert [{}] {} ({service})", a.level, a.message),
            None => format!("alert [{}] {}", a.level, a.message),
        },
        OutboundMessage::ClaudeMessage(m) => format!("narrative: {}", m.message),
    }
}

/// Subscribes to a relay and logs every frame, reconnecting on loss.
pub struct RelayWatcher {
    url: String,
    base_delay: Duration,
    max_attempts: u32,
    frames_received: u64,
}

impl RelayWatcher {
    pub fn new(url: String) -> Self {
        Self {
            url,
            base_delay: Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            max_attempts: MAX_RECONNECT_ATTEMPTS,
            frames_received: 0,
        }
    }

    /// Overrides the reconnect schedule.
    pub fn with_backoff(mut self, base_delay: Duration, max_attempts: u32) -> Self {
        self.base_delay = base_delay;
        self.max_attempts = max_attempts;
        self
    }

    pub async fn run(mut self) -> Result<(), WatchError> {
        let mut attempts = 0u32;

        loop {
            info!("connecting to relay at {}", self.url);
            match connect_async(self.url.as_str()).await {
                Ok((ws_stream, _)) => {
                    info!("connected to relay");
                    attempts = 0;
                    match self.stream_frames(ws_stream).await {
                        Ok(()) => info!("relay closed the connection"),
                        Err(e) => error!("relay connection error: {e}"),
                    }
                }
                Err(e) => error!("relay connect failed: {e}"),
            }

            if attempts >= self.max_attempts {
                return Err(WatchError::GaveUp(attempts));
            }
            attempts += 1;
            let delay = reconnect_delay(attempts, self.base_delay);
            warn!(attempt = attempts, "reconnecting in {}ms", delay.as_millis());
            tokio::time::sleep(delay).await;
        }
    }

    async fn stream_frames(
        &mut self,
        ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ) -> Result<(), WatchError> {
        let (mut write, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => self.handle_frame(&text),
                Message::Ping(data) => write.send(Message::Pong(data)).await?,
                Message::Close(_) => return Ok(()),
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_frame(&mut self, text: &str) {
        self.frames_received += 1;
        match serde_json::from_str::<OutboundMessage>(text) {
            Ok(msg) => {
                let line = describe(&msg);
                match msg {
                    OutboundMessage::Alert(a) if a.level == AlertLevel::Critical => warn!("{line}"),
                    _ => info!("{line}"),
                }
            }
            Err(e) => {
                let sample: String = text.chars().take(200).collect();
                debug!(frames = self.frames_received, "unrecognized frame ({e}): {sample}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mon_relay::types::{Alert, NarrativeMessage, Overall, SystemStatus};
    use tokio::net::TcpListener;

    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}/ws")
    }

    #[tokio::test]
    async fn gives_up_after_max_consecutive_failures() {
        let url = closed_port_url().await;
        let watcher = RelayWatcher::new(url).with_backoff(Duration::from_millis(1), 3);

        let result = tokio::time::timeout(Duration::from_secs(10), watcher.run())
            .await
            .expect("watcher gives up in time");

        assert!(matches!(result, Err(WatchError::GaveUp(3))), "got {result:?}");
    }

    #[tokio::test]
    async fn successful_connect_resets_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());

        // Accept three sessions and close each immediately, then go away.
        let relay = tokio::spawn(async move {
            let mut sessions = 0u32;
            while sessions < 3 {
                let (stream, _) = listener.accept().await.unwrap();
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                drop(ws);
                sessions += 1;
            }
            sessions
        });

        // With a budget of one retry, only the reset lets the watcher reach
        // the third session.
        let watcher = RelayWatcher::new(url).with_backoff(Duration::from_millis(1), 1);
        let result = tokio::time::timeout(Duration::from_secs(10), watcher.run())
            .await
            .expect("watcher gives up in time");

        assert!(matches!(result, Err(WatchError::GaveUp(1))), "got {result:?}");
        let sessions = tokio::time::timeout(Duration::from_secs(2), relay)
            .await
            .expect("relay saw every session")
            .unwrap();
        assert_eq!(sessions, 3);
    }

    #[test]
    fn backoff_grows_linearly() {
        let base = Duration::from_millis(RECONNECT_BASE_DELAY_MS);
        assert_eq!(reconnect_delay(1, base), Duration::from_secs(5));
        assert_eq!(reconnect_delay(2, base), Duration::from_secs(10));
        assert_eq!(reconnect_delay(5, base), Duration::from_secs(25));
    }

    #[test]
    fn describes_status_frames() {
        let mut status = SystemStatus::new(42);
        status.overall = Overall::Unknown;
        let line = describe(&OutboundMessage::SystemStatus(status));
        assert_eq!(line, "status unknown | metrics=0 services=0 alerts=0 | last_update=42");
    }

    #[test]
    fn describes_alert_with_service() {
        let alert = Alert {
            id: 1,
            level: AlertLevel::Critical,
            message: "Service db is down and requires immediate attention.".to_string(),
            service: Some("db".to_string()),
            timestamp: 1,
            extra: Default::default(),
        };
        let line = describe(&OutboundMessage::Alert(alert));
        assert!(line.starts_with("alert [critical] Service db is down"));
        assert!(line.ends_with("(db)"));
    }

    #[test]
    fn describes_narrative() {
        let msg = NarrativeMessage { message: "All systems nominal.".to_string(), extra: Default::default() };
        assert_eq!(describe(&OutboundMessage::ClaudeMessage(msg)), "narrative: All systems nominal.");
    }
}
