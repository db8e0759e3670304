use anyhow::{Context, Result};
use eventsource_client::{self as es, Client};
use events::{Event, Role};
use futures_util::stream::{Stream, StreamExt};
use log::*;
use std::time::Duration;

use crate::bridge::Bridge;

/// Consecutive failures after which subscribers are told to fall back.
pub const DEFAULT_FALLBACK_AFTER: u32 = 3;

/// How long the stream may stay silent before the silence counts as a
/// failure. The server sends a heartbeat every 15s, so three have been missed.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(45);

/// Decodes the data field of one SSE frame into an event envelope.
pub fn decode_frame(data: &str) -> Result<Event> {
    serde_json::from_str(data).context("Failed to decode live frame")
}

/// Counts consecutive live channel failures and decides when to fall back.
///
/// Fallback is signalled once per outage: after it fires, further failures
/// stay quiet until a frame is decoded again.
#[derive(Debug)]
pub struct FailureTracker {
    fallback_after: u32,
    consecutive_failures: u32,
    fallen_back: bool,
}

impl FailureTracker {
    pub fn new(fallback_after: u32) -> Self {
        Self {
            fallback_after: fallback_after.max(1),
            consecutive_failures: 0,
            fallen_back: false,
        }
    }

    /// Records a failure; returns true when this one should trigger fallback.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if !self.fallen_back && self.consecutive_failures >= self.fallback_after {
            self.fallen_back = true;
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        if self.fallen_back {
            info!("Live channel recovered");
        }
        self.consecutive_failures = 0;
        self.fallen_back = false;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_fallen_back(&self) -> bool {
        self.fallen_back
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_AFTER)
    }
}

/// Where to connect and who to connect as.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub user_id: String,
    pub role: Option<Role>,
    pub user_header: String,
    pub role_header: String,
    pub fallback_after: u32,
    pub stale_after: Duration,
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_id: user_id.into(),
            role: None,
            user_header: "x-user-id".to_string(),
            role_header: "x-user-role".to_string(),
            fallback_after: DEFAULT_FALLBACK_AFTER,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    fn live_url(&self) -> String {
        format!("{}/live", self.base_url.trim_end_matches('/'))
    }
}

// What the pump cares about in one stream item.
#[derive(Debug)]
enum Frame {
    Data(String),
    Ignored,
    Failed(String),
}

/// Feeds a [`Bridge`] from the server's live stream.
pub struct LiveClient {
    options: ClientOptions,
    bridge: Bridge,
}

impl LiveClient {
    pub fn new(options: ClientOptions, bridge: Bridge) -> Self {
        Self { options, bridge }
    }

    /// Connects and dispatches frames until the stream ends for good.
    ///
    /// Reconnection with backoff is left to the SSE client; this loop only
    /// watches for failures and silence.
    pub async fn run(&self) -> Result<()> {
        let url = self.options.live_url();
        let mut builder = es::ClientBuilder::for_url(&url)
            .with_context(|| format!("Invalid live url {url}"))?
            .header(&self.options.user_header, &self.options.user_id)?
            .reconnect(
                es::ReconnectOptions::reconnect(true)
                    .retry_initial(true)
                    .delay(Duration::from_secs(1))
                    .backoff_factor(2)
                    .delay_max(Duration::from_secs(30))
                    .build(),
            );
        if let Some(role) = self.options.role {
            builder = builder.header(&self.options.role_header, &role.to_string())?;
        }
        let client = builder.build();

        info!("Connecting to {url} as user {}", self.options.user_id);

        let frames = client.stream().map(|item| match item {
            Ok(es::SSE::Event(event)) => Frame::Data(event.data),
            Ok(_) => Frame::Ignored,
            Err(e) => Frame::Failed(e.to_string()),
        });

        self.pump(frames).await;
        Ok(())
    }

    async fn pump<S>(&self, frames: S)
    where
        S: Stream<Item = Frame> + Unpin,
    {
        let mut frames = frames;
        let mut tracker = FailureTracker::new(self.options.fallback_after);

        loop {
            match tokio::time::timeout(self.options.stale_after, frames.next()).await {
                Ok(Some(Frame::Data(data))) => match decode_frame(&data) {
                    Ok(event) => {
                        tracker.record_success();
                        trace!("Received {} event {}", event.event_type(), event.event_id());
                        self.bridge.dispatch(&event);
                    }
                    Err(e) => warn!("Skipping undecodable frame: {e:#}"),
                },
                Ok(Some(Frame::Ignored)) => {}
                Ok(Some(Frame::Failed(e))) => {
                    warn!("Live stream error: {e}");
                    self.record_failure(&mut tracker);
                }
                Ok(None) => {
                    info!("Live stream ended");
                    return;
                }
                Err(_) => {
                    warn!(
                        "No live frame within {}s",
                        self.options.stale_after.as_secs()
                    );
                    self.record_failure(&mut tracker);
                }
            }
        }
    }

    fn record_failure(&self, tracker: &mut FailureTracker) {
        if tracker.record_failure() {
            warn!(
                "Live channel failed {} times in a row, falling back",
                tracker.consecutive_failures()
            );
            self.bridge.fallback();
        }
    }
}
