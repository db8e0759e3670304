use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::message;
use async_stream::stream;
use axum::response::sse::Event as SseEvent;
use chrono::Utc;
use events::kind::{LiveHeartbeat, LiveState, LiveStatus};
use events::{matches, Event, EventBus, EventDraft, EventKind, Principal, Subscription, Target};
use futures::{Stream, StreamExt};
use log::*;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Everything a connection holds on to. Dropping the lease releases the bus
/// listener and the registry entry, whichever way the connection ended.
struct ConnectionLease {
    connection_id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    subscription: Subscription,
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
        if self.registry.unregister(&self.connection_id) {
            debug!("Released live connection {}", self.connection_id.as_str());
        }
    }
}

enum Step {
    Deliver(Event),
    Heartbeat,
    Shutdown,
    Disconnected,
}

/// One authenticated client's live connection.
///
/// The bus listener is registered as soon as the connection is opened, so
/// events published before the stream is first polled are not lost.
pub struct LiveConnection {
    principal: Principal,
    bus: EventBus,
    receiver: UnboundedReceiver<Event>,
    shutdown: CancellationToken,
    heartbeat_interval: Duration,
    lease: ConnectionLease,
}

impl LiveConnection {
    pub(crate) fn open(
        bus: &EventBus,
        registry: &Arc<ConnectionRegistry>,
        principal: Principal,
        heartbeat_interval: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let connection_id = registry.register(principal.clone(), shutdown.clone());

        let recipient = principal.clone();
        let subscription = bus.subscribe(move |event| {
            if matches(event, &recipient) {
                // The receiver is only gone while the connection is being torn down.
                if sender.send(event.clone()).is_err() {
                    trace!("Dropping event {} for a closing connection", event.event_id());
                }
            }
            Ok(())
        });

        Self {
            principal,
            bus: bus.clone(),
            receiver,
            shutdown,
            heartbeat_interval,
            lease: ConnectionLease {
                connection_id,
                registry: Arc::clone(registry),
                subscription,
            },
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.lease.connection_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Turns the connection into the stream of events to send to the client.
    ///
    /// The first item is always a `live:status` "connected" frame. After that
    /// the stream carries matching bus events, plus a `live:heartbeat` every
    /// heartbeat interval. On server shutdown it emits a "closing" status and
    /// ends. Dropping the stream releases the connection.
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + 'static {
        let LiveConnection {
            principal,
            bus,
            mut receiver,
            shutdown,
            heartbeat_interval,
            lease,
        } = self;

        stream! {
            let _lease = lease;

            if let Some(event) = status_event(&bus, &principal, LiveState::Connected) {
                yield event;
            }

            let mut heartbeat = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let step = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => Step::Shutdown,
                    received = receiver.recv() => match received {
                        Some(event) => Step::Deliver(event),
                        None => Step::Disconnected,
                    },
                    _ = heartbeat.tick() => Step::Heartbeat,
                };

                match step {
                    Step::Deliver(event) => {
                        yield event;
                    }
                    Step::Heartbeat => {
                        if let Some(event) = heartbeat_event(&bus, &principal) {
                            yield event;
                        }
                    }
                    Step::Shutdown => {
                        if let Some(event) = status_event(&bus, &principal, LiveState::Closing) {
                            yield event;
                        }
                        break;
                    }
                    Step::Disconnected => break,
                }
            }

            debug!("Live stream for user {} finished", principal.user_id);
        }
    }

    /// [`Self::into_stream`] rendered as axum SSE events.
    pub fn into_sse_stream(self) -> impl Stream<Item = Result<SseEvent, Infallible>> + Send + 'static {
        self.into_stream().filter_map(|event| async move {
            match message::to_sse_event(&event) {
                Ok(sse_event) => Some(Ok(sse_event)),
                Err(e) => {
                    error!(
                        "Failed to serialize {} event {}: {e}",
                        event.event_type(),
                        event.event_id()
                    );
                    None
                }
            }
        })
    }
}

fn status_event(bus: &EventBus, principal: &Principal, status: LiveState) -> Option<Event> {
    local_event(bus, principal, EventKind::LiveStatus(LiveStatus { status }))
}

fn heartbeat_event(bus: &EventBus, principal: &Principal) -> Option<Event> {
    local_event(
        bus,
        principal,
        EventKind::LiveHeartbeat(LiveHeartbeat {
            timestamp: Utc::now().timestamp_millis(),
        }),
    )
}

// Frames addressed to this connection only. They get their identity from the
// bus but are never published through it.
fn local_event(bus: &EventBus, principal: &Principal, kind: EventKind) -> Option<Event> {
    let event_type = kind.event_type();
    match bus.seal(EventDraft::new(kind, Target::user(principal.user_id.clone()))) {
        Ok(event) => Some(event),
        Err(e) => {
            error!("Failed to build {event_type} frame: {e}");
            None
        }
    }
}
