//! Server-Sent Events (SSE) infrastructure for real-time updates.
//!
//! This crate bridges authenticated browser connections to the event bus.
//! Every open connection owns exactly one bus listener and turns matching
//! events into `text/event-stream` frames.
//!
//! # Architecture
//!
//! - **One listener per connection**: On connect, a listener filtered by the
//!   connection's principal is subscribed to the bus. It only pushes into the
//!   connection's channel, so fan-out never waits on a slow client.
//! - **Dual-index registry**: O(1) lookups by connection id and by user id,
//!   used for stats and to close every stream on shutdown.
//! - **Local heartbeats**: Each connection emits its own `live:heartbeat`
//!   frame on a timer; heartbeats never go through the bus.
//! - **Ephemeral messages**: If a user is offline, they miss the event and see
//!   fresh data on next page load.
//!
//! # Connection Lifecycle
//!
//! 1. Frontend opens the stream via the `/live` endpoint
//! 2. Web layer resolves the principal (401 if there is none)
//! 3. `Manager::connect` registers the connection and subscribes it to the bus
//! 4. The stream starts with a `live:status` "connected" frame
//! 5. Matching bus events and periodic heartbeats follow
//! 6. On client disconnect or server shutdown the listener and registry entry
//!    are released exactly once
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry with dual-index architecture and type-safe ConnectionId
//! - `live`: The per-connection stream and its teardown
//! - `manager`: Opens connections and tracks them
//! - `message`: Wire framing of events

pub mod connection;
pub mod live;
pub mod manager;
pub mod message;

pub use live::LiveConnection;
pub use manager::{ConnectionStats, Manager};
