//! Consumer side of the live update channel.
//!
//! [`Bridge`] is a plain callback registry: UI or service code subscribes to
//! the event types it cares about and gets called as matching events arrive.
//! [`LiveClient`] feeds a bridge from the server's `GET /live` stream and
//! tells it to fall back when the stream cannot be kept alive.

pub mod bridge;
pub mod transport;

pub use bridge::{
    Bridge, BridgeSubscription, EventFilter, Handler, SubscribeOptions, DEFAULT_COALESCE_WINDOW,
};
pub use transport::{decode_frame, ClientOptions, FailureTracker, LiveClient};
