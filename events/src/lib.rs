//! Realtime event infrastructure for the barbershop platform.
//!
//! This crate provides the in-process event bus that carries domain events
//! (new notifications, appointment changes, review updates, ...) from the
//! business logic that produces them to the live connections that push them
//! to browsers.
//!
//! # Architecture
//!
//! - **EventKind**: Sum type of every event type, each variant carrying its
//!   own payload struct
//! - **Target / Principal**: Who an event is for, and who is asking
//! - **EventDraft / Event**: An event before and after the bus stamps it with
//!   an id and a timestamp
//! - **EventBus**: Synchronous fan-out to registered listeners
//!
//! This crate has no dependencies on the transport or web crates. Delivery is
//! best effort: the bus keeps no history, so a listener registered after a
//! publish never sees that event.
//!
//! # Example: Publishing an event
//!
//! ```rust,ignore
//! use events::{EventBus, EventDraft, EventKind, Target};
//! use events::kind::{AppointmentChanged, AppointmentStatus};
//!
//! let published = bus.publish(EventDraft::new(
//!     EventKind::AppointmentChanged(AppointmentChanged {
//!         appointment_id: appointment.id.clone(),
//!         status: AppointmentStatus::Confirmed,
//!         date: Some(appointment.starts_at),
//!         barber_id: Some(appointment.barber_id.clone()),
//!         user_id: Some(appointment.client_id.clone()),
//!     }),
//!     Target::users([appointment.client_id.clone(), appointment.barber_id.clone()]),
//! ))?;
//! ```

pub mod bus;
pub mod error;
pub mod event;
pub mod kind;
pub mod target;

pub use bus::{EventBus, ListenerError, Subscription};
pub use error::{Error, ErrorKind};
pub use event::{Event, EventDraft, EventId};
pub use kind::{EventKind, EventType};
pub use target::{matches, Principal, Role, Target, UserId};
