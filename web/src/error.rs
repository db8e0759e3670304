use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use events::{Error as EventError, EventType};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// The submitted event could not be constructed.
    Event(EventError),
    /// The submitted event uses a type only the streaming transport may emit.
    ReservedEventType(EventType),
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Event(err) => Some(err),
            Error::ReservedEventType(_) => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        match self {
            Error::Event(err) => write!(fmt, "{err}"),
            Error::ReservedEventType(event_type) => {
                write!(fmt, "event type `{event_type}` is reserved for live connections")
            }
        }
    }
}

// Every rejection is the producer's fault: the request was understood but the event it
// describes cannot be built.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        warn!("Rejecting event: {self}");
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("UNPROCESSABLE ENTITY: {self}"),
        )
            .into_response()
    }
}

impl From<EventError> for Error {
    fn from(err: EventError) -> Self {
        Error::Event(err)
    }
}
