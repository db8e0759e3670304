//! Error types for the `events` crate.
//!
//! Follows the same pattern as the other layers: a root `Error` struct that
//! carries an `error_kind` plus an optional `source` for error chaining.
//! Every kind here is a construction error, raised when an event cannot be
//! built from what a producer handed in.
use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// The ways an event can fail to be constructed.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// The `type` tag is not one of the known event kinds.
    UnknownType(String),
    /// The payload does not have the fixed shape required by its `type`.
    InvalidPayload,
    /// A required identifier field in the payload is empty.
    MissingField(&'static str),
}

impl Error {
    pub fn unknown_type(type_tag: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::UnknownType(type_tag.into()),
        }
    }

    pub fn invalid_payload(source: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(source)),
            error_kind: ErrorKind::InvalidPayload,
        }
    }

    pub fn missing_field(field: &'static str) -> Self {
        Error {
            source: None,
            error_kind: ErrorKind::MissingField(field),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::UnknownType(type_tag) => write!(f, "unknown event type `{type_tag}`"),
            ErrorKind::InvalidPayload => match &self.source {
                Some(source) => write!(f, "payload does not match event type: {source}"),
                None => write!(f, "payload does not match event type"),
            },
            ErrorKind::MissingField(field) => write!(f, "required field `{field}` is empty"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
