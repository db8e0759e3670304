use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::kind::{EventKind, EventType};
use crate::target::Target;

/// Process-unique identifier the bus assigns to every event it stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event as a producer describes it: what happened and who should see it.
///
/// Drafts carry no identity. The bus turns a draft into an [`Event`] by
/// assigning its id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub kind: EventKind,
    pub target: Target,
}

#[derive(Deserialize)]
struct RawDraft {
    #[serde(rename = "type")]
    type_tag: String,
    #[serde(default)]
    payload: Value,
    // An explicit null means "no target", same as leaving it out.
    #[serde(default)]
    target: Option<Target>,
}

impl EventDraft {
    pub fn new(kind: EventKind, target: Target) -> Self {
        Self { kind, target }
    }

    /// Builds a draft from an untyped `{ type, payload, target }` document,
    /// checking the payload against the shape its `type` requires.
    pub fn from_json(value: Value) -> Result<Self> {
        let raw: RawDraft = serde_json::from_value(value).map_err(Error::invalid_payload)?;
        let event_type: EventType = raw.type_tag.parse()?;

        let payload = match raw.payload {
            Value::Null => json!({}),
            payload => payload,
        };

        let kind: EventKind =
            serde_json::from_value(json!({ "type": event_type.as_str(), "payload": payload }))
                .map_err(Error::invalid_payload)?;

        Ok(Self {
            kind,
            target: raw.target.unwrap_or_default(),
        })
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}

/// The immutable envelope delivered to listeners and written to streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(flatten)]
    kind: EventKind,
    target: Target,
    event_id: EventId,
    /// Milliseconds since the Unix epoch.
    created_at: i64,
}

impl Event {
    pub(crate) fn stamp(draft: EventDraft, event_id: EventId, created_at: i64) -> Result<Self> {
        draft.kind.validate()?;
        Ok(Self {
            kind: draft.kind,
            target: draft.target,
            event_id,
            created_at,
        })
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::kind::{NotificationRefresh, ReviewAction};

    #[test]
    fn from_json_treats_a_null_target_as_missing() {
        let draft = EventDraft::from_json(json!({
            "type": "analytics:updated",
            "payload": {},
            "target": null
        }))
        .unwrap();

        assert_eq!(draft.target, Target::default());
        assert!(draft.target.is_dead());
    }

    #[test]
    fn from_json_accepts_a_well_formed_draft() {
        let draft = EventDraft::from_json(json!({
            "type": "review:updated",
            "payload": { "reviewId": "r1", "action": "created" },
            "target": { "roles": ["BARBER"] }
        }))
        .unwrap();

        match &draft.kind {
            EventKind::ReviewUpdated(payload) => {
                assert_eq!(payload.review_id, "r1");
                assert_eq!(payload.action, ReviewAction::Created);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(draft.target, Target::roles([crate::Role::Barber]));
    }

    #[test]
    fn from_json_rejects_unknown_types() {
        let err = EventDraft::from_json(json!({ "type": "promo:new", "payload": {} })).unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::UnknownType("promo:new".to_string()));
    }

    #[test]
    fn from_json_rejects_payloads_of_the_wrong_shape() {
        let err = EventDraft::from_json(json!({
            "type": "notification:new",
            "payload": { "unreadCount": 3 },
            "target": { "users": ["u1"] }
        }))
        .unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::InvalidPayload);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn from_json_treats_missing_payload_and_target_as_empty() {
        let draft = EventDraft::from_json(json!({ "type": "notification:refresh" })).unwrap();

        assert_eq!(
            draft.kind,
            EventKind::NotificationRefresh(NotificationRefresh::default())
        );
        assert!(draft.target.is_dead());
    }

    #[test]
    fn envelope_serializes_with_flat_type_and_payload() {
        let event = Event::stamp(
            EventDraft::new(
                EventKind::NotificationRefresh(NotificationRefresh {
                    reason: Some("bulk".to_string()),
                }),
                Target::broadcast(),
            ),
            EventId::new(),
            1_700_000_000_000,
        )
        .unwrap();

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "notification:refresh");
        assert_eq!(value["payload"], json!({ "reason": "bulk" }));
        assert_eq!(value["target"]["broadcast"], true);
        assert_eq!(value["eventId"], event.event_id().to_string());
        assert_eq!(value["createdAt"], 1_700_000_000_000_i64);

        let decoded: Event = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, event);
    }
}
