use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::target::UserId;

/// The closed set of event type tags as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    NotificationNew,
    NotificationRead,
    NotificationRefresh,
    AppointmentChanged,
    ReviewUpdated,
    AnalyticsUpdated,
    LiveStatus,
    LiveHeartbeat,
}

impl EventType {
    pub const ALL: [EventType; 8] = [
        EventType::NotificationNew,
        EventType::NotificationRead,
        EventType::NotificationRefresh,
        EventType::AppointmentChanged,
        EventType::ReviewUpdated,
        EventType::AnalyticsUpdated,
        EventType::LiveStatus,
        EventType::LiveHeartbeat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::NotificationNew => "notification:new",
            EventType::NotificationRead => "notification:read",
            EventType::NotificationRefresh => "notification:refresh",
            EventType::AppointmentChanged => "appointment:changed",
            EventType::ReviewUpdated => "review:updated",
            EventType::AnalyticsUpdated => "analytics:updated",
            EventType::LiveStatus => "live:status",
            EventType::LiveHeartbeat => "live:heartbeat",
        }
    }

    /// Kinds owned by the streaming transport itself rather than by producers.
    pub fn is_transport(&self) -> bool {
        matches!(self, EventType::LiveStatus | EventType::LiveHeartbeat)
    }
}

impl FromStr for EventType {
    type Err = Error;
    fn from_str(type_tag: &str) -> Result<EventType> {
        EventType::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == type_tag)
            .ok_or_else(|| Error::unknown_type(type_tag))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event's type together with its payload.
///
/// Each variant carries exactly the payload its type requires, so a producer
/// cannot publish a `notification:new` without a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EventKind {
    #[serde(rename = "notification:new")]
    NotificationNew(NotificationNew),
    #[serde(rename = "notification:read")]
    NotificationRead(NotificationRead),
    #[serde(rename = "notification:refresh")]
    NotificationRefresh(NotificationRefresh),
    #[serde(rename = "appointment:changed")]
    AppointmentChanged(AppointmentChanged),
    #[serde(rename = "review:updated")]
    ReviewUpdated(ReviewUpdated),
    #[serde(rename = "analytics:updated")]
    AnalyticsUpdated(AnalyticsUpdated),
    #[serde(rename = "live:status")]
    LiveStatus(LiveStatus),
    #[serde(rename = "live:heartbeat")]
    LiveHeartbeat(LiveHeartbeat),
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::NotificationNew(_) => EventType::NotificationNew,
            EventKind::NotificationRead(_) => EventType::NotificationRead,
            EventKind::NotificationRefresh(_) => EventType::NotificationRefresh,
            EventKind::AppointmentChanged(_) => EventType::AppointmentChanged,
            EventKind::ReviewUpdated(_) => EventType::ReviewUpdated,
            EventKind::AnalyticsUpdated(_) => EventType::AnalyticsUpdated,
            EventKind::LiveStatus(_) => EventType::LiveStatus,
            EventKind::LiveHeartbeat(_) => EventType::LiveHeartbeat,
        }
    }

    /// Checks the identifier fields that serde alone cannot enforce.
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            EventKind::NotificationNew(payload) => {
                require("notification.id", &payload.notification.id)
            }
            EventKind::NotificationRead(payload) => match &payload.notification_id {
                Some(notification_id) => require("notificationId", notification_id),
                None => Ok(()),
            },
            EventKind::AppointmentChanged(payload) => {
                require("appointmentId", &payload.appointment_id)
            }
            EventKind::ReviewUpdated(payload) => require("reviewId", &payload.review_id),
            EventKind::NotificationRefresh(_)
            | EventKind::AnalyticsUpdated(_)
            | EventKind::LiveStatus(_)
            | EventKind::LiveHeartbeat(_) => Ok(()),
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::missing_field(field))
    } else {
        Ok(())
    }
}

/// A user-facing notification as rendered in the notification bell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub read: bool,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationNew {
    pub notification: Notification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u32>,
}

/// A notification (or, without an id, all of them) was marked read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRead {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
    pub unread_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRefresh {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentChanged {
    pub appointment_id: String,
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barber_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Created,
    Updated,
    Deleted,
    Moderated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUpdated {
    pub review_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barber_id: Option<UserId>,
    pub action: ReviewAction,
}

/// Dashboards showing `scope` (or every dashboard, when absent) are stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsUpdated {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveState {
    Connected,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveStatus {
    pub status: LiveState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveHeartbeat {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}
