use serde::Serialize;
pub(crate) mod event_controller;
pub(crate) mod health_check_controller;

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status_code: u16, data: T) -> Self {
        Self {
            status_code,
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use events::kind::AnalyticsUpdated;
    use events::{EventBus, EventDraft, EventKind, Target};
    use serde_json::json;

    #[tokio::test]
    async fn test_serialize_api_response_with_some() {
        let response = ApiResponse::new(StatusCode::OK.into(), 23);
        let serialized = serde_json::to_string(&response).unwrap();

        // Serializing and then deserializing because the string output from serde_json::to_string is
        // non-deterministic as far as the order of the JSON keys. This ensures the test won't be flaky
        let deserialized_value: serde_json::Value = serde_json::from_str(&serialized).unwrap();
        let deserialized_expected_value: serde_json::Value =
            json!({"data": 23, "status_code": 200});
        assert_eq!(deserialized_value, deserialized_expected_value);
    }

    #[tokio::test]
    async fn test_serialize_api_response_with_event_envelope() {
        let event = EventBus::new()
            .seal(EventDraft::new(
                EventKind::AnalyticsUpdated(AnalyticsUpdated {
                    scope: Some("revenue".to_string()),
                }),
                Target::broadcast(),
            ))
            .unwrap();

        let value = serde_json::to_value(ApiResponse::new(StatusCode::CREATED.into(), &event)).unwrap();

        assert_eq!(value["status_code"], 201);
        assert_eq!(value["data"]["type"], "analytics:updated");
        assert_eq!(value["data"]["payload"]["scope"], "revenue");
        assert_eq!(value["data"]["eventId"], event.event_id().to_string());
    }
}
