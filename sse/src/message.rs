use axum::response::sse::Event as SseEvent;
use events::Event;

/// `Cache-Control` value for live streams; proxies must neither cache nor
/// rewrite the stream.
pub const CACHE_CONTROL: &str = "no-cache, no-transform";

/// Serializes the full envelope (`type`, `payload`, `target`, `eventId`,
/// `createdAt`) as one line of JSON.
pub fn encode_json(event: &Event) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}

/// Renders `event` as a text/event-stream frame: `data: <JSON>\n\n`.
pub fn encode_frame(event: &Event) -> Result<String, serde_json::Error> {
    Ok(format!("data: {}\n\n", encode_json(event)?))
}

/// Wraps `event` in an axum SSE event carrying only a `data` field, which
/// axum writes out exactly like [`encode_frame`].
pub fn to_sse_event(event: &Event) -> Result<SseEvent, serde_json::Error> {
    Ok(SseEvent::default().data(encode_json(event)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::kind::{LiveState, LiveStatus};
    use events::{EventBus, EventDraft, EventKind, Target};

    #[test]
    fn frame_is_a_single_data_line_with_the_whole_envelope() {
        let bus = EventBus::new();
        let event = bus
            .seal(EventDraft::new(
                EventKind::LiveStatus(LiveStatus {
                    status: LiveState::Connected,
                }),
                Target::user("u1"),
            ))
            .unwrap();

        let frame = encode_frame(&event).unwrap();

        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        assert_eq!(frame.matches('\n').count(), 2);

        let json: serde_json::Value =
            serde_json::from_str(frame.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(json["type"], "live:status");
        assert_eq!(json["payload"]["status"], "connected");
        assert_eq!(json["target"]["users"][0], "u1");
        assert_eq!(json["eventId"], event.event_id().to_string());
        assert_eq!(json["createdAt"], event.created_at());
    }
}
