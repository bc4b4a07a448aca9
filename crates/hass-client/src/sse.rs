//! Incremental `text/event-stream` parsing for the alert stream.

use hass_integrity::PushPayload;

/// Event name the server uses for push payloads
pub const ALERT_EVENT: &str = "alert";

/// One dispatched server-sent event
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Feeds on raw body chunks and yields complete events. Chunks may split
/// lines or multi-byte characters anywhere.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.line(line) {
                events.push(event);
            }
        }
        events
    }

    fn line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        // Comment lines carry keep-alives
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.id.clone(),
        })
    }
}

/// Decode an alert event; other event names are ignored.
pub fn decode_alert(event: &SseEvent) -> Option<Result<PushPayload, serde_json::Error>> {
    let name = event.event.as_deref().unwrap_or("message");
    (name == ALERT_EVENT).then(|| serde_json::from_str(&event.data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hass_integrity::NotificationType;

    #[test]
    fn test_events_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: alert\nda").is_empty());
        assert!(parser.feed(b"ta: {\"title\":\"Critical vitals\",").is_empty());
        let events = parser.feed(b"\"body\":\"SpO2 88%\",\"notification_type\":\"emergency_alert\"}\n\n");
        assert_eq!(events.len(), 1);

        let payload = decode_alert(&events[0]).unwrap().unwrap();
        assert_eq!(payload.title, "Critical vitals");
        assert_eq!(payload.notification_type, NotificationType::EmergencyAlert);
    }

    #[test]
    fn test_keep_alive_and_crlf() {
        let mut parser = SseParser::new();
        let events = parser.feed(b":\r\n\r\nevent: alert\r\ndata: {}\r\n\r\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: Some("alert".to_string()),
                data: "{}".to_string(),
                id: None,
            }]
        );
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.feed(b"data: one\ndata: two\n\n");
        assert_eq!(events[0].data, "one\ntwo");
        assert!(decode_alert(&events[0]).is_none());
    }

    #[test]
    fn test_multibyte_character_split() {
        let text = "event: alert\ndata: {\"title\":\"SpO₂ low\",\"body\":\"88\"}\n\n".as_bytes();
        let split = text.iter().position(|b| *b > 0x7f).unwrap() + 1;
        let mut parser = SseParser::new();
        assert!(parser.feed(&text[..split]).is_empty());
        let events = parser.feed(&text[split..]);
        let payload = decode_alert(&events[0]).unwrap().unwrap();
        assert_eq!(payload.title, "SpO₂ low");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        const STREAM: &str = ": ping\n\nevent: alert\nid: 7\ndata: {\"title\":\"Bed A-1\",\"body\":\"Réservé\"}\n\n\
                              event: alert\r\ndata: first\r\ndata: second\r\n\r\n";

        proptest! {
            #[test]
            fn chunk_boundaries_do_not_change_events(cuts in proptest::collection::vec(0usize..STREAM.len(), 0..8)) {
                let bytes = STREAM.as_bytes();
                let expected = SseParser::new().feed(bytes);

                let mut cuts = cuts;
                cuts.sort_unstable();
                cuts.dedup();
                let mut parser = SseParser::new();
                let mut events = Vec::new();
                let mut start = 0;
                for cut in cuts.into_iter().chain(std::iter::once(bytes.len())) {
                    events.extend(parser.feed(&bytes[start..cut]));
                    start = cut;
                }
                prop_assert_eq!(events.len(), 2);
                prop_assert_eq!(events, expected);
            }
        }
    }
}
