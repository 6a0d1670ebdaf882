//! Scanning buffer for controller messages
//!
//! Text is unframed: messages are found by substring search anywhere in the
//! accumulated buffer. Each match consumes the matched span and everything
//! before it, and scanning continues over the remainder, so several messages
//! arriving in one read are each reported once and in stream order.

use super::MessageGrammar;
use log::{debug, warn};

/// State change requested by a controller message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaEvent {
    /// Every area back to normal
    ResetAll,
    /// The given area is in alarm
    AreaAlarm(usize),
}

impl std::fmt::Display for AreaEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AreaEvent::ResetAll => write!(f, "RESET all areas"),
            AreaEvent::AreaAlarm(id) => write!(f, "ALARM area {}", id),
        }
    }
}

/// Decoded text accumulated since the last consumed message
#[derive(Debug)]
pub struct IngestBuffer {
    grammar: MessageGrammar,
    text: String,
    limit: usize,
    trimmed: usize,
}

impl IngestBuffer {
    /// Create a buffer holding at most `limit` bytes of unmatched text
    pub fn new(grammar: MessageGrammar, limit: usize) -> Self {
        Self {
            grammar,
            text: String::new(),
            limit,
            trimmed: 0,
        }
    }

    /// Append decoded text. The size limit applies after the next scan.
    pub fn push(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Drop the oldest unmatched prefix past the limit
    fn trim(&mut self) {
        if self.text.len() > self.limit {
            let mut cut = self.text.len() - self.limit;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
            self.trimmed += cut;
            warn!(
                "Ingest buffer over {} bytes, dropped {} bytes of unmatched text",
                self.limit, cut
            );
        }
    }

    /// Extract every complete message currently in the buffer.
    ///
    /// An area number that runs to the end of the buffer may still be
    /// arriving, so it is held back unless `at_rest` is set (the last read
    /// returned no data).
    pub fn scan(&mut self, at_rest: bool) -> Vec<AreaEvent> {
        let mut events = Vec::new();

        loop {
            let reset = self.text.find(self.grammar.reset_phrase.as_str());
            let alarm = self.text.find(self.grammar.alarm_prefix.as_str());

            let (pos, is_reset) = match (reset, alarm) {
                (None, None) => break,
                (Some(r), None) => (r, true),
                (None, Some(a)) => (a, false),
                (Some(r), Some(a)) if r < a => (r, true),
                (Some(_), Some(a)) => (a, false),
            };

            if is_reset {
                self.consume(pos + self.grammar.reset_phrase.len());
                events.push(AreaEvent::ResetAll);
                continue;
            }

            let digits_start = pos + self.grammar.alarm_prefix.len();
            let rest = &self.text[digits_start..];
            let digit_len = rest.bytes().take_while(u8::is_ascii_digit).count();

            if digit_len == 0 {
                if rest.is_empty() {
                    break;
                }
                debug!("Alarm notice without an area number, skipping");
                self.consume(digits_start);
                continue;
            }

            if digit_len == rest.len() && !at_rest {
                break;
            }

            // Out-of-range ids are the store's concern; overflow maps to one
            let id = rest[..digit_len].parse::<usize>().unwrap_or(usize::MAX);
            self.consume(digits_start + digit_len);
            events.push(AreaEvent::AreaAlarm(id));
        }

        self.trim();
        events
    }

    fn consume(&mut self, end: usize) {
        self.text.drain(..end);
    }

    /// Buffered, not yet matched text
    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Total bytes dropped by the size limit
    pub fn trimmed(&self) -> usize {
        self.trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::GRAMMAR_V1;

    const RESET: &str = "Fire cleared, system reset to normal.";

    fn buffer() -> IngestBuffer {
        IngestBuffer::new(GRAMMAR_V1.clone(), 4096)
    }

    #[test]
    fn test_alarm_with_line_ending() {
        let mut buf = buffer();
        buf.push("boot ok\r\nSending SMS: Fire detected in area 7\r\n");
        assert_eq!(buf.scan(false), vec![AreaEvent::AreaAlarm(7)]);
        assert_eq!(buf.as_str(), "\r\n");
    }

    #[test]
    fn test_reset() {
        let mut buf = buffer();
        buf.push(RESET);
        assert_eq!(buf.scan(false), vec![AreaEvent::ResetAll]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_concatenated_messages_each_reported_once() {
        let mut buf = buffer();
        buf.push("Sending SMS: Fire detected in area 3\nSending SMS: Fire detected in area 12\n");
        buf.push(RESET);
        buf.push("\nSending SMS: Fire detected in area 5\n");

        assert_eq!(
            buf.scan(false),
            vec![
                AreaEvent::AreaAlarm(3),
                AreaEvent::AreaAlarm(12),
                AreaEvent::ResetAll,
                AreaEvent::AreaAlarm(5),
            ]
        );
        assert_eq!(buf.scan(false), vec![]);
    }

    #[test]
    fn test_message_split_across_pushes() {
        let mut buf = buffer();
        buf.push("Sending SMS: Fire det");
        assert!(buf.scan(false).is_empty());
        buf.push("ected in area 1");
        assert!(buf.scan(false).is_empty(), "number may still be arriving");
        buf.push("9\n");
        assert_eq!(buf.scan(false), vec![AreaEvent::AreaAlarm(19)]);
    }

    #[test]
    fn test_trailing_number_accepted_at_rest() {
        let mut buf = buffer();
        buf.push("Sending SMS: Fire detected in area 7");
        assert!(buf.scan(false).is_empty());
        assert_eq!(buf.scan(true), vec![AreaEvent::AreaAlarm(7)]);
    }

    #[test]
    fn test_prefix_without_number_is_skipped() {
        let mut buf = buffer();
        buf.push("Sending SMS: Fire detected in area X\nSending SMS: Fire detected in area 2\n");
        assert_eq!(buf.scan(false), vec![AreaEvent::AreaAlarm(2)]);
    }

    #[test]
    fn test_prefix_at_end_waits_even_at_rest() {
        let mut buf = buffer();
        buf.push("Sending SMS: Fire detected in area ");
        assert!(buf.scan(true).is_empty());
        buf.push("4 ");
        assert_eq!(buf.scan(false), vec![AreaEvent::AreaAlarm(4)]);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let mut buf = buffer();
        buf.push("fire cleared, system reset to normal.\nsending sms: fire detected in area 1\n");
        assert!(buf.scan(true).is_empty());
    }

    #[test]
    fn test_overflowing_area_number() {
        let mut buf = buffer();
        buf.push("Sending SMS: Fire detected in area 99999999999999999999999999\n");
        assert_eq!(buf.scan(false), vec![AreaEvent::AreaAlarm(usize::MAX)]);
        assert_eq!(buf.as_str(), "\n");
    }

    #[test]
    fn test_limit_drops_oldest_prefix() {
        let mut buf = IngestBuffer::new(GRAMMAR_V1.clone(), 64);
        buf.push(&"x".repeat(100));
        assert!(buf.scan(false).is_empty());
        assert_eq!(buf.len(), 64);
        assert_eq!(buf.trimmed(), 36);

        buf.push("Sending SMS: Fire detected in area 9\n");
        assert_eq!(buf.scan(false), vec![AreaEvent::AreaAlarm(9)]);
    }

    #[test]
    fn test_large_read_is_scanned_before_limit() {
        let mut buf = buffer();
        let mut chunk = String::from("Sending SMS: Fire detected in area 7\n");
        chunk.push_str(&"status ok\n".repeat(500));
        buf.push(&chunk);

        assert_eq!(buf.scan(false), vec![AreaEvent::AreaAlarm(7)]);
        assert_eq!(buf.len(), 4096);
    }

    #[test]
    fn test_limit_keeps_held_alarm() {
        let mut buf = IngestBuffer::new(GRAMMAR_V1.clone(), 64);
        let mut chunk = "y".repeat(200);
        chunk.push_str("Sending SMS: Fire detected in area 2");
        buf.push(&chunk);

        assert!(buf.scan(false).is_empty());
        assert_eq!(buf.len(), 64);
        buf.push("6\n");
        assert_eq!(buf.scan(false), vec![AreaEvent::AreaAlarm(26)]);
    }

    #[test]
    fn test_limit_respects_char_boundaries() {
        let mut buf = IngestBuffer::new(GRAMMAR_V1.clone(), 3);
        buf.push("ééé");
        buf.scan(false);
        assert!(buf.len() <= 3);
        assert!(buf.as_str().chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_event_display() {
        assert_eq!(AreaEvent::AreaAlarm(7).to_string(), "ALARM area 7");
        assert_eq!(AreaEvent::ResetAll.to_string(), "RESET all areas");
    }
}
