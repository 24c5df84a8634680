//! Incremental decoder for the relay's newline-delimited event stream.
//!
//! The decoder owns the stream buffer for one in-flight response. Bytes go
//! in via [`SseDecoder::feed`]; complete records come out as events. A
//! record whose JSON payload does not parse is assumed to be split across a
//! chunk boundary, never malformed: it stays in the buffer, the current
//! chunk's processing halts, and decoding resumes when more bytes arrive.
//! If the stream ends while such a fragment is still pending, it is dropped
//! silently along with anything queued behind it.

use memchr::memchr;
use tracing::debug;

use crate::api::ChatResponse;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// One incremental text fragment of the assistant's reply.
    Delta(String),
    /// The `[DONE]` sentinel. Always the last event of a stream; any bytes
    /// after it are discarded unparsed.
    Done,
}

enum Record<'a> {
    /// Blank line, comment, or a line without the data prefix.
    Skip,
    Done,
    Data(&'a str),
}

fn classify(line: &str) -> Record<'_> {
    if line.trim().is_empty() || line.starts_with(':') {
        return Record::Skip;
    }
    let Some(payload) = line.strip_prefix("data:") else {
        return Record::Skip;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        Record::Done
    } else {
        Record::Data(payload)
    }
}

/// Reads `choices[0].delta.content` out of a parsed payload. Anything that
/// does not match that shape is metadata, not an error.
fn extract_delta(value: serde_json::Value) -> Option<String> {
    let response: ChatResponse = serde_json::from_value(value).ok()?;
    response.choices.into_iter().next()?.delta.content
}

pub struct SseDecoder {
    buf: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Appends a chunk and drains every complete record from the buffer, in
    /// arrival order. Restartable: an incomplete trailing record persists
    /// until a later feed completes it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        self.buf.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(offset) = memchr(b'\n', &self.buf[consumed..]) {
            let end = consumed + offset;
            let mut record = &self.buf[consumed..end];
            if record.last() == Some(&b'\r') {
                record = &record[..record.len() - 1];
            }

            // The delimiter cannot split a code point, so a complete record
            // from a well-formed stream is always valid UTF-8.
            let Ok(line) = std::str::from_utf8(record) else {
                debug!("discarding non-UTF-8 record");
                consumed = end + 1;
                continue;
            };

            match classify(line) {
                Record::Skip => {
                    consumed = end + 1;
                }
                Record::Done => {
                    self.done = true;
                    self.buf.clear();
                    events.push(SseEvent::Done);
                    return events;
                }
                Record::Data(payload) => match serde_json::from_str::<serde_json::Value>(payload) {
                    Ok(value) => {
                        if let Some(delta) = extract_delta(value) {
                            events.push(SseEvent::Delta(delta));
                        }
                        consumed = end + 1;
                    }
                    Err(_) => {
                        // Mid-record fragment: leave it (and everything
                        // after it) buffered and wait for more bytes.
                        debug!(payload, "deferring unparseable record");
                        break;
                    }
                },
            }
        }

        self.buf.drain(..consumed);
        events
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_record(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n", serde_json::to_string(text).unwrap())
    }

    fn collect_deltas(events: &[SseEvent]) -> String {
        events
            .iter()
            .filter_map(|event| match event {
                SseEvent::Delta(text) => Some(text.as_str()),
                SseEvent::Done => None,
            })
            .collect()
    }

    #[test]
    fn whole_stream_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let stream = format!("{}{}data: [DONE]\n", delta_record("Hello, "), delta_record("world"));
        let events = decoder.feed(stream.as_bytes());
        assert_eq!(collect_deltas(&events), "Hello, world");
        assert_eq!(events.last(), Some(&SseEvent::Done));
        assert!(decoder.is_done());
    }

    #[test]
    fn byte_by_byte_feeding_matches_whole_feed() {
        let stream = format!(
            "{}{}{}data: [DONE]\n",
            delta_record("héllo "),
            delta_record("wörld"),
            "data: {\"choices\":[]}\n"
        );

        let mut whole = SseDecoder::new();
        let expected = whole.feed(stream.as_bytes());

        let mut split = SseDecoder::new();
        let mut events = Vec::new();
        for byte in stream.as_bytes() {
            events.extend(split.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(events, expected);
        assert_eq!(collect_deltas(&events), "héllo wörld");
    }

    #[test]
    fn deltas_concatenate_in_arrival_order_across_groupings() {
        let fragments = ["a", "b", "c", "d", "e"];
        let stream: String = fragments.iter().map(|f| delta_record(f)).collect();
        let bytes = stream.as_bytes();

        for split_at in [1, 7, 23, bytes.len() - 1] {
            let mut decoder = SseDecoder::new();
            let mut events = decoder.feed(&bytes[..split_at]);
            events.extend(decoder.feed(&bytes[split_at..]));
            assert_eq!(collect_deltas(&events), "abcde", "split at {split_at}");
        }
    }

    #[test]
    fn sentinel_stops_parsing_and_discards_trailing_bytes() {
        let mut decoder = SseDecoder::new();
        let stream = format!("data: [DONE]\n{}", delta_record("never seen"));
        let events = decoder.feed(stream.as_bytes());
        assert_eq!(events, vec![SseEvent::Done]);

        // Later feeds are inert.
        let events = decoder.feed(delta_record("still never").as_bytes());
        assert!(events.is_empty());
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let mut decoder = SseDecoder::new();
        let stream = format!(
            ": keep-alive\n\n   \n{}: another comment\n\n",
            delta_record("ok")
        );
        let events = decoder.feed(stream.as_bytes());
        assert_eq!(events, vec![SseEvent::Delta("ok".to_string())]);
    }

    #[test]
    fn non_data_records_are_discarded() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"event: ping\nid: 42\n");
        assert!(events.is_empty());
    }

    #[test]
    fn split_payload_defers_until_remainder_arrives() {
        let mut decoder = SseDecoder::new();

        let events = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel");
        assert!(events.is_empty());

        let events = decoder.feed(b"lo\"}}]}\n");
        assert_eq!(events, vec![SseEvent::Delta("Hello".to_string())]);
    }

    #[test]
    fn concrete_three_chunk_scenario_yields_hello() {
        let mut decoder = SseDecoder::new();
        let mut content = String::new();
        let mut done = false;

        for chunk in [
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel".as_bytes(),
            "lo\"}}]}\n".as_bytes(),
            "data: [DONE]\n".as_bytes(),
        ] {
            for event in decoder.feed(chunk) {
                match event {
                    SseEvent::Delta(text) => content.push_str(&text),
                    SseEvent::Done => done = true,
                }
            }
        }

        assert_eq!(content, "Hello");
        assert!(done);
    }

    #[test]
    fn unparseable_record_with_newline_halts_the_chunk() {
        let mut decoder = SseDecoder::new();
        let stream = format!("data: {{\"truncated\n{}", delta_record("queued"));
        let events = decoder.feed(stream.as_bytes());
        // The fragment never completes, so the record behind it stays
        // buffered too; dropping the decoder at stream end loses both.
        assert!(events.is_empty());
    }

    #[test]
    fn crlf_records_are_stripped() {
        let mut decoder = SseDecoder::new();
        let stream = delta_record("windows").replace('\n', "\r\n");
        let events = decoder.feed(stream.as_bytes());
        assert_eq!(events, vec![SseEvent::Delta("windows".to_string())]);
    }

    #[test]
    fn metadata_only_payloads_yield_nothing() {
        let mut decoder = SseDecoder::new();
        let stream = "data: {\"choices\":[{\"finish_reason\":\"stop\"}]}\n\
                      data: {\"id\":\"cmpl-1\"}\n\
                      data: {\"choices\":[{\"delta\":{\"content\":42}}]}\n";
        let events = decoder.feed(stream.as_bytes());
        assert!(events.is_empty());
    }

    #[test]
    fn payload_without_space_after_prefix_still_decodes() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data:{\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n");
        assert_eq!(events, vec![SseEvent::Delta("x".to_string())]);
    }
}
