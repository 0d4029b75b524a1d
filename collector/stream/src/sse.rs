//! Decoding of the Server-Sent Events framing used by the MRA v2 stream.

use crate::error::MraStreamError;
use serde_json::Value;

const EVENTS_KEY: &str = "events";
pub const HEARTBEAT_EVENT: &str = "heartbeat";

#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Accumulates the lines of a Server-Sent Events stream and emits a frame
/// every time a blank line terminates one.
#[derive(Default)]
pub struct SseFrameDecoder {
    event: Option<String>,
    data: Vec<String>,
    discarding: bool,
}

impl SseFrameDecoder {
    pub fn new() -> SseFrameDecoder {
        Default::default()
    }

    /// Drops the frame being accumulated, including the lines still to come
    /// up to the blank line that terminates it.
    pub fn discard_frame(&mut self) {
        self.event = None;
        self.data.clear();
        self.discarding = true;
    }

    pub fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if self.discarding {
            if line.is_empty() {
                self.discarding = false;
            }
            return None;
        }

        if line.is_empty() {
            let event = self.event.take();
            if self.data.is_empty() {
                return None;
            }
            let data = std::mem::take(&mut self.data).join("\n");
            return Some(SseFrame { event, data });
        }

        // comment, used by servers as keep-alive
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(index) => {
                let value = &line[index + 1..];
                (&line[..index], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_owned()),
            "event" => self.event = Some(value.to_owned()),
            _ => {}
        }
        None
    }
}

/// Extracts the MRA events carried by the data of a frame.
/// A payload with an `events` array yields its elements, anything else is a single event.
pub fn events_from_payload(data: &str) -> Result<Vec<Value>, MraStreamError> {
    let payload = serde_json::from_str::<Value>(data).map_err(|err| {
        MraStreamError::PayloadParsingError {
            message: format!("Cannot parse stream payload [{}]. Err: {}", data, err),
        }
    })?;

    match payload {
        Value::Object(mut body) => match body.remove(EVENTS_KEY) {
            Some(Value::Array(events)) => Ok(events),
            Some(other) => {
                body.insert(EVENTS_KEY.to_owned(), other);
                Ok(vec![Value::Object(body)])
            }
            None => Ok(vec![Value::Object(body)]),
        },
        other => Ok(vec![other]),
    }
}
