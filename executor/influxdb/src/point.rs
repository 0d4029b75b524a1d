//! InfluxDB v2 points and their Line Protocol encoding.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp_ns
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v2/reference/syntax/line-protocol/>

use crate::InfluxDbError;
use chrono::{DateTime, Utc};
use serde_json::Number;
use std::fmt;

/// Field written when a point carries no field of its own.
/// The Line Protocol rejects points without fields.
pub const MARKER_FIELD_KEY: &str = "event_count";

/// A value that can be stored in an InfluxDB field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
}

impl FieldValue {
    /// Format this value for InfluxDB Line Protocol.
    ///
    /// - Float: written as-is (e.g., `3.14`)
    /// - Integer: suffixed with `i` (e.g., `42i`)
    /// - String: quoted with double quotes, inner quotes escaped (e.g., `"hello"`)
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Integer(v) => format!("{}i", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line_protocol())
    }
}

impl From<&Number> for FieldValue {
    fn from(number: &Number) -> Self {
        match number.as_i64() {
            Some(value) => FieldValue::Integer(value),
            // u64 values above i64::MAX and decimals
            None => FieldValue::Float(number.as_f64().unwrap_or(f64::NAN)),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_owned())
    }
}

/// A single time-series record.
///
/// Built with chained calls and never modified once handed to the client:
/// ```
/// use mra_executor_influxdb::point::Point;
///
/// let point = Point::new("mra_events").tag("enterprise", "acme").field("severity", 7i64);
/// assert_eq!(Some("acme"), point.get_tag("enterprise"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    measurement: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, FieldValue)>,
    time: Option<DateTime<Utc>>,
}

impl Point {
    pub fn new<S: Into<String>>(measurement: S) -> Self {
        Point { measurement: measurement.into(), tags: vec![], fields: vec![], time: None }
    }

    /// Sets a tag. A tag with the same key is replaced.
    pub fn tag<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        let key = key.into();
        let value = value.into();
        match self.tags.iter_mut().find(|(existing, _)| *existing == key) {
            Some(tag) => tag.1 = value,
            None => self.tags.push((key, value)),
        }
        self
    }

    /// Sets a field. A field with the same key is replaced.
    pub fn field<K: Into<String>, V: Into<FieldValue>>(mut self, key: K, value: V) -> Self {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            Some(field) => field.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|(existing, _)| existing == key).map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn get_field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(existing, _)| existing == key).map(|(_, value)| value)
    }

    pub fn get_time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    /// Encodes the point as a single Line Protocol line.
    ///
    /// Tags are sorted by key and tags with an empty value are omitted,
    /// as InfluxDB does not accept them. A point without fields gets the
    /// `event_count=1i` marker field. Without a time, the server assigns one.
    pub fn to_line_protocol(&self) -> Result<String, InfluxDbError> {
        if self.measurement.is_empty() {
            return Err(InfluxDbError::BadPointError {
                message: "The measurement name cannot be empty".to_owned(),
            });
        }

        let mut line = escape_measurement(&self.measurement);

        let mut sorted_tags: Vec<_> = self.tags.iter().filter(|(_, value)| !value.is_empty()).collect();
        sorted_tags.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (key, value) in sorted_tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        if self.fields.is_empty() {
            line.push_str(MARKER_FIELD_KEY);
            line.push('=');
            line.push_str(&FieldValue::Integer(1).to_line_protocol());
        } else {
            for (i, (key, value)) in self.fields.iter().enumerate() {
                if i > 0 {
                    line.push(',');
                }
                line.push_str(&escape_key(key));
                line.push('=');
                line.push_str(&value.to_line_protocol());
            }
        }

        if let Some(time) = &self.time {
            let timestamp_ns = time.timestamp_nanos_opt().ok_or_else(|| {
                InfluxDbError::BadPointError {
                    message: format!("The point time [{}] cannot be expressed in nanoseconds", time),
                }
            })?;
            line.push(' ');
            line.push_str(&timestamp_ns.to_string());
        }

        Ok(line)
    }
}

/// Measurement names: backslashes, commas and spaces are escaped, line breaks and tabs
/// are written as `\n`, `\r` and `\t`.
fn escape_measurement(s: &str) -> String {
    escape(s, &[',', ' '])
}

/// Tag keys, tag values and field keys: as measurements, plus equals signs.
fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

fn escape(s: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if special.contains(&c) => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}
