use crate::error::IngestorError;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::*;
use mra_common_api::{
    event_type_of, AuditEvent, CommonError, DeviceEvent, EventForwarder, EventKind, MraEvent,
    ThreatEvent, UNKNOWN,
};
use mra_executor_influxdb::config::InfluxDbConfig;
use mra_executor_influxdb::point::{FieldValue, Point};
use mra_executor_influxdb::InfluxDbClient;
use serde_json::{Number, Value};

pub const MEASUREMENT: &str = "mra_events";

pub const EVENT_TYPE_TAG: &str = "event_type";
pub const ENTERPRISE_TAG: &str = "enterprise";
pub const DEVICE_ID_TAG: &str = "device_id";
pub const USER_TAG: &str = "user";

pub const SEVERITY_FIELD: &str = "severity";
pub const THREAT_TYPE_FIELD: &str = "threat_type";
pub const OS_VERSION_FIELD: &str = "os_version";
pub const RISK_SCORE_FIELD: &str = "risk_score";
pub const ACTION_FIELD: &str = "action";

const NAIVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Writes every MRA event as a point of the `mra_events` measurement.
pub struct InfluxDbForwarder {
    client: InfluxDbClient,
    bucket: String,
    org: String,
}

impl InfluxDbForwarder {
    pub fn new(config: &InfluxDbConfig) -> Result<InfluxDbForwarder, IngestorError> {
        let client = InfluxDbClient::new(config).map_err(|err| {
            IngestorError::ForwarderCreationError { message: format!("{}", err) }
        })?;
        Ok(InfluxDbForwarder { client, bucket: config.bucket.clone(), org: config.org.clone() })
    }

    async fn forward(&self, event: &Value, enterprise_name: &str) -> Result<(), IngestorError> {
        let event = MraEvent::from_value(event)?;
        let point = to_point(&event, enterprise_name)?;
        self.client.write_point(&self.bucket, &self.org, &point).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl EventForwarder for InfluxDbForwarder {
    async fn write(&self, event: &Value, enterprise_name: &str) {
        let event_type = event_type_of(event).unwrap_or(UNKNOWN);
        match self.forward(event, enterprise_name).await {
            Ok(()) => debug!("Successfully wrote event to InfluxDB: {}", event_type),
            Err(err) => {
                error!("Error writing event of type [{}] to InfluxDB: {}", event_type, err);
                debug!("Failed event: {}", event);
            }
        }
    }
}

/// Maps a decoded event to its point.
/// The point time is taken from the event; when the event has none, the current time is used.
pub fn to_point(event: &MraEvent, enterprise_name: &str) -> Result<Point, CommonError> {
    let time = match &event.timestamp {
        Some(timestamp) => parse_timestamp(timestamp)?,
        None => Utc::now(),
    };

    let point = Point::new(MEASUREMENT)
        .tag(EVENT_TYPE_TAG, event.event_type())
        .tag(ENTERPRISE_TAG, enterprise_name)
        .time(time);

    let point = match &event.kind {
        EventKind::Threat(ThreatEvent { severity, threat_type, target_guid }) => point
            .field(SEVERITY_FIELD, number_or_zero(severity))
            .field(THREAT_TYPE_FIELD, or_unknown(threat_type))
            .tag(DEVICE_ID_TAG, or_unknown(target_guid)),
        EventKind::Device(DeviceEvent { os_version, risk_score, device_guid }) => point
            .field(OS_VERSION_FIELD, or_unknown(os_version))
            .field(RISK_SCORE_FIELD, number_or_zero(risk_score))
            .tag(DEVICE_ID_TAG, or_unknown(device_guid)),
        EventKind::Audit(AuditEvent { action, user_id }) => {
            point.field(ACTION_FIELD, or_unknown(action)).tag(USER_TAG, or_unknown(user_id))
        }
        EventKind::Unrecognized { .. } => point,
    };

    Ok(point)
}

/// Parses an RFC 3339 timestamp. A timestamp without offset is read as UTC.
pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, CommonError> {
    if let Ok(time) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(timestamp, NAIVE_TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|err| CommonError::BadDataError {
            message: format!("Cannot parse the event timestamp [{}]. Err: {}", timestamp, err),
        })
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(UNKNOWN)
}

fn number_or_zero(value: &Option<Number>) -> FieldValue {
    value.as_ref().map(FieldValue::from).unwrap_or(FieldValue::Integer(0))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn map(event: Value, enterprise_name: &str) -> Point {
        to_point(&MraEvent::from_value(&event).unwrap(), enterprise_name).unwrap()
    }

    fn tags(point: &Point) -> Vec<(&str, &str)> {
        let mut tags: Vec<(&str, &str)> =
            point.tags().iter().map(|(key, value)| (key.as_str(), value.as_str())).collect();
        tags.sort();
        tags
    }

    fn field_keys(point: &Point) -> Vec<&str> {
        point.fields().iter().map(|(key, _)| key.as_str()).collect()
    }

    #[test]
    fn should_map_the_documented_threat_event() {
        // Arrange
        let event = json!({
            "type": "THREAT",
            "severity": 7,
            "threatType": "malware",
            "targetGuid": "dev-123",
            "timestamp": "2024-01-01T00:00:00Z"
        });

        // Act
        let point = map(event, "acme");

        // Assert
        assert_eq!(MEASUREMENT, point.measurement());
        assert_eq!(
            vec![("device_id", "dev-123"), ("enterprise", "acme"), ("event_type", "THREAT")],
            tags(&point)
        );
        assert_eq!(Some(&FieldValue::Integer(7)), point.get_field("severity"));
        assert_eq!(Some(&FieldValue::String("malware".to_owned())), point.get_field("threat_type"));
        assert_eq!(2, point.fields().len());
        assert_eq!(Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()), point.get_time());
        assert_eq!(
            "mra_events,device_id=dev-123,enterprise=acme,event_type=THREAT severity=7i,threat_type=\"malware\" 1704067200000000000",
            point.to_line_protocol().unwrap()
        );
    }

    #[test]
    fn should_use_defaults_for_missing_threat_attributes() {
        let point = map(json!({"type": "THREAT"}), "acme");

        assert_eq!(
            vec![("device_id", "unknown"), ("enterprise", "acme"), ("event_type", "THREAT")],
            tags(&point)
        );
        assert_eq!(Some(&FieldValue::Integer(0)), point.get_field("severity"));
        assert_eq!(Some(&FieldValue::String("unknown".to_owned())), point.get_field("threat_type"));
    }

    #[test]
    fn should_map_a_device_event() {
        let point = map(
            json!({"type": "DEVICE", "osVersion": "17.2", "riskScore": 4.5, "deviceGuid": "dev-9"}),
            "acme",
        );

        assert_eq!(
            vec![("device_id", "dev-9"), ("enterprise", "acme"), ("event_type", "DEVICE")],
            tags(&point)
        );
        assert_eq!(vec!["os_version", "risk_score"], field_keys(&point));
        assert_eq!(Some(&FieldValue::String("17.2".to_owned())), point.get_field("os_version"));
        assert_eq!(Some(&FieldValue::Float(4.5)), point.get_field("risk_score"));
    }

    #[test]
    fn should_use_defaults_for_missing_device_attributes() {
        let point = map(json!({"type": "DEVICE", "osVersion": null}), "acme");

        assert_eq!(Some("unknown"), point.get_tag("device_id"));
        assert_eq!(Some(&FieldValue::String("unknown".to_owned())), point.get_field("os_version"));
        assert_eq!(Some(&FieldValue::Integer(0)), point.get_field("risk_score"));
    }

    #[test]
    fn should_map_an_audit_event() {
        let point = map(json!({"type": "AUDIT", "action": "LOGIN", "userId": "u-1"}), "acme");

        assert_eq!(
            vec![("enterprise", "acme"), ("event_type", "AUDIT"), ("user", "u-1")],
            tags(&point)
        );
        assert_eq!(vec!["action"], field_keys(&point));
        assert_eq!(Some(&FieldValue::String("LOGIN".to_owned())), point.get_field("action"));

        let point = map(json!({"type": "AUDIT"}), "acme");
        assert_eq!(Some("unknown"), point.get_tag("user"));
        assert_eq!(Some(&FieldValue::String("unknown".to_owned())), point.get_field("action"));
    }

    #[test]
    fn should_tag_numeric_identifiers_with_their_text() {
        let point = map(json!({"type": "THREAT", "targetGuid": 12345, "severity": "9"}), "acme");
        assert_eq!(Some("12345"), point.get_tag("device_id"));
        assert_eq!(Some(&FieldValue::Integer(9)), point.get_field("severity"));

        let point = map(json!({"type": "AUDIT", "userId": 42}), "acme");
        assert_eq!(Some("42"), point.get_tag("user"));
    }

    #[test]
    fn should_keep_only_the_base_tags_for_unrecognized_types() {
        let point = map(json!({"type": "NETWORK", "severity": 9, "deviceGuid": "dev-1"}), "acme");
        assert_eq!(vec![("enterprise", "acme"), ("event_type", "NETWORK")], tags(&point));
        assert!(point.fields().is_empty());

        let point = map(json!({"severity": 9}), "acme");
        assert_eq!(vec![("enterprise", "acme"), ("event_type", "unknown")], tags(&point));
        assert!(point.fields().is_empty());

        let point = map(json!({"type": "threat"}), "acme");
        assert_eq!(Some("threat"), point.get_tag("event_type"));
        assert!(point.fields().is_empty());
    }

    #[test]
    fn should_accept_an_empty_enterprise_name() {
        let point = map(json!({"type": "AUDIT", "action": "LOGIN"}), "");
        assert_eq!(Some(""), point.get_tag("enterprise"));
        assert!(point.to_line_protocol().is_ok());
    }

    #[test]
    fn mapping_should_be_idempotent() {
        let event = json!({"type": "DEVICE", "riskScore": 3, "timestamp": "2024-03-01T10:00:00+02:00"});
        assert_eq!(map(event.clone(), "acme"), map(event, "acme"));
    }

    #[test]
    fn mapping_should_differ_only_by_time_when_timestamp_is_missing() {
        let event = json!({"type": "AUDIT", "action": "LOGOUT"});

        let before = Utc::now();
        let first = map(event.clone(), "acme");
        let second = map(event, "acme");
        let after = Utc::now();

        assert_eq!(first.measurement(), second.measurement());
        assert_eq!(first.tags(), second.tags());
        assert_eq!(first.fields(), second.fields());
        for point in [first, second] {
            let time = point.get_time().unwrap();
            assert!(time >= before && time <= after);
        }
    }

    #[test]
    fn should_parse_timestamps() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();

        assert_eq!(expected, parse_timestamp("2024-01-01T12:30:00Z").unwrap());
        assert_eq!(expected, parse_timestamp("2024-01-01T14:30:00+02:00").unwrap());
        assert_eq!(expected, parse_timestamp("2024-01-01T12:30:00").unwrap());
        assert_eq!(
            expected + chrono::Duration::microseconds(250),
            parse_timestamp("2024-01-01T12:30:00.000250").unwrap()
        );
    }

    #[test]
    fn should_fail_on_invalid_timestamps() {
        match parse_timestamp("yesterday") {
            Err(CommonError::BadDataError { .. }) => {}
            _ => assert!(false),
        };

        let event = MraEvent::from_value(&json!({"type": "THREAT", "timestamp": "01/01/2024"})).unwrap();
        assert!(to_point(&event, "acme").is_err());
    }
}
