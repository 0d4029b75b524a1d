use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

pub const DEFAULT_API_DOMAIN: &str = "https://api.lookout.com";

/// Parameters of a subscription to the MRA v2 event stream.
#[derive(Clone, PartialEq)]
pub struct MraStreamConfig {
    pub api_domain: String,
    pub api_key: String,
    pub enterprise_name: String,
    /// Events older than this are not replayed.
    pub start_time: DateTime<Utc>,
    /// Comma separated list of the subscribed event types, e.g. `THREAT,DEVICE,AUDIT`
    pub event_type: String,
}

impl MraStreamConfig {
    pub fn start_time_param(&self) -> String {
        self.start_time.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

// The api key must never reach the logs
impl fmt::Debug for MraStreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MraStreamConfig")
            .field("api_domain", &self.api_domain)
            .field("api_key", &"***")
            .field("enterprise_name", &self.enterprise_name)
            .field("start_time", &self.start_time_param())
            .field("event_type", &self.event_type)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn config() -> MraStreamConfig {
        MraStreamConfig {
            api_domain: DEFAULT_API_DOMAIN.to_owned(),
            api_key: "very-secret".to_owned(),
            enterprise_name: "acme".to_owned(),
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 5).unwrap(),
            event_type: "THREAT,DEVICE,AUDIT".to_owned(),
        }
    }

    #[test]
    fn should_format_start_time_as_utc_rfc3339() {
        assert_eq!("2024-01-01T12:30:05Z", config().start_time_param());
    }

    #[test]
    fn debug_output_should_not_contain_the_api_key() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("acme"));
    }
}
