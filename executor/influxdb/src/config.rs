use serde::Deserialize;

/// Connection parameters of the InfluxDB v2 instance receiving the points.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct InfluxDbConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
}
