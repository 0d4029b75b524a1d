use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use maplit::*;
use mra_grafana_ingestor::config::{
    build_config, ENTERPRISE_NAME, INFLUX_BUCKET, INFLUX_ORG, INFLUX_TOKEN, INFLUX_URL,
    MRA_API_DOMAIN, MRA_API_KEY,
};
use mra_grafana_ingestor::driver::{IngestorContext, LifecycleState};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn should_forward_streamed_events_to_influxdb_until_shutdown() {
    // Arrange
    let mra_server = MockServer::start();
    mra_server.mock(|when, then| {
        when.method(POST).path("/oauth2/token").header("authorization", "Bearer api-key");
        then.status(200).json_body(json!({ "access_token": "short-lived" }));
    });
    let stream_mock = mra_server.mock(|when, then| {
        when.method(GET)
            .path("/mra/stream/v2/events")
            .query_param("types", "THREAT,DEVICE,AUDIT")
            .header("authorization", "Bearer short-lived");
        then.status(200).header("content-type", "text/event-stream").body(
            r#"data: {"type":"THREAT","severity":7,"threatType":"malware","targetGuid":"dev-123","timestamp":"2024-01-01T00:00:00Z"}

"#,
        );
    });

    let influx_server = MockServer::start();
    let write_mock = influx_server.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/write")
            .query_param("org", "security")
            .query_param("bucket", "mobile")
            .query_param("precision", "ns")
            .header("authorization", "Token influx-token")
            .body("mra_events,device_id=dev-123,enterprise=acme,event_type=THREAT severity=7i,threat_type=\"malware\" 1704067200000000000");
        // The response is held back so that shutdown is requested while the write is in flight
        then.status(204).delay(Duration::from_millis(1000));
    });

    let mra_url = mra_server.base_url();
    let influx_url = influx_server.base_url();
    let config = build_config(hashmap![
        MRA_API_KEY => "api-key",
        ENTERPRISE_NAME => "acme",
        MRA_API_DOMAIN => mra_url.as_str(),
        INFLUX_URL => influx_url.as_str(),
        INFLUX_TOKEN => "influx-token",
        INFLUX_ORG => "security",
        INFLUX_BUCKET => "mobile",
    ])
    .unwrap();

    let context = IngestorContext::new(None);

    // Act
    let result = mra_grafana_ingestor::start(config, &context, async {
        while write_mock.hits_async().await < 1 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    // Assert
    assert!(result.is_ok());
    assert_eq!(LifecycleState::Stopped, context.state());
    stream_mock.assert();
    write_mock.assert();
}

#[tokio::test]
async fn should_fail_when_the_stream_cannot_be_opened() {
    let mra_server = MockServer::start();
    mra_server.mock(|when, then| {
        when.method(POST).path("/oauth2/token");
        then.status(401);
    });

    let mra_url = mra_server.base_url();
    let config = build_config(hashmap![
        MRA_API_KEY => "api-key",
        ENTERPRISE_NAME => "acme",
        MRA_API_DOMAIN => mra_url.as_str(),
    ])
    .unwrap();

    let context = IngestorContext::new(None);

    let result =
        mra_grafana_ingestor::start(config, &context, std::future::pending::<()>()).await;

    match result {
        Err(mra_grafana_ingestor::error::IngestorError::StreamError { message }) => {
            assert!(message.contains("AuthenticationError"))
        }
        _ => assert!(false),
    };
}
