// Usage events. Tracking is opt-in through the global config and always
// best effort: a failed capture is logged and otherwise ignored.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

pub const TELEMETRY_HOST_ENV: &str = "TELEMETRY_HOST";
pub const TELEMETRY_API_KEY_ENV: &str = "TELEMETRY_API_KEY";
pub const DEFAULT_TELEMETRY_HOST: &str = "https://app.posthog.com";

/// Event sent after a variant is built and registered or updated.
pub const DEPLOYMENT_EVENT: &str = "app_deployment";

/// Something that accepts usage events.
pub trait EventSink {
    fn capture(&self, user_id: &str, event: &str, properties: Map<String, Value>) -> Result<()>;
}

#[derive(Serialize, Debug)]
struct CapturePayload<'a> {
    api_key: &'a str,
    event: &'a str,
    distinct_id: &'a str,
    properties: Map<String, Value>,
}

/// Posts events to a collector's `/capture/` endpoint.
pub struct HttpEventSink {
    client: Client,
    host: String,
    project_key: String,
}

impl HttpEventSink {
    pub fn new(host: &str, project_key: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build telemetry HTTP client")?;
        Ok(HttpEventSink {
            client,
            host: host.trim_end_matches('/').to_string(),
            project_key: project_key.to_string(),
        })
    }

    /// Sink configured from `TELEMETRY_HOST` / `TELEMETRY_API_KEY`. Returns
    /// `None` when no project key is set.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var(TELEMETRY_API_KEY_ENV).ok().filter(|k| !k.is_empty());
        let Some(key) = key else {
            log::debug!("{} not set, usage events disabled", TELEMETRY_API_KEY_ENV);
            return None;
        };
        let host =
            std::env::var(TELEMETRY_HOST_ENV).unwrap_or_else(|_| DEFAULT_TELEMETRY_HOST.into());
        match HttpEventSink::new(&host, &key) {
            Ok(sink) => Some(sink),
            Err(e) => {
                log::warn!("Usage events disabled: {:#}", e);
                None
            }
        }
    }
}

impl EventSink for HttpEventSink {
    fn capture(&self, user_id: &str, event: &str, properties: Map<String, Value>) -> Result<()> {
        let url = format!("{}/capture/", self.host);
        let payload = CapturePayload {
            api_key: &self.project_key,
            event,
            distinct_id: user_id,
            properties,
        };
        let res = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .context("Failed to send telemetry event")?;
        if !res.status().is_success() {
            anyhow::bail!("Telemetry capture failed: {}", res.status());
        }
        Ok(())
    }
}

/// Properties attached to a deployment event.
pub fn deployment_properties(app_id: &str, user_id: &str, cloud: bool) -> Map<String, Value> {
    let mut props = Map::new();
    props.insert("app_id".into(), Value::from(app_id));
    props.insert("deployed_by".into(), Value::from(user_id));
    props.insert("environment".into(), Value::from("CLI"));
    props.insert("version".into(), Value::from(if cloud { "cloud" } else { "oss" }));
    props
}
