use crate::models::AlarmEvent;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const GOVEE_API_BASE_URL: &str = "https://openapi.api.govee.com";

const API_KEY_HEADER: &str = "Govee-API-Key";
const CONTROL_PATH: &str = "router/api/v1/device/control";
const DEVICES_PATH: &str = "router/api/v1/user/devices";
const SUCCESS_CODE: i64 = 200;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("device api returned non-success status: {0}")]
    Status(StatusCode),
    #[error("device api rejected the command with code {code}: {message}")]
    Rejected { code: i64, message: String },
}

/// Performs the side effect for a fired alarm.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &AlarmEvent) -> Result<(), NotifyError>;
}

/// Lists the devices the configured credential can control.
#[async_trait::async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn list_devices(&self) -> Result<serde_json::Value, NotifyError>;
}

#[async_trait::async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn notify(&self, event: &AlarmEvent) -> Result<(), NotifyError> {
        (**self).notify(event).await
    }
}

#[async_trait::async_trait]
impl<T: DeviceDirectory + ?Sized> DeviceDirectory for Arc<T> {
    async fn list_devices(&self) -> Result<serde_json::Value, NotifyError> {
        (**self).list_devices().await
    }
}

/// Device the notifier switches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoveeDevice {
    pub device: String,
    pub sku: String,
}

/// Turns a Govee light on through the Govee OpenAPI.
#[derive(Debug, Clone)]
pub struct GoveeNotifier {
    client: Client,
    base_url: Url,
    api_key: String,
    target: GoveeDevice,
}

impl GoveeNotifier {
    pub fn new(base_url: Url, api_key: String, target: GoveeDevice) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url,
            api_key,
            target,
        }
    }

    pub fn target(&self) -> &GoveeDevice {
        &self.target
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ControlRequest<'a> {
    request_id: String,
    payload: ControlPayload<'a>,
}

#[derive(Debug, Serialize)]
struct ControlPayload<'a> {
    device: &'a str,
    sku: &'a str,
    capability: Capability,
}

#[derive(Debug, Serialize)]
struct Capability {
    #[serde(rename = "type")]
    kind: &'static str,
    instance: &'static str,
    value: u8,
}

impl Capability {
    fn power_on() -> Self {
        Self {
            kind: "devices.capabilities.on_off",
            instance: "powerSwitch",
            value: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ControlResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
}

#[async_trait::async_trait]
impl Notifier for GoveeNotifier {
    async fn notify(&self, event: &AlarmEvent) -> Result<(), NotifyError> {
        let request = ControlRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            payload: ControlPayload {
                device: &self.target.device,
                sku: &self.target.sku,
                capability: Capability::power_on(),
            },
        };

        let response = self
            .client
            .post(self.endpoint(CONTROL_PATH))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }

        let body = response.json::<ControlResponse>().await?;
        match body.code {
            Some(code) if code != SUCCESS_CODE => Err(NotifyError::Rejected {
                code,
                message: body.msg.unwrap_or_default(),
            }),
            _ => {
                debug!(
                    device = %self.target.device,
                    reason = %event.reason,
                    msg = body.msg.as_deref().unwrap_or(""),
                    "govee control accepted"
                );
                Ok(())
            }
        }
    }
}

#[async_trait::async_trait]
impl DeviceDirectory for GoveeNotifier {
    async fn list_devices(&self) -> Result<serde_json::Value, NotifyError> {
        let response = self
            .client
            .get(self.endpoint(DEVICES_PATH))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }

        Ok(response.json::<serde_json::Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_request_matches_govee_wire_format() {
        let request = ControlRequest {
            request_id: "req-1".to_owned(),
            payload: ControlPayload {
                device: "D7:B0:60:74:F4:DB:FB:6A",
                sku: "H6008",
                capability: Capability::power_on(),
            },
        };

        let json = serde_json::to_value(&request);
        assert!(json.is_ok());
        let Ok(json) = json else { return };

        assert_eq!(
            json,
            serde_json::json!({
                "requestId": "req-1",
                "payload": {
                    "device": "D7:B0:60:74:F4:DB:FB:6A",
                    "sku": "H6008",
                    "capability": {
                        "type": "devices.capabilities.on_off",
                        "instance": "powerSwitch",
                        "value": 1
                    }
                }
            })
        );
    }

    #[test]
    fn endpoint_joins_base_with_or_without_trailing_slash() {
        let target = GoveeDevice {
            device: "d".to_owned(),
            sku: "s".to_owned(),
        };
        for base in ["http://127.0.0.1:9000", "http://127.0.0.1:9000/"] {
            let Ok(url) = Url::parse(base) else { return };
            let notifier = GoveeNotifier::new(url, "key".to_owned(), target.clone());
            assert_eq!(
                notifier.endpoint(CONTROL_PATH),
                "http://127.0.0.1:9000/router/api/v1/device/control"
            );
        }
    }
}
