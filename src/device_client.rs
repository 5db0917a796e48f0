// Single request/response call to one device over HTTP.
// Every call site gets a Result; timeouts and refused connections are HubError::Network.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;

use crate::error::HubError;
use crate::models::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    pub method: Method,
    pub address: String,
    pub path: String,
    pub body: Option<String>,
}

impl DeviceRequest {
    pub fn get(address: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            address: address.into(),
            path: path.into(),
            body: None,
        }
    }

    pub fn post(address: impl Into<String>, path: impl Into<String>, body: String) -> Self {
        Self {
            method: Method::Post,
            address: address.into(),
            path: path.into(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceResponse {
    pub status: u16,
    pub payload: Payload,
}

impl DeviceResponse {
    pub fn text(&self) -> String {
        self.payload.to_text()
    }
}

#[async_trait]
pub trait DeviceClient: Send + Sync {
    async fn request(&self, req: DeviceRequest) -> Result<DeviceResponse, HubError>;
}

/// reqwest-backed client; the timeout applies to the whole request.
#[derive(Clone)]
pub struct HttpDeviceClient {
    http: reqwest::Client,
}

impl HttpDeviceClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    fn url(address: &str, path: &str) -> String {
        let base = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address.trim_end_matches('/'))
        };
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

#[async_trait]
impl DeviceClient for HttpDeviceClient {
    async fn request(&self, req: DeviceRequest) -> Result<DeviceResponse, HubError> {
        let url = Self::url(&req.address, &req.path);
        let builder = match req.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };
        let builder = match req.body {
            Some(body) => builder.header(CONTENT_TYPE, "application/json").body(body),
            None => builder,
        };

        let resp = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HubError::network(&req.address, "timeout")
            } else {
                HubError::network(&req.address, e)
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(HubError::malformed(format!("{} returned {}", url, status)));
        }
        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("json"));
        let body: Bytes = resp
            .bytes()
            .await
            .map_err(|e| HubError::network(&req.address, e))?;
        // Controllers occasionally emit Latin-1 in their status pages.
        let text = String::from_utf8_lossy(&body).into_owned();

        let payload = if is_json {
            match serde_json::from_str(&text) {
                Ok(v) => Payload::Json(v),
                Err(_) => Payload::Text(text),
            }
        } else {
            Payload::Text(text)
        };
        tracing::debug!(url = %url, status = status.as_u16(), "device answered");
        Ok(DeviceResponse {
            status: status.as_u16(),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_adds_scheme_and_slash() {
        assert_eq!(
            HttpDeviceClient::url("192.168.100.51", "on"),
            "http://192.168.100.51/on"
        );
        assert_eq!(
            HttpDeviceClient::url("http://10.0.0.2/", "/params"),
            "http://10.0.0.2/params"
        );
    }
}
