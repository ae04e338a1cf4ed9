use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use super::errors::ApiError;
use super::rate_limit::RequestBudget;
use super::retry::{retry_with_backoff, RetryConfig};
use super::types::*;
use crate::services::config::ApiConfig;

const API_KEY_HEADER: &str = "X-Cisco-Meraki-API-Key";

/// Key-scoped access to the dashboard API.
///
/// Paths are relative to the API base (`/networks/{id}/...`). A `GET` that
/// answers 404 yields `Ok(None)`, which backup treats as "feature not
/// available" rather than a failure.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<Value>, ApiError>;
    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError>;
    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError>;
    async fn delete(&self, path: &str) -> Result<(), ApiError>;

    async fn get_organization(&self, org_id: &str) -> Result<Option<Organization>, ApiError> {
        match self.get(&format!("/organizations/{}", org_id)).await? {
            Some(value) => decode(value, "organization").map(Some),
            None => Ok(None),
        }
    }

    async fn get_network(&self, network_id: &str) -> Result<Option<Network>, ApiError> {
        match self.get(&format!("/networks/{}", network_id)).await? {
            Some(value) => decode(value, "network").map(Some),
            None => Ok(None),
        }
    }

    async fn list_network_devices(&self, network_id: &str) -> Result<Vec<Device>, ApiError> {
        let path = format!("/networks/{}/devices", network_id);
        let value = self.get(&path).await?.ok_or_else(|| ApiError::Permanent {
            status: 404,
            message: format!("network {} not found", network_id),
        })?;
        decode(value, "device list")
    }

    async fn list_switch_stacks(&self, network_id: &str) -> Result<Vec<SwitchStack>, ApiError> {
        match self
            .get(&format!("/networks/{}/switch/stacks", network_id))
            .await?
        {
            Some(value) => decode(value, "switch stacks"),
            None => Ok(Vec::new()),
        }
    }

    async fn get_device(&self, serial: &str) -> Result<Option<Device>, ApiError> {
        match self.get(&format!("/devices/{}", serial)).await? {
            Some(value) => decode(value, "device").map(Some),
            None => Ok(None),
        }
    }

    async fn get_inventory_device(
        &self,
        org_id: &str,
        serial: &str,
    ) -> Result<Option<InventoryDevice>, ApiError> {
        let path = format!("/organizations/{}/inventory/devices/{}", org_id, serial);
        match self.get(&path).await? {
            Some(value) => decode(value, "inventory device").map(Some),
            None => Ok(None),
        }
    }

    async fn list_organization_networks(&self, org_id: &str) -> Result<Vec<Network>, ApiError> {
        let path = format!("/organizations/{}/networks", org_id);
        let value = self.get(&path).await?.ok_or_else(|| ApiError::Permanent {
            status: 404,
            message: format!("organization {} not found", org_id),
        })?;
        decode(value, "network list")
    }

    async fn create_network(
        &self,
        org_id: &str,
        request: &CreateNetworkRequest,
    ) -> Result<Network, ApiError> {
        let body = encode(request)?;
        let value = self
            .post(&format!("/organizations/{}/networks", org_id), &body)
            .await?;
        decode(value, "created network")
    }

    /// Attach devices already in the organization inventory to a network
    async fn claim_into_network(&self, network_id: &str, serials: &[String]) -> Result<(), ApiError> {
        let body = encode(&ClaimDevicesRequest {
            serials: serials.to_vec(),
        })?;
        self.post(&format!("/networks/{}/devices/claim", network_id), &body)
            .await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse {
        message: format!("unexpected {} payload: {}", what, e),
    })
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Client {
        message: format!("failed to encode request body: {}", e),
    })
}

/// reqwest-backed [`DashboardApi`] for one API key
#[derive(Clone)]
pub struct DashboardClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
    budget: Arc<RequestBudget>,
}

impl std::fmt::Debug for DashboardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DashboardClient {
    pub fn new(api_key: impl Into<String>, config: &ApiConfig) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::Client {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            retry: config.retry.clone(),
            budget: Arc::new(RequestBudget::new(
                config.max_requests_per_second,
                config.max_in_flight,
            )),
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let operation = format!("{} {}", method, path);
        retry_with_backoff(&self.retry, &operation, || {
            self.send_once(method.clone(), path, body)
        })
        .await
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let _permit = self.budget.acquire().await?;

        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http_client
            .request(method, &url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ApiError::from_transport)?;
        let status = response.status();
        debug!("[Api] {} -> {}", url, status);

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let retry_after_secs = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response.text().await.map_err(ApiError::from_transport)?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Some(Value::Null));
            }
            return serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| ApiError::InvalidResponse {
                    message: format!("{}: {}", url, e),
                });
        }

        Err(ApiError::from_status(
            status.as_u16(),
            error_message(&text),
            retry_after_secs,
        ))
    }
}

/// Dashboard errors arrive as `{"errors": ["..."]}`
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(errors) = value.get("errors").and_then(Value::as_array) {
            let messages: Vec<&str> = errors.iter().filter_map(Value::as_str).collect();
            if !messages.is_empty() {
                return messages.join("; ");
            }
        }
    }
    body.chars().take(200).collect()
}

#[async_trait]
impl DashboardApi for DashboardClient {
    #[instrument(skip(self), err)]
    async fn get(&self, path: &str) -> Result<Option<Value>, ApiError> {
        self.send(Method::GET, path, None).await
    }

    #[instrument(skip(self, body), err)]
    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::POST, path, Some(body))
            .await?
            .ok_or_else(|| not_found(path))
    }

    #[instrument(skip(self, body), err)]
    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.send(Method::PUT, path, Some(body))
            .await?
            .ok_or_else(|| not_found(path))
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, None)
            .await?
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }
}

fn not_found(path: &str) -> ApiError {
    ApiError::Permanent {
        status: 404,
        message: format!("{} not found", path),
    }
}
