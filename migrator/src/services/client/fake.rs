//! Scripted in-memory dashboard for engine tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::dashboard_client::DashboardApi;
use super::errors::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub method: &'static str,
    pub path: String,
    pub body: Value,
}

struct FailureRule {
    method: &'static str,
    path: String,
    body_match: Option<(String, Value)>,
    error: ApiError,
}

struct FakeState {
    resources: HashMap<String, Value>,
    id_fields: HashMap<String, (String, bool)>,
    next_id: u64,
    failures: Vec<FailureRule>,
    writes: Vec<WriteCall>,
    gets: Vec<String>,
}

/// GETs answer from a path → JSON map (absent paths are 404). POSTs to a
/// collection allocate an id, append the created object to that collection
/// and echo it back. `POST .../devices/claim` lists the serials under
/// `.../devices`.
#[derive(Clone)]
pub struct FakeDashboard {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeDashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDashboard {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                resources: HashMap::new(),
                id_fields: HashMap::new(),
                next_id: 1000,
                failures: Vec::new(),
                writes: Vec::new(),
                gets: Vec::new(),
            })),
        }
    }

    pub fn set(&self, path: &str, value: Value) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .resources
            .insert(path.to_string(), value);
        self
    }

    pub fn remove(&self, path: &str) {
        self.inner.lock().unwrap().resources.remove(path);
    }

    pub fn value(&self, path: &str) -> Option<Value> {
        self.inner.lock().unwrap().resources.get(path).cloned()
    }

    /// Name of the id field allocated by POSTs to `path`
    pub fn id_field(&self, path: &str, field: &str, numeric: bool) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .id_fields
            .insert(path.to_string(), (field.to_string(), numeric));
        self
    }

    pub fn fail(&self, method: &'static str, path: &str, error: ApiError) {
        self.inner.lock().unwrap().failures.push(FailureRule {
            method,
            path: path.to_string(),
            body_match: None,
            error,
        });
    }

    /// Fail writes whose body has `key == value`
    pub fn fail_when(&self, method: &'static str, path: &str, key: &str, value: Value, error: ApiError) {
        self.inner.lock().unwrap().failures.push(FailureRule {
            method,
            path: path.to_string(),
            body_match: Some((key.to_string(), value)),
            error,
        });
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.inner.lock().unwrap().writes.clone()
    }

    pub fn writes_to(&self, method: &str, path: &str) -> Vec<Value> {
        self.writes()
            .into_iter()
            .filter(|w| w.method == method && w.path == path)
            .map(|w| w.body)
            .collect()
    }

    pub fn get_count(&self) -> usize {
        self.inner.lock().unwrap().gets.len()
    }

    fn check_failure(state: &FakeState, method: &str, path: &str, body: Option<&Value>) -> Result<(), ApiError> {
        for rule in &state.failures {
            if rule.method != method || rule.path != path {
                continue;
            }
            let matches = match (&rule.body_match, body) {
                (None, _) => true,
                (Some((key, expected)), Some(body)) => body.get(key) == Some(expected),
                (Some(_), None) => false,
            };
            if matches {
                return Err(rule.error.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DashboardApi for FakeDashboard {
    async fn get(&self, path: &str) -> Result<Option<Value>, ApiError> {
        let mut state = self.inner.lock().unwrap();
        Self::check_failure(&state, "GET", path, None)?;
        state.gets.push(path.to_string());
        Ok(state.resources.get(path).cloned())
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let mut state = self.inner.lock().unwrap();
        Self::check_failure(&state, "POST", path, Some(body))?;
        state.writes.push(WriteCall {
            method: "POST",
            path: path.to_string(),
            body: body.clone(),
        });

        if let Some(devices_path) = path.strip_suffix("/claim") {
            let network_id = devices_path
                .trim_start_matches("/networks/")
                .trim_end_matches("/devices")
                .to_string();
            let serials: Vec<String> = body["serials"]
                .as_array()
                .map(|list| list.iter().filter_map(|s| s.as_str().map(str::to_string)).collect())
                .unwrap_or_default();
            let entry = state
                .resources
                .entry(devices_path.to_string())
                .or_insert_with(|| json!([]));
            if let Some(list) = entry.as_array_mut() {
                for serial in serials {
                    list.push(json!({"serial": serial, "model": "MS250-48", "networkId": network_id}));
                }
            }
            return Ok(json!({}));
        }

        let (field, numeric) = state
            .id_fields
            .get(path)
            .cloned()
            .unwrap_or_else(|| ("id".to_string(), false));
        let id = state.next_id;
        state.next_id += 1;

        let mut created = body.clone();
        if let Some(object) = created.as_object_mut() {
            let id_value = if numeric { json!(id) } else { json!(id.to_string()) };
            object.insert(field, id_value);
        }
        let entry = state
            .resources
            .entry(path.to_string())
            .or_insert_with(|| json!([]));
        if let Some(list) = entry.as_array_mut() {
            list.push(created.clone());
        }
        if path.ends_with("/networks") {
            let devices_path = format!("/networks/{}/devices", id);
            state.resources.entry(devices_path).or_insert_with(|| json!([]));
        }
        Ok(created)
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        let mut state = self.inner.lock().unwrap();
        Self::check_failure(&state, "PUT", path, Some(body))?;
        state.writes.push(WriteCall {
            method: "PUT",
            path: path.to_string(),
            body: body.clone(),
        });
        state.resources.insert(path.to_string(), body.clone());
        Ok(body.clone())
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let mut state = self.inner.lock().unwrap();
        Self::check_failure(&state, "DELETE", path, None)?;
        state.writes.push(WriteCall {
            method: "DELETE",
            path: path.to_string(),
            body: Value::Null,
        });
        state.resources.remove(path);
        Ok(())
    }
}
