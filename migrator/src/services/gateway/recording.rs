//! In-memory gateway that records every call, for tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{DeviceGateway, GatewayError, NetworkRef, OrgRef};
use crate::migration::types::DeviceStep;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub step: DeviceStep,
    pub serial: String,
    pub org_id: String,
}

#[derive(Default)]
struct Inner {
    calls: Vec<GatewayCall>,
    failures: HashMap<(DeviceStep, String), String>,
}

#[derive(Clone, Default)]
pub struct RecordingGateway {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `step` call for `serial` fail with `reason`
    pub fn fail(&self, step: DeviceStep, serial: &str, reason: &str) {
        self.inner
            .lock()
            .unwrap()
            .failures
            .insert((step, serial.to_string()), reason.to_string());
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn calls_for(&self, serial: &str) -> Vec<DeviceStep> {
        self.calls()
            .into_iter()
            .filter(|call| call.serial == serial)
            .map(|call| call.step)
            .collect()
    }

    fn record(&self, step: DeviceStep, serial: &str, org: &OrgRef) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(GatewayCall {
            step,
            serial: serial.to_string(),
            org_id: org.id.clone(),
        });
        match inner.failures.get(&(step, serial.to_string())) {
            Some(reason) => Err(GatewayError::StepFailed {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DeviceGateway for RecordingGateway {
    async fn remove_from_network(
        &self,
        serial: &str,
        org: &OrgRef,
        _network: &NetworkRef,
    ) -> Result<(), GatewayError> {
        self.record(DeviceStep::Remove, serial, org)
    }

    async fn unclaim_device(&self, serial: &str, org: &OrgRef) -> Result<(), GatewayError> {
        self.record(DeviceStep::Unclaim, serial, org)
    }

    async fn claim_device(&self, serial: &str, org: &OrgRef) -> Result<(), GatewayError> {
        self.record(DeviceStep::Claim, serial, org)
    }
}
