//! Global request budget shared by every call made with one API key

use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;

use super::errors::ApiError;

/// Spaces requests at a fixed rate and caps how many are in flight.
///
/// Permits are handed out in arrival order; a caller that acquires a slot
/// sleeps until that slot's start time.
#[derive(Debug)]
pub struct RequestBudget {
    min_interval: Duration,
    next_slot: Mutex<Instant>,
    in_flight: Semaphore,
}

impl RequestBudget {
    pub fn new(max_requests_per_second: u32, max_in_flight: usize) -> Self {
        let per_second = max_requests_per_second.max(1);
        Self {
            min_interval: Duration::from_secs(1) / per_second,
            next_slot: Mutex::new(Instant::now()),
            in_flight: Semaphore::new(max_in_flight.max(1)),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for a request slot. The permit must be held until the response
    /// has been read.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, ApiError> {
        let permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| ApiError::Client {
                message: "request budget closed".to_string(),
            })?;

        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let slot = (*next_slot).max(Instant::now());
            *next_slot = slot + self.min_interval;
            slot
        };
        tokio::time::sleep_until(slot).await;

        Ok(permit)
    }
}
