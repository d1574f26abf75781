//! Admission control for top-level analysis requests.
//!
//! A single bounded counter gates how many full analyses may run at once,
//! independent of each request's internal producer fan-out.

use advisor_core::AnalysisError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded-capacity gate. Acquisition is non-blocking: exhausted capacity
/// rejects immediately with `AdmissionRejected`, callers are never queued.
#[derive(Clone)]
pub struct AdmissionController {
    slots: Arc<Semaphore>,
}

/// Held for the duration of one admitted analysis; the slot is returned
/// on drop, on every exit path.
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionController {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn try_acquire(&self) -> Result<AdmissionPermit, AnalysisError> {
        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => Ok(AdmissionPermit { _permit: permit }),
            Err(_) => Err(AnalysisError::AdmissionRejected),
        }
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}
