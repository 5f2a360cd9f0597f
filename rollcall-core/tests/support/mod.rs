#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rollcall_core::api::{AttendanceApi, ManualMark, ScanReceipt};
use rollcall_core::{
    ApiError, Connectivity, MemorySlot, OfflineQueue, PendingSubmission, SubmissionCoordinator,
};
use tokio::sync::{Notify, Semaphore};

/// Fake backend that records every call and answers from a script.
#[derive(Debug, Default)]
pub struct FakeApi {
    default_failure: Mutex<Option<ApiError>>,
    token_failures: Mutex<HashMap<String, ApiError>>,
    calls: Mutex<Vec<PendingSubmission>>,
    marks: Mutex<Vec<ManualMark>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    entered: Notify,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call fails the way an unreachable server does.
    pub fn offline() -> Arc<Self> {
        let api = Self::new();
        api.fail_all(transport_error());
        api
    }

    pub fn fail_all(&self, error: ApiError) {
        *self.default_failure.lock().unwrap() = Some(error);
    }

    pub fn recover(&self) {
        *self.default_failure.lock().unwrap() = None;
        self.token_failures.lock().unwrap().clear();
    }

    pub fn fail_token(&self, token: &str, error: ApiError) {
        self.token_failures
            .lock()
            .unwrap()
            .insert(token.to_string(), error);
    }

    /// Make calls wait until the returned semaphore gets permits.
    pub fn hold_calls(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once a scan call has started.
    pub async fn call_started(&self) {
        self.entered.notified().await;
    }

    pub fn calls(&self) -> Vec<PendingSubmission> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn marks(&self) -> Vec<ManualMark> {
        self.marks.lock().unwrap().clone()
    }

    fn scripted_failure(&self, token: &str) -> Option<ApiError> {
        if let Some(error) = self.token_failures.lock().unwrap().get(token) {
            return Some(error.clone());
        }
        self.default_failure.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttendanceApi for FakeApi {
    async fn submit_scan(&self, submission: &PendingSubmission) -> Result<ScanReceipt, ApiError> {
        self.calls.lock().unwrap().push(submission.clone());
        self.entered.notify_one();

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        match self.scripted_failure(&submission.token) {
            Some(error) => Err(error),
            None => Ok(ScanReceipt {
                message: format!("Attendance recorded for {}", submission.token),
            }),
        }
    }

    async fn mark_present(&self, mark: &ManualMark) -> Result<(), ApiError> {
        self.marks.lock().unwrap().push(*mark);
        match self.default_failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub fn transport_error() -> ApiError {
    ApiError::Transport("error sending request: connection refused".into())
}

pub fn rejection(detail: &str) -> ApiError {
    ApiError::Status {
        status: 400,
        detail: detail.to_string(),
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub slot: MemorySlot,
    pub queue: Arc<OfflineQueue>,
    pub connectivity: Connectivity,
    pub coordinator: Arc<SubmissionCoordinator>,
}

impl Harness {
    pub fn new(api: Arc<FakeApi>) -> Self {
        Self::with_slot(api, MemorySlot::new())
    }

    pub fn with_slot(api: Arc<FakeApi>, slot: MemorySlot) -> Self {
        let queue = Arc::new(OfflineQueue::new(slot.clone()));
        let connectivity = Connectivity::new(true);
        let coordinator = Arc::new(SubmissionCoordinator::new(
            api.clone(),
            queue.clone(),
            connectivity.clone(),
        ));
        Self {
            api,
            slot,
            queue,
            connectivity,
            coordinator,
        }
    }

    pub async fn queued_tokens(&self) -> Vec<String> {
        self.queue
            .drain()
            .await
            .expect("queue readable")
            .into_iter()
            .map(|entry| entry.token)
            .collect()
    }
}
