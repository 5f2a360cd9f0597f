//! The single chokepoint through which every scan is sent.
//!
//! Live scans and queued replays both go through [`SubmissionCoordinator`].
//! It classifies failures, queues what can be retried, and resends the
//! queue as a whole once the host is back online. Nothing here touches
//! presentation: every operation returns an outcome value and the caller
//! decides how to show it.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{AttendanceApi, ManualMark, ScanReceipt};
use crate::attestation::Attestation;
use crate::classifier::{ScanInput, classify};
use crate::connectivity::Connectivity;
use crate::error::{ApiError, ValidationError};
use crate::notice::{DrainReport, MarkOutcome, SubmitOutcome};
use crate::queue::OfflineQueue;
use crate::types::{EntryId, PendingSubmission, ScanKind, SectionSelection, UserId};

pub struct SubmissionCoordinator {
    api: Arc<dyn AttendanceApi>,
    queue: Arc<OfflineQueue>,
    connectivity: Connectivity,
    attestation: Option<Attestation>,
    drain_guard: Mutex<()>,
}

impl std::fmt::Debug for SubmissionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionCoordinator")
            .field("queue", &self.queue)
            .field("online", &self.connectivity.is_online())
            .field("attestation", &self.attestation)
            .finish()
    }
}

impl SubmissionCoordinator {
    pub fn new(
        api: Arc<dyn AttendanceApi>,
        queue: Arc<OfflineQueue>,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            api,
            queue,
            connectivity,
            attestation: None,
            drain_guard: Mutex::new(()),
        }
    }

    /// Attach beacon discovery to lecture scans. Leaving it unset is the
    /// operator declining consent.
    pub fn with_attestation(mut self, attestation: Attestation) -> Self {
        self.attestation = Some(attestation);
        self
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    async fn dispatch(&self, payload: &PendingSubmission) -> Result<ScanReceipt, ApiError> {
        let result = self.api.submit_scan(payload).await;
        match &result {
            Ok(receipt) => debug!(
                entry = %payload.id,
                kind = %payload.kind,
                message = %receipt.message,
                "scan acknowledged"
            ),
            Err(err) => debug!(
                entry = %payload.id,
                kind = %payload.kind,
                error = %err,
                transient = err.is_transient(),
                "scan not acknowledged"
            ),
        }
        result
    }

    /// Send one payload; queue it if no definitive answer came back.
    pub async fn submit(&self, payload: PendingSubmission) -> SubmitOutcome {
        match self.dispatch(&payload).await {
            Ok(receipt) => {
                info!(kind = %payload.kind, "scan accepted");
                SubmitOutcome::Accepted {
                    message: receipt.message,
                }
            }
            Err(cause) if cause.is_transient() => {
                let entry = payload.id;
                match self.queue.enqueue(payload).await {
                    Ok(()) => {
                        warn!(entry = %entry, error = %cause, "scan queued for retry");
                        SubmitOutcome::Queued { entry, cause }
                    }
                    Err(err) => {
                        warn!(error = %cause, queue_error = %err, "scan lost: queue write failed");
                        SubmitOutcome::Unsaved {
                            cause,
                            reason: err.to_string(),
                        }
                    }
                }
            }
            Err(error) => {
                warn!(error = %error, "scan rejected by server");
                SubmitOutcome::Rejected { error }
            }
        }
    }

    /// Classify a decoded scan, attach a beacon when applicable, submit.
    pub async fn submit_scan(&self, input: ScanInput<'_>) -> SubmitOutcome {
        let payload = match classify(input) {
            Ok(payload) => payload,
            Err(err) => {
                info!(reason = %err, "scan refused before sending");
                return SubmitOutcome::Invalid(err);
            }
        };

        let payload = match (&self.attestation, payload.kind) {
            (Some(attestation), ScanKind::Lecture) if payload.beacon_id.is_none() => {
                let beacon = attestation.attest().await;
                payload.with_beacon(beacon)
            }
            _ => payload,
        };

        self.submit(payload).await
    }

    /// Resend every queued scan concurrently.
    ///
    /// Entries are removed only when every resend succeeded, and then only
    /// the entries that were part of this attempt. A scan queued while the
    /// resends are in flight stays for the next drain.
    pub async fn drain_queue(&self) -> DrainReport {
        let Ok(_running) = self.drain_guard.try_lock() else {
            debug!("drain already in progress");
            return DrainReport::AlreadyRunning;
        };

        if !self.connectivity.is_online() {
            debug!("offline; drain skipped");
            return DrainReport::Offline;
        }

        let snapshot = match self.queue.drain().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "offline queue unreadable; drain skipped");
                return DrainReport::StorageFailed {
                    reason: err.to_string(),
                };
            }
        };
        if snapshot.is_empty() {
            return DrainReport::Empty;
        }

        let total = snapshot.len();
        info!(count = total, "resending offline scans");

        let results = join_all(snapshot.iter().map(|payload| self.dispatch(payload))).await;
        let failed = results.iter().filter(|result| result.is_err()).count();
        if failed > 0 {
            warn!(failed, total, "offline sync incomplete; queue retained");
            return DrainReport::Incomplete { failed, total };
        }

        let ids: Vec<EntryId> = snapshot.iter().map(|payload| payload.id).collect();
        match self.queue.remove(&ids).await {
            Ok(removed) => {
                info!(count = removed, "offline scans synced");
                DrainReport::Synced { count: total }
            }
            Err(err) => {
                warn!(error = %err, "scans synced but queue could not be updated");
                DrainReport::StorageFailed {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Mark a student present without a scan. Never queued.
    pub async fn mark_present(
        &self,
        student_id: UserId,
        selection: &SectionSelection,
    ) -> MarkOutcome {
        let Some(section_id) = selection.current() else {
            return MarkOutcome::Invalid(ValidationError::NoSectionSelected);
        };

        let mark = ManualMark {
            student_id,
            section_id,
        };
        match self.api.mark_present(&mark).await {
            Ok(()) => {
                info!(student = %student_id, section = %section_id, "student marked present");
                MarkOutcome::Marked { student_id }
            }
            Err(error) => {
                warn!(student = %student_id, error = %error, "manual mark failed");
                MarkOutcome::Failed { error }
            }
        }
    }
}
