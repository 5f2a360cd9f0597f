//! # Rollcall Core
//!
//! Offline-resilient scan submission for the Rollcall attendance client.
//!
//! ## Overview
//!
//! A decoded QR token enters the pipeline, is classified by the acting role,
//! and is sent to the attendance backend. When no definitive answer comes
//! back the scan is persisted locally and resent once connectivity returns.
//!
//! - **Token classification**: lecture-mode self-check-in vs. teacher
//!   verification of a student's rotating token
//! - **Offline queue**: durable JSON queue in one storage slot
//! - **Submission coordination**: one chokepoint for live and replayed scans
//! - **Connectivity monitoring**: startup drain plus a drain per reconnect
//! - **Proximity attestation**: optional, best-effort beacon id on lecture scans
//!
//! ## Architecture
//!
//! - [`classifier`]: builds a [`PendingSubmission`] or a [`ValidationError`]
//! - [`queue`]: [`OfflineQueue`] over a [`queue::StorageSlot`]
//! - [`coordinator`]: [`SubmissionCoordinator`]
//! - [`connectivity`]: [`Connectivity`] and [`ConnectivityMonitor`]
//! - [`attestation`]: [`attestation::BeaconScanner`] implementations
//! - [`api`]: the [`api::AttendanceApi`] seam and its HTTP client
//! - [`notice`]: outcome values and the notices derived from them
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use rollcall_core::{
//!     api::ApiClient, Connectivity, FileSlot, OfflineQueue, QUEUE_SLOT, Role, ScanInput,
//!     SectionId, SectionSelection, SubmissionCoordinator,
//! };
//!
//! async fn scan_once() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = ApiClient::new("http://localhost:8000", Duration::from_secs(10))?;
//!     api.set_token(Some("<jwt>".to_string())).await;
//!
//!     let queue = OfflineQueue::new(FileSlot::new("/var/lib/rollcall", QUEUE_SLOT));
//!     let coordinator =
//!         SubmissionCoordinator::new(Arc::new(api), Arc::new(queue), Connectivity::default());
//!
//!     let outcome = coordinator
//!         .submit_scan(ScanInput {
//!             token: "ABC",
//!             role: Role::Teacher,
//!             section: SectionSelection::of(SectionId(7)),
//!             student_id: None,
//!             beacon_id: None,
//!         })
//!         .await;
//!     println!("{}", outcome.notice());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod attestation;
pub mod classifier;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod notice;
pub mod queue;
pub mod types;

pub use classifier::{ScanInput, classify};
pub use connectivity::{Connectivity, ConnectivityMonitor, ConnectivityState};
pub use coordinator::SubmissionCoordinator;
pub use error::{ApiError, AttestationError, IdentityError, QueueError, ValidationError};
pub use identity::SessionIdentity;
pub use notice::{
    DrainReport, MarkOutcome, Notice, NoticeLevel, Notifier, RecordingNotifier, SubmitOutcome,
};
pub use queue::{FileSlot, MemorySlot, OfflineQueue, QUEUE_SLOT};
pub use types::{
    BeaconId, EntryId, PendingSubmission, Role, ScanKind, SectionId, SectionSelection, UserId,
};
