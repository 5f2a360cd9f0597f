//! Attendance backend access.
//!
//! [`AttendanceApi`] is the seam the submission coordinator talks through;
//! [`ApiClient`] is the HTTP implementation. Tests substitute their own.

pub mod client;
pub mod routes;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::types::{PendingSubmission, Role, SectionId, UserId};

pub use client::ApiClient;

/// Message shown when a scan succeeds without a server-provided one.
pub const DEFAULT_SCAN_MESSAGE: &str = "Scan processed.";

/// Server acknowledgment of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReceipt {
    pub message: String,
}

/// Body of a manual attendance mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualMark {
    pub student_id: UserId,
    pub section_id: SectionId,
}

/// Current rotating token a student presents to the teacher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StudentQrToken {
    pub token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Response of the lecture-mode toggle endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LectureMode {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub master_qr_secret: Option<String>,
}

/// Credential issued by the login endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
}

fn bearer() -> String {
    "bearer".to_string()
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// Account as listed by the users endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    /// Kept as text; the backend may know roles this client does not.
    pub role: String,
}

impl UserSummary {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    /// Full name when the account has one, else the username.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AttendanceCount {
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
}

/// Operations the submission pipeline needs from the backend.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    /// Report one scan to the endpoint matching its kind.
    async fn submit_scan(
        &self,
        submission: &PendingSubmission,
    ) -> Result<ScanReceipt, ApiError>;

    /// Mark a student present without a scan.
    async fn mark_present(&self, mark: &ManualMark) -> Result<(), ApiError>;
}
