//! Domain values shared by every stage of the scan pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a class section on the backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SectionId(pub i64);

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend user id (students and teachers share the id space).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short-range device identifier used as weak proof of presence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeaconId(String);

impl BeaconId {
    /// Wraps a discovered identifier, rejecting blank values.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BeaconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role carried by the session credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Self-checks in by scanning a lecture secret.
    Student,
    /// Verifies presence by scanning a student's rotating token.
    Teacher,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "teacher" => Some(Role::Teacher),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => f.write_str("student"),
            Role::Teacher => f.write_str("teacher"),
        }
    }
}

/// Endpoint variant a scan is reported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanKind {
    /// Student self-check-in against a lecture-wide secret.
    Lecture,
    /// Teacher verification of a student-presented token.
    #[default]
    StudentToken,
}

impl fmt::Display for ScanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanKind::Lecture => f.write_str("lecture"),
            ScanKind::StudentToken => f.write_str("student-token"),
        }
    }
}

/// Client-side identity of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scan report that has not been acknowledged by the server yet.
///
/// The same shape is sent live and persisted in the offline queue, so a
/// replayed submission carries exactly what the original attempt carried
/// (including any beacon attestation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubmission {
    #[serde(default)]
    pub id: EntryId,
    #[serde(default)]
    pub kind: ScanKind,
    pub token: String,
    #[serde(default)]
    pub section_id: Option<SectionId>,
    #[serde(default)]
    pub student_id: Option<UserId>,
    #[serde(default)]
    pub beacon_id: Option<BeaconId>,
    #[serde(default = "Utc::now")]
    pub queued_at: DateTime<Utc>,
}

impl PendingSubmission {
    /// Teacher-side verification of a student token.
    pub fn student_token(token: impl Into<String>, section_id: SectionId) -> Self {
        Self {
            id: EntryId::new(),
            kind: ScanKind::StudentToken,
            token: token.into(),
            section_id: Some(section_id),
            student_id: None,
            beacon_id: None,
            queued_at: Utc::now(),
        }
    }

    /// Student self-check-in against a lecture secret.
    pub fn lecture(
        secret: impl Into<String>,
        student_id: UserId,
        section_id: SectionId,
        beacon_id: Option<BeaconId>,
    ) -> Self {
        Self {
            id: EntryId::new(),
            kind: ScanKind::Lecture,
            token: secret.into(),
            section_id: Some(section_id),
            student_id: Some(student_id),
            beacon_id,
            queued_at: Utc::now(),
        }
    }

    pub fn with_beacon(mut self, beacon_id: Option<BeaconId>) -> Self {
        self.beacon_id = beacon_id;
        self
    }
}

/// The section currently chosen by the operator, if any.
///
/// Held by the caller and handed to each operation instead of living in
/// ambient state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionSelection {
    current: Option<SectionId>,
}

impl SectionSelection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(section_id: SectionId) -> Self {
        Self {
            current: Some(section_id),
        }
    }

    pub fn select(&mut self, section_id: SectionId) {
        self.current = Some(section_id);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<SectionId> {
        self.current
    }
}

impl From<Option<SectionId>> for SectionSelection {
    fn from(current: Option<SectionId>) -> Self {
        Self { current }
    }
}
