//! Turns a decoded scan into a submission payload.
//!
//! Pure function of its inputs: no I/O, no queueing.

use tracing::debug;

use crate::error::ValidationError;
use crate::types::{BeaconId, PendingSubmission, Role, SectionSelection, UserId};

/// Everything known about a scan at the moment it was decoded.
#[derive(Debug, Clone)]
pub struct ScanInput<'a> {
    pub token: &'a str,
    pub role: Role,
    pub section: SectionSelection,
    /// Acting student, required for lecture-mode self-check-in.
    pub student_id: Option<UserId>,
    pub beacon_id: Option<BeaconId>,
}

/// Build the payload for a scan, or explain why it cannot be sent.
///
/// Students scanning a lecture secret go to the lecture endpoint; teachers
/// scanning a student's rotating token go to the student-token endpoint.
/// Both require a selected section. Beacon attestation only applies to
/// lecture scans; the student-token endpoint does not accept it.
pub fn classify(input: ScanInput<'_>) -> Result<PendingSubmission, ValidationError> {
    let section_id = input
        .section
        .current()
        .ok_or(ValidationError::NoSectionSelected)?;

    let token = input.token.trim();
    if token.is_empty() {
        return Err(ValidationError::EmptyToken);
    }

    let submission = match input.role {
        Role::Student => {
            let student_id = input.student_id.ok_or(ValidationError::MissingStudentId)?;
            PendingSubmission::lecture(token, student_id, section_id, input.beacon_id)
        }
        Role::Teacher => PendingSubmission::student_token(token, section_id),
    };

    debug!(
        kind = %submission.kind,
        section = %section_id,
        "classified scan"
    );
    Ok(submission)
}
