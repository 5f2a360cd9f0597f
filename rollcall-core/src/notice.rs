//! Operation outcomes and the operator notices derived from them.
//!
//! The coordinator decides an outcome and returns it; turning that outcome
//! into something the operator sees is a separate step, so the decision
//! logic never touches presentation.

use std::fmt;
use std::sync::Mutex;

use crate::error::{ApiError, ValidationError};
use crate::types::{EntryId, UserId};

pub const QUEUED_NOTICE: &str = "Network error. Scan saved locally and will be retried.";
pub const SYNC_INCOMPLETE_NOTICE: &str =
    "Some offline scans could not be synced. Please try again later.";

/// Result of one scan submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server acknowledged the scan.
    Accepted { message: String },
    /// No definitive answer; the scan waits in the offline queue.
    Queued { entry: EntryId, cause: ApiError },
    /// The server refused the scan; retrying cannot help.
    Rejected { error: ApiError },
    /// The scan was refused locally before any network call.
    Invalid(ValidationError),
    /// The network failed and the scan could not be queued either.
    Unsaved { cause: ApiError, reason: String },
}

impl SubmitOutcome {
    /// Accepted or safely queued.
    pub fn is_delivered_or_saved(&self) -> bool {
        matches!(self, Self::Accepted { .. } | Self::Queued { .. })
    }

    pub fn notice(&self) -> Notice {
        match self {
            Self::Accepted { message } => Notice::success(message.clone()),
            Self::Queued { .. } => Notice::queued(QUEUED_NOTICE),
            Self::Rejected { error } => Notice::error(error.operator_message()),
            Self::Invalid(err) => Notice::error(err.to_string()),
            Self::Unsaved { reason, .. } => Notice::error(format!(
                "Network error and the scan could not be saved locally: {reason}"
            )),
        }
    }
}

/// Result of one attempt to resend the offline queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainReport {
    /// Every queued item was acknowledged and removed.
    Synced { count: usize },
    /// At least one resend failed; the queue was left intact.
    Incomplete { failed: usize, total: usize },
    /// Nothing was queued.
    Empty,
    /// The device reports itself offline; nothing was attempted.
    Offline,
    /// Another drain was still running.
    AlreadyRunning,
    /// The queue could not be read or updated.
    StorageFailed { reason: String },
}

impl DrainReport {
    /// Notice for the operator; no-op drains stay silent.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::Synced { count } => Some(Notice::success(format!(
                "Successfully synced {count} saved scans."
            ))),
            Self::Incomplete { .. } => Some(Notice::error(SYNC_INCOMPLETE_NOTICE)),
            Self::StorageFailed { reason } => Some(Notice::error(format!(
                "Saved scans could not be synced: {reason}"
            ))),
            Self::Empty | Self::Offline | Self::AlreadyRunning => None,
        }
    }
}

/// Result of a manual attendance mark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked { student_id: UserId },
    Invalid(ValidationError),
    Failed { error: ApiError },
}

impl MarkOutcome {
    pub fn notice(&self) -> Notice {
        match self {
            Self::Marked { student_id } => {
                Notice::success(format!("Marked student {student_id} as present."))
            }
            Self::Invalid(err) => Notice::error(err.to_string()),
            Self::Failed { error } if error.is_transient() => {
                Notice::error("Error marking attendance. Check the connection and try again.")
            }
            Self::Failed { error } => Notice::error(format!(
                "Error marking attendance: {}",
                error.operator_message()
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Success,
    /// Saved locally, will retry. Distinct from both success and failure.
    Queued,
    Error,
    Info,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NoticeLevel::Success => "ok",
            NoticeLevel::Queued => "saved",
            NoticeLevel::Error => "error",
            NoticeLevel::Info => "info",
        };
        f.write_str(label)
    }
}

/// Short message shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn queued(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Queued,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.text)
    }
}

/// Where notices go (terminal, UI toast, test recorder).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that keeps every notice, for tests and batch reporting.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_notice_is_distinct_from_success_and_failure() {
        let queued = SubmitOutcome::Queued {
            entry: EntryId::new(),
            cause: ApiError::Transport("offline".into()),
        }
        .notice();
        let accepted = SubmitOutcome::Accepted {
            message: "ok".into(),
        }
        .notice();
        let rejected = SubmitOutcome::Rejected {
            error: ApiError::Status {
                status: 400,
                detail: "Invalid or expired token".into(),
            },
        }
        .notice();

        assert_eq!(queued.level, NoticeLevel::Queued);
        assert!(queued.text.contains("saved locally"));
        assert_ne!(queued.level, accepted.level);
        assert_ne!(queued.level, rejected.level);
        assert_eq!(rejected.text, "Invalid or expired token");
    }

    #[test]
    fn validation_notice_asks_for_section() {
        let notice = SubmitOutcome::Invalid(ValidationError::NoSectionSelected).notice();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.text.contains("select a section first"));
    }

    #[test]
    fn synced_notice_counts_items() {
        let notice = DrainReport::Synced { count: 2 }.notice().unwrap();
        assert_eq!(notice.text, "Successfully synced 2 saved scans.");
        assert_eq!(notice.level, NoticeLevel::Success);
    }

    #[test]
    fn quiet_drains_have_no_notice() {
        assert!(DrainReport::Empty.notice().is_none());
        assert!(DrainReport::Offline.notice().is_none());
        assert!(DrainReport::AlreadyRunning.notice().is_none());
        assert_eq!(
            DrainReport::Incomplete { failed: 1, total: 3 }
                .notice()
                .unwrap()
                .text,
            SYNC_INCOMPLETE_NOTICE
        );
    }

    #[test]
    fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify(Notice::info("a"));
        notifier.notify(Notice::success("b"));

        let texts: Vec<String> = notifier.notices().into_iter().map(|n| n.text).collect();
        assert_eq!(texts, ["a", "b"]);
    }
}
