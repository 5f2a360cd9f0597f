use std::process::ExitCode;

use anyhow::{Context, Result};
use rollcall_core::{DrainReport, Notice, Notifier, PendingSubmission, QueueError};
use tracing::info;

use super::{AppContext, exit_code};

pub async fn sync(ctx: &AppContext) -> Result<ExitCode> {
    let report = ctx.coordinator().drain_queue().await;

    let notice = report.notice().unwrap_or_else(|| match report {
        DrainReport::Offline => Notice::info("Offline; saved scans were not sent."),
        DrainReport::AlreadyRunning => Notice::info("A sync is already running."),
        _ => Notice::info("No saved scans to sync."),
    });
    ctx.notifier.notify(notice);

    Ok(exit_code(!matches!(
        report,
        DrainReport::Incomplete { .. } | DrainReport::StorageFailed { .. }
    )))
}

pub async fn list_or_clear(ctx: &AppContext, clear: bool) -> Result<ExitCode> {
    if clear {
        let pending = ctx.queue.len().await.ok();
        ctx.queue
            .clear()
            .await
            .context("failed to clear the offline queue")?;
        info!(discarded = ?pending, "offline queue cleared");
        let text = match pending {
            Some(count) => format!("Discarded {count} saved scans."),
            None => "Discarded unreadable offline queue.".to_string(),
        };
        ctx.notifier.notify(Notice::info(text));
        return Ok(ExitCode::SUCCESS);
    }

    let entries = match ctx.queue.drain().await {
        Ok(entries) => entries,
        Err(err @ QueueError::Corrupt(_)) => {
            return Err(anyhow::Error::new(err)
                .context("offline queue is unreadable; run `rollcallctl queue --clear` to discard it"));
        }
        Err(err) => return Err(err.into()),
    };

    if entries.is_empty() {
        ctx.notifier.notify(Notice::info("No saved scans."));
        return Ok(ExitCode::SUCCESS);
    }
    for entry in &entries {
        println!("{}", describe(entry));
    }
    Ok(ExitCode::SUCCESS)
}

fn describe(entry: &PendingSubmission) -> String {
    let optional = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    format!(
        "{}  {:<13}  section={}  student={}  beacon={}  {}",
        entry.queued_at.format("%Y-%m-%d %H:%M:%S"),
        entry.kind.to_string(),
        optional(entry.section_id.map(|id| id.to_string())),
        optional(entry.student_id.map(|id| id.to_string())),
        optional(entry.beacon_id.as_ref().map(|id| id.to_string())),
        entry.token,
    )
}
