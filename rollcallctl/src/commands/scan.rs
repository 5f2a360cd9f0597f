use std::process::ExitCode;

use anyhow::Result;
use rollcall_core::{Notifier, ScanInput, UserId};

use super::{AppContext, exit_code};

/// Submit one token. Queued counts as success: the scan is safe.
pub async fn scan(ctx: &AppContext, token: &str, section: Option<i64>) -> Result<ExitCode> {
    let identity = ctx.identity()?;
    let coordinator = ctx.coordinator();

    let outcome = coordinator
        .submit_scan(ScanInput {
            token,
            role: identity.role,
            section: ctx.section(section),
            student_id: Some(identity.user_id),
            beacon_id: None,
        })
        .await;

    ctx.notifier.notify(outcome.notice());
    Ok(exit_code(outcome.is_delivered_or_saved()))
}

pub async fn mark(ctx: &AppContext, student_id: i64, section: Option<i64>) -> Result<ExitCode> {
    ctx.config.require_token()?;
    let outcome = ctx
        .coordinator()
        .mark_present(UserId(student_id), &ctx.section(section))
        .await;

    ctx.notifier.notify(outcome.notice());
    Ok(exit_code(matches!(
        outcome,
        rollcall_core::MarkOutcome::Marked { .. }
    )))
}
