use anyhow::Result;
use rollcall_core::{DrainReport, NoticeLevel, PendingSubmission, SectionId};

#[path = "support/mod.rs"]
mod support;

use support::{FakeApi, Harness, rejection, transport_error};

async fn seed(harness: &Harness, tokens: &[&str]) -> Result<()> {
    for token in tokens {
        harness
            .queue
            .enqueue(PendingSubmission::student_token(*token, SectionId(5)))
            .await?;
    }
    Ok(())
}

#[tokio::test]
async fn all_resends_succeeding_empties_the_queue() -> Result<()> {
    let harness = Harness::new(FakeApi::new());
    seed(&harness, &["A", "B"]).await?;

    let report = harness.coordinator.drain_queue().await;

    assert_eq!(report, DrainReport::Synced { count: 2 });
    let notice = report.notice().unwrap();
    assert_eq!(notice.text, "Successfully synced 2 saved scans.");
    assert_eq!(notice.level, NoticeLevel::Success);
    assert!(harness.queue.is_empty().await?);
    assert_eq!(harness.slot.contents().as_deref(), Some("[]"));
    assert_eq!(harness.api.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn one_failure_keeps_every_item() -> Result<()> {
    let api = FakeApi::new();
    api.fail_token("C", transport_error());
    let harness = Harness::new(api);
    seed(&harness, &["A", "B", "C", "D"]).await?;

    let report = harness.coordinator.drain_queue().await;

    assert_eq!(report, DrainReport::Incomplete { failed: 1, total: 4 });
    assert_eq!(
        report.notice().unwrap().text,
        "Some offline scans could not be synced. Please try again later."
    );
    assert_eq!(harness.queued_tokens().await, ["A", "B", "C", "D"]);
    // Every item was attempted, not just the ones before the failure.
    assert_eq!(harness.api.call_count(), 4);
    Ok(())
}

#[tokio::test]
async fn rejected_resend_also_keeps_the_queue() -> Result<()> {
    let api = FakeApi::new();
    api.fail_token("B", rejection("Invalid or expired token"));
    let harness = Harness::new(api);
    seed(&harness, &["A", "B"]).await?;

    let report = harness.coordinator.drain_queue().await;

    assert!(matches!(report, DrainReport::Incomplete { failed: 1, total: 2 }));
    assert_eq!(harness.queue.len().await?, 2);
    Ok(())
}

#[tokio::test]
async fn offline_drain_is_a_no_op() -> Result<()> {
    let harness = Harness::new(FakeApi::new());
    seed(&harness, &["A", "B", "C"]).await?;
    harness.connectivity.set_online(false);

    let report = harness.coordinator.drain_queue().await;

    assert_eq!(report, DrainReport::Offline);
    assert!(report.notice().is_none());
    assert_eq!(harness.queue.len().await?, 3);
    assert_eq!(harness.api.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn empty_queue_drain_is_silent() {
    let harness = Harness::new(FakeApi::new());

    let report = harness.coordinator.drain_queue().await;

    assert_eq!(report, DrainReport::Empty);
    assert!(report.notice().is_none());
    assert_eq!(harness.api.call_count(), 0);
}

#[tokio::test]
async fn scan_queued_during_drain_survives_for_the_next_cycle() -> Result<()> {
    let harness = Harness::new(FakeApi::new());
    seed(&harness, &["EARLY"]).await?;
    let gate = harness.api.hold_calls();

    let coordinator = harness.coordinator.clone();
    let drain = tokio::spawn(async move { coordinator.drain_queue().await });

    harness.api.call_started().await;
    harness
        .queue
        .enqueue(PendingSubmission::student_token("LATE", SectionId(5)))
        .await?;
    gate.add_permits(1);

    assert_eq!(drain.await?, DrainReport::Synced { count: 1 });
    assert_eq!(harness.queued_tokens().await, ["LATE"]);

    gate.add_permits(1);
    assert_eq!(
        harness.coordinator.drain_queue().await,
        DrainReport::Synced { count: 1 }
    );
    assert!(harness.queue.is_empty().await?);
    Ok(())
}

#[tokio::test]
async fn overlapping_drain_is_collapsed() -> Result<()> {
    let harness = Harness::new(FakeApi::new());
    seed(&harness, &["A"]).await?;
    let gate = harness.api.hold_calls();

    let coordinator = harness.coordinator.clone();
    let first = tokio::spawn(async move { coordinator.drain_queue().await });
    harness.api.call_started().await;

    assert_eq!(
        harness.coordinator.drain_queue().await,
        DrainReport::AlreadyRunning
    );

    gate.add_permits(1);
    assert_eq!(first.await?, DrainReport::Synced { count: 1 });
    assert_eq!(harness.api.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn queue_reloaded_from_storage_is_drained() -> Result<()> {
    let api = FakeApi::new();
    let first = Harness::new(FakeApi::offline());
    first
        .coordinator
        .submit(PendingSubmission::student_token("CARRIED", SectionId(5)))
        .await;

    // A fresh process over the same slot.
    let second = Harness::with_slot(api, first.slot.clone());
    assert_eq!(
        second.coordinator.drain_queue().await,
        DrainReport::Synced { count: 1 }
    );
    assert_eq!(second.api.calls()[0].token, "CARRIED");
    Ok(())
}
