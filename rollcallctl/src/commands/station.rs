//! Long-running scan station.
//!
//! Decoded tokens arrive one per line on stdin (a keyboard-wedge scanner or
//! a decoder pipe). The connectivity monitor runs alongside and drains the
//! offline queue at startup and whenever the host reports it is back
//! online.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use rollcall_core::{
    ConnectivityMonitor, Notice, Notifier, ScanInput, SectionId, SectionSelection,
    SessionIdentity, SubmissionCoordinator,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use super::AppContext;

/// One line of station input.
#[derive(Debug, PartialEq, Eq)]
pub enum StationInput<'a> {
    Blank,
    SelectSection(Option<SectionId>),
    Sync,
    Scan(&'a str),
    Unknown(&'a str),
}

pub fn parse_line(line: &str) -> StationInput<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return StationInput::Blank;
    }
    let Some(directive) = trimmed.strip_prefix(':') else {
        return StationInput::Scan(trimmed);
    };

    let mut parts = directive.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("sync"), None, None) => StationInput::Sync,
        (Some("section"), Some("none"), None) => StationInput::SelectSection(None),
        (Some("section"), Some(id), None) => match id.parse() {
            Ok(id) => StationInput::SelectSection(Some(SectionId(id))),
            Err(_) => StationInput::Unknown(trimmed),
        },
        _ => StationInput::Unknown(trimmed),
    }
}

pub async fn run(ctx: &AppContext, section: Option<i64>) -> Result<ExitCode> {
    let identity = ctx.identity()?;
    let coordinator = Arc::new(ctx.coordinator());
    let notifier: Arc<dyn Notifier> = ctx.notifier.clone();

    let monitor = ConnectivityMonitor::spawn(
        coordinator.clone(),
        ctx.connectivity.clone(),
        notifier.clone(),
    );
    let mut signals = signals::ConnectivitySignals::install()?;

    let mut selection = ctx.section(section);
    info!(
        user = %identity.username,
        role = %identity.role,
        section = ?selection.current(),
        "station ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read from stdin")? else {
                    break;
                };
                handle_line(&line, &identity, &mut selection, &coordinator, notifier.as_ref()).await;
            }
            Some(online) = signals.next() => {
                ctx.connectivity.set_online(online);
            }
            _ = &mut shutdown => break,
        }
    }

    monitor.abort();
    info!("station stopped");
    Ok(ExitCode::SUCCESS)
}

async fn handle_line(
    line: &str,
    identity: &SessionIdentity,
    selection: &mut SectionSelection,
    coordinator: &SubmissionCoordinator,
    notifier: &dyn Notifier,
) {
    match parse_line(line) {
        StationInput::Blank => {}
        StationInput::SelectSection(Some(id)) => {
            selection.select(id);
            notifier.notify(Notice::info(format!("Section {id} selected.")));
        }
        StationInput::SelectSection(None) => {
            selection.clear();
            notifier.notify(Notice::info("Section cleared."));
        }
        StationInput::Sync => {
            if let Some(notice) = coordinator.drain_queue().await.notice() {
                notifier.notify(notice);
            }
        }
        StationInput::Scan(token) => {
            let outcome = coordinator
                .submit_scan(ScanInput {
                    token,
                    role: identity.role,
                    section: *selection,
                    student_id: Some(identity.user_id),
                    beacon_id: None,
                })
                .await;
            notifier.notify(outcome.notice());
        }
        StationInput::Unknown(directive) => {
            notifier.notify(Notice::error(format!("Unknown station command: {directive}")));
        }
    }
}

#[cfg(unix)]
mod signals {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    /// SIGUSR1 reports the network as up, SIGUSR2 as down.
    pub struct ConnectivitySignals {
        online: Signal,
        offline: Signal,
    }

    impl std::fmt::Debug for ConnectivitySignals {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("ConnectivitySignals")
        }
    }

    impl ConnectivitySignals {
        pub fn install() -> std::io::Result<Self> {
            Ok(Self {
                online: signal(SignalKind::user_defined1())?,
                offline: signal(SignalKind::user_defined2())?,
            })
        }

        pub async fn next(&mut self) -> Option<bool> {
            tokio::select! {
                received = self.online.recv() => received.map(|_| true),
                received = self.offline.recv() => received.map(|_| false),
            }
        }
    }
}

#[cfg(not(unix))]
mod signals {
    #[derive(Debug)]
    pub struct ConnectivitySignals;

    impl ConnectivitySignals {
        pub fn install() -> std::io::Result<Self> {
            Ok(Self)
        }

        pub async fn next(&mut self) -> Option<bool> {
            std::future::pending().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_scans() {
        assert_eq!(parse_line("  LEC42 \n"), StationInput::Scan("LEC42"));
        assert_eq!(parse_line("   "), StationInput::Blank);
    }

    #[test]
    fn section_directives() {
        assert_eq!(
            parse_line(":section 7"),
            StationInput::SelectSection(Some(SectionId(7)))
        );
        assert_eq!(parse_line(":section none"), StationInput::SelectSection(None));
        assert_eq!(parse_line(":section seven"), StationInput::Unknown(":section seven"));
        assert_eq!(parse_line(":sync"), StationInput::Sync);
        assert_eq!(parse_line(":reboot"), StationInput::Unknown(":reboot"));
    }
}
