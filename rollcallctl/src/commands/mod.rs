pub mod queue;
pub mod scan;
pub mod session;
pub mod station;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use rollcall_core::api::ApiClient;
use rollcall_core::attestation::{Attestation, CommandBeaconScanner};
use rollcall_core::{
    Connectivity, FileSlot, OfflineQueue, QUEUE_SLOT, SectionId, SectionSelection,
    SessionIdentity, SubmissionCoordinator,
};
use tracing::{debug, warn};

use crate::cli::Command;
use crate::config::{Config, ConfigLoadError};
use crate::notifier::TerminalNotifier;

/// Everything a command needs, built once from the resolved configuration.
#[derive(Debug)]
pub struct AppContext {
    pub config: Config,
    pub client: ApiClient,
    pub queue: Arc<OfflineQueue>,
    pub connectivity: Connectivity,
    pub notifier: Arc<TerminalNotifier>,
}

impl AppContext {
    pub async fn build(config: Config, offline: bool) -> Result<Self> {
        let client = ApiClient::new(&config.server_url, config.request_timeout).map_err(|err| {
            ConfigLoadError::InvalidServerUrl {
                value: config.server_url.clone(),
                reason: err.to_string(),
            }
        })?;
        client.set_token(config.token.clone()).await;

        let slot = FileSlot::new(&config.queue_dir, QUEUE_SLOT);
        debug!(path = %slot.path().display(), "using offline queue");

        Ok(Self {
            queue: Arc::new(OfflineQueue::new(slot)),
            connectivity: Connectivity::new(!offline),
            notifier: Arc::new(TerminalNotifier::new()),
            client,
            config,
        })
    }

    /// Decode the configured session token.
    pub fn identity(&self) -> Result<SessionIdentity> {
        let token = self.config.require_token()?;
        let identity =
            SessionIdentity::from_bearer(token).context("session token cannot be decoded")?;
        if identity.is_expired(Utc::now()) {
            warn!(user = %identity.username, "session token has expired; the server will reject requests");
        }
        Ok(identity)
    }

    /// Section given on the command line, else the configured one.
    pub fn section(&self, flag: Option<i64>) -> SectionSelection {
        flag.map(SectionId).or(self.config.section_id).into()
    }

    pub fn coordinator(&self) -> SubmissionCoordinator {
        let coordinator = SubmissionCoordinator::new(
            Arc::new(self.client.clone()),
            self.queue.clone(),
            self.connectivity.clone(),
        );

        let attestation = &self.config.attestation;
        if !attestation.enabled {
            return coordinator;
        }
        match attestation
            .command
            .as_deref()
            .and_then(CommandBeaconScanner::from_command_line)
        {
            Some(scanner) => coordinator
                .with_attestation(Attestation::new(Arc::new(scanner), attestation.timeout)),
            None => coordinator,
        }
    }
}

pub async fn dispatch(ctx: &AppContext, command: Command) -> Result<ExitCode> {
    match command {
        Command::Scan { token, section } => scan::scan(ctx, &token, section).await,
        Command::Station { section } => station::run(ctx, section).await,
        Command::Sync => queue::sync(ctx).await,
        Command::Queue { clear } => queue::list_or_clear(ctx, clear).await,
        Command::Mark {
            student_id,
            section,
        } => scan::mark(ctx, student_id, section).await,
        Command::Token { user } => session::token(ctx, user).await,
        Command::Lecture { action } => session::lecture(ctx, action).await,
        Command::Sections => session::sections(ctx).await,
        Command::Students => session::students(ctx).await,
        Command::Attendance { section } => session::attendance(ctx, section).await,
        Command::Login { username, password } => {
            session::login(ctx, &username, password).await
        }
        Command::Whoami => session::whoami(ctx),
    }
}

pub(crate) fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
