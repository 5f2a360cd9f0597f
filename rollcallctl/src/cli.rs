use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::{ConfigLoader, ConfigOverrides};

#[derive(Debug, Parser)]
#[command(
    name = "rollcallctl",
    version,
    about = "Rollcall attendance client: scan, queue offline, sync on reconnect"
)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Dotenv file to load before reading the environment
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Attendance server base URL
    #[arg(long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Session token (JWT) issued by the server
    #[arg(id = "session_token", long = "token", global = true, value_name = "JWT")]
    pub token: Option<String>,

    /// Directory holding the offline queue
    #[arg(long, global = true, value_name = "DIR")]
    pub queue_dir: Option<PathBuf>,

    /// Start with connectivity reported offline
    #[arg(long, global = true)]
    pub offline: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn config_loader(&self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();
        if let Some(path) = &self.config {
            loader = loader.with_config_path(path);
        }
        if let Some(path) = &self.env_file {
            loader = loader.with_env_file(path);
        }
        loader
    }

    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            server_url: self.server.clone(),
            token: self.token.clone(),
            queue_dir: self.queue_dir.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit one decoded QR token
    Scan {
        /// Decoded token text (lecture secret or student token)
        token: String,
        /// Section to record attendance in
        #[arg(long, value_name = "ID")]
        section: Option<i64>,
    },
    /// Read decoded tokens from stdin and sync on reconnect
    ///
    /// Each line is one scan. `:section <id>` and `:section none` change the
    /// selected section, `:sync` forces a drain. SIGUSR1 reports the network
    /// as back online, SIGUSR2 as offline.
    Station {
        #[arg(long, value_name = "ID")]
        section: Option<i64>,
    },
    /// Resend saved scans now
    Sync,
    /// List saved scans
    Queue {
        /// Discard every saved scan
        #[arg(long)]
        clear: bool,
    },
    /// Mark a student present without a scan
    Mark {
        student_id: i64,
        #[arg(long, value_name = "ID")]
        section: Option<i64>,
    },
    /// Show the current rotating student token
    Token {
        /// Student user id (defaults to the signed-in user)
        #[arg(long, value_name = "ID")]
        user: Option<i64>,
    },
    /// Toggle lecture mode for the signed-in teacher
    Lecture {
        #[command(subcommand)]
        action: LectureAction,
    },
    /// List class sections
    Sections,
    /// List student accounts (id and name) for manual marking
    Students,
    /// Show how many attendance records the signed-in user has
    Attendance {
        /// Count only records in this section
        #[arg(long, value_name = "ID")]
        section: Option<i64>,
    },
    /// Sign in and print a session token
    ///
    /// The password is read from ROLLCALL_PASSWORD, or from the first line
    /// of stdin when unset.
    Login {
        username: String,
        #[arg(long, env = "ROLLCALL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Show the decoded session identity
    Whoami,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum LectureAction {
    /// Enable lecture mode and print the lecture secret
    Enable,
    /// Disable lecture mode
    Disable,
}
