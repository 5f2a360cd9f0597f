use std::io::Write;

use rollcall_core::{Notice, NoticeLevel, Notifier};

/// Prints one line per notice on stdout.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl TerminalNotifier {
    pub fn new() -> Self {
        Self
    }
}

pub fn format_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Success => "OK",
        NoticeLevel::Queued => "SAVED",
        NoticeLevel::Error => "ERROR",
        NoticeLevel::Info => "INFO",
    };
    format!("{tag:<5} {}", notice.text)
}

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: Notice) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", format_notice(&notice));
        let _ = stdout.flush();
    }
}
