//! User-facing failure notifications.

use std::process::{Command, Stdio};

use crate::config::Config;

pub const FAILURE_TITLE: &str = "Backup Failed";

pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

/// Emits notifications as log events on the `notify` target.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) {
        tracing::warn!(target: "notify", "{title}: {message}");
    }
}

/// Runs an external command (e.g. `notify-send`) with the title and message
/// appended to its arguments. Delivery failures are logged and otherwise
/// ignored.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    pub fn new(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, title: &str, message: &str) {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(title)
            .arg(message)
            .stdin(Stdio::null())
            .status();
        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::warn!("Notification command {} exited with {status}", self.program)
            }
            Err(e) => tracing::warn!("Failed to run notification command {}: {e}", self.program),
        }
    }
}

pub fn from_config(config: &Config) -> Box<dyn Notifier> {
    match CommandNotifier::new(&config.notify_command) {
        Some(notifier) => Box::new(notifier),
        None => Box::new(LogNotifier),
    }
}
