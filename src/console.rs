//! User-facing terminal output: status lines and a single loader.

use std::io::{IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SPINNER_INTERVAL: Duration = Duration::from_millis(80);

/// Output surface shared by the selection engine and the monitor.
///
/// At most one loader is visible; `show_loader` while one is running only
/// replaces its text.
#[cfg_attr(test, mockall::automock)]
pub trait Console: Send + Sync {
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    fn show_loader(&self, text: &str);
    fn stop_loader(&self);
    fn clear(&self);
}

struct Loader {
    text: Arc<Mutex<String>>,
    task: Option<JoinHandle<()>>,
}

/// Console writing to stdout/stderr, with an animated loader on a TTY.
pub struct TerminalConsole {
    loader: Mutex<Option<Loader>>,
    animate: bool,
}

impl TerminalConsole {
    pub fn new() -> Self {
        Self {
            loader: Mutex::new(None),
            animate: std::io::stderr().is_terminal(),
        }
    }

    fn clear_loader_line(&self) {
        if self.animate {
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "\r\x1b[2K");
            let _ = stderr.flush();
        }
    }

    /// Print a line without tearing a running loader.
    fn print_line(&self, line: &str, to_stderr: bool) {
        let guard = self.loader.lock().unwrap_or_else(|e| e.into_inner());
        if guard.as_ref().is_some_and(|l| l.task.is_some()) {
            self.clear_loader_line();
        }
        if to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
}

impl Default for TerminalConsole {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_spinner(text: Arc<Mutex<String>>) -> Option<JoinHandle<()>> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    Some(handle.spawn(async move {
        let mut interval = tokio::time::interval(SPINNER_INTERVAL);
        for frame in SPINNER_FRAMES.iter().cycle() {
            interval.tick().await;
            let current = text.lock().map(|t| t.clone()).unwrap_or_default();
            let mut stderr = std::io::stderr();
            let _ = write!(stderr, "\r\x1b[2K{frame} {current}");
            let _ = stderr.flush();
        }
    }))
}

impl Console for TerminalConsole {
    fn info(&self, message: &str) {
        self.print_line(message, false);
    }

    fn success(&self, message: &str) {
        self.print_line(&format!("✔ {message}"), false);
    }

    fn warn(&self, message: &str) {
        self.print_line(&format!("⚠ {message}"), true);
    }

    fn error(&self, message: &str) {
        self.print_line(&format!("✖ {message}"), true);
    }

    fn show_loader(&self, text: &str) {
        let mut guard = self.loader.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(loader) = guard.as_ref() {
            if let Ok(mut current) = loader.text.lock() {
                *current = text.to_string();
            }
            return;
        }

        let shared = Arc::new(Mutex::new(text.to_string()));
        let task = if self.animate {
            spawn_spinner(Arc::clone(&shared))
        } else {
            None
        };
        if task.is_none() {
            eprintln!("{text}");
        }
        *guard = Some(Loader { text: shared, task });
    }

    fn stop_loader(&self) {
        let mut guard = self.loader.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(loader) = guard.take()
            && let Some(task) = loader.task
        {
            task.abort();
            self.clear_loader_line();
        }
    }

    fn clear(&self) {
        if std::io::stdout().is_terminal() {
            print!("\x1b[2J\x1b[H");
            let _ = std::io::stdout().flush();
        }
    }
}

impl Drop for TerminalConsole {
    fn drop(&mut self) {
        self.stop_loader();
    }
}
