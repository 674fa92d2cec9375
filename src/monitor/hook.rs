//! The post-commit hook and the commit log it appends to.

use std::fs;
use std::path::Path;

use crate::error::MonitorError;

const SHA1_HEX_LEN: usize = 40;
const SHA256_HEX_LEN: usize = 64;

/// One `hash: message` line written by the hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub hash: String,
    pub message: String,
}

impl LogRecord {
    /// Parse one log line.
    ///
    /// Commit bodies span several lines. The hook always writes the full
    /// `git rev-parse HEAD` id, so only lines starting with a complete SHA-1
    /// or SHA-256 object id followed by `:` begin a record.
    pub fn parse(line: &str) -> Option<Self> {
        let (hash, message) = line.split_once(':')?;
        let hash = hash.trim();
        let is_object_id = matches!(hash.len(), SHA1_HEX_LEN | SHA256_HEX_LEN)
            && hash.chars().all(|c| c.is_ascii_hexdigit());
        if !is_object_id {
            return None;
        }
        Some(Self {
            hash: hash.to_string(),
            message: message.trim().to_string(),
        })
    }
}

/// Parse every record in the log content, in append order.
pub fn parse_records(content: &str) -> Vec<LogRecord> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(LogRecord::parse)
        .collect()
}

/// Single-quote `text` for `sh`; nothing inside single quotes is expanded.
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

/// Shell script that appends `<hash>: <message>` to `log_path` on every commit.
pub fn hook_script(log_path: &Path) -> String {
    let log_path = shell_quote(&log_path.display().to_string());
    format!(
        "#!/bin/sh\n\
         commit_hash=$(git rev-parse HEAD)\n\
         commit_message=$(git log -1 --pretty=%B)\n\
         echo \"$commit_hash: $commit_message\" >> {log_path}\n"
    )
}

/// Write the hook, replacing whatever was there, and make it executable.
pub fn install_hook(hook_path: &Path, log_path: &Path) -> Result<(), MonitorError> {
    let install_failed = |source: std::io::Error| MonitorError::HookInstall {
        path: hook_path.to_path_buf(),
        source,
    };

    if let Some(dir) = hook_path.parent() {
        fs::create_dir_all(dir).map_err(install_failed)?;
    }
    fs::write(hook_path, hook_script(log_path)).map_err(install_failed)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(hook_path, fs::Permissions::from_mode(0o755)).map_err(install_failed)?;
    }
    Ok(())
}

/// Empty the log, creating it if needed.
pub fn truncate_log(log_path: &Path) -> Result<(), MonitorError> {
    fs::write(log_path, "").map_err(|source| MonitorError::LogIo {
        path: log_path.to_path_buf(),
        source,
    })
}

/// Remove `consumed` from the front of the log, keeping lines appended since
/// it was read. A log that no longer starts with `consumed` is emptied.
pub fn consume_log(log_path: &Path, consumed: &str) -> Result<(), MonitorError> {
    let current = read_log(log_path)?;
    let remainder = current.strip_prefix(consumed).unwrap_or("");
    fs::write(log_path, remainder).map_err(|source| MonitorError::LogIo {
        path: log_path.to_path_buf(),
        source,
    })
}

/// Read the whole log. A missing file reads as empty.
pub fn read_log(log_path: &Path) -> Result<String, MonitorError> {
    match fs::read_to_string(log_path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(source) => Err(MonitorError::LogIo {
            path: log_path.to_path_buf(),
            source,
        }),
    }
}
