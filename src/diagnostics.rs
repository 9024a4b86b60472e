//! Diagnostics module for Order Watch.
//!
//! Provides:
//! - **About info**: version, build timestamp, git SHA, platform
//! - **System health**: pairing state, poller counters, page snapshot
//! - **Log rotation helpers**: used by `lib.rs` to configure rolling log files.

use anyhow::Context as _;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use tracing::warn;

use crate::poller::PollerState;
use crate::refresh::PageView;
use crate::storage;

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;

// ---------------------------------------------------------------------------
// About info
// ---------------------------------------------------------------------------

/// Returns version, build timestamp, git SHA, and platform info.
pub fn get_about_info() -> Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "buildTimestamp": env!("BUILD_TIMESTAMP"),
        "gitSha": env!("BUILD_GIT_SHA"),
        "platform": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "rustVersion": env!("CARGO_PKG_RUST_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// System health
// ---------------------------------------------------------------------------

/// Snapshot of the companion's moving parts for the status screen.
pub fn get_system_health(poller: &PollerState, page_view: &PageView) -> Value {
    json!({
        "paired": storage::is_configured(),
        "poller": poller.snapshot(),
        "page": page_view.snapshot_for_status(),
    })
}

// ---------------------------------------------------------------------------
// Log files
// ---------------------------------------------------------------------------

pub fn get_log_dir() -> PathBuf {
    let base = std::env::var("LOCALAPPDATA")
        .or_else(|_| std::env::var("XDG_DATA_HOME"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            #[cfg(target_os = "windows")]
            {
                PathBuf::from(std::env::var("USERPROFILE").unwrap_or_else(|_| ".".into()))
                    .join("AppData")
                    .join("Local")
            }
            #[cfg(not(target_os = "windows"))]
            {
                PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()))
                    .join(".local")
                    .join("share")
            }
        });
    base.join("com.orderwatch.companion").join("logs")
}

fn collect_log_files(dir: &PathBuf) -> anyhow::Result<Vec<(PathBuf, std::time::SystemTime)>> {
    let mut log_files = Vec::new();
    for entry in fs::read_dir(dir).context("read log dir")? {
        let entry = entry.context("read log dir entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("orderwatch.") || name == "orderwatch.log" {
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(std::time::UNIX_EPOCH);
            log_files.push((path, modified));
        }
    }
    Ok(log_files)
}

/// Prune old log files, keeping only the most recent `MAX_LOG_FILES`.
pub fn prune_old_logs() {
    let log_dir = get_log_dir();
    if !log_dir.exists() {
        return;
    }

    let mut log_files = match collect_log_files(&log_dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(error = %e, "failed to scan log directory");
            return;
        }
    };

    // Sort newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    for (path, _) in log_files.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to prune log file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn about_info_has_required_fields() {
        let info = get_about_info();
        assert!(info.get("version").is_some());
        assert!(info.get("buildTimestamp").is_some());
        assert!(info.get("gitSha").is_some());
        assert!(info.get("platform").is_some());
        assert!(info.get("arch").is_some());
    }

    // get_log_dir reads process-global environment variables.
    #[test]
    #[serial]
    fn log_dir_is_stable() {
        let d1 = get_log_dir();
        let d2 = get_log_dir();
        assert_eq!(d1, d2);
        assert!(d1.to_string_lossy().contains("com.orderwatch.companion"));
    }

    #[test]
    #[serial]
    fn prune_keeps_most_recent_files() {
        let dir = std::env::temp_dir().join(format!("ow_logs_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("com.orderwatch.companion").join("logs")).unwrap();
        let prev = std::env::var("XDG_DATA_HOME").ok();
        let prev_local = std::env::var("LOCALAPPDATA").ok();
        std::env::remove_var("LOCALAPPDATA");
        std::env::set_var("XDG_DATA_HOME", &dir);

        let log_dir = get_log_dir();
        for i in 0..(MAX_LOG_FILES + 3) {
            std::fs::write(log_dir.join(format!("orderwatch.2025-01-{:02}", i + 1)), "x").unwrap();
        }
        // Unrelated files are never pruned
        std::fs::write(log_dir.join("keep.txt"), "x").unwrap();

        prune_old_logs();

        let remaining = std::fs::read_dir(&log_dir).unwrap().count();
        assert_eq!(remaining, MAX_LOG_FILES + 1);
        assert!(log_dir.join("keep.txt").exists());

        match prev {
            Some(v) => std::env::set_var("XDG_DATA_HOME", v),
            None => std::env::remove_var("XDG_DATA_HOME"),
        }
        if let Some(v) = prev_local {
            std::env::set_var("LOCALAPPDATA", v);
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn system_health_reports_all_sections() {
        let poller = PollerState::new();
        let page_view = PageView::new();
        let health = get_system_health(&poller, &page_view);
        assert!(health.get("paired").is_some());
        assert!(health["poller"].get("ticks").is_some());
        assert!(health.get("page").is_some());
    }
}
