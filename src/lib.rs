//! Order Watch - Tauri v2 Backend
//!
//! This module registers all IPC command handlers that the webview shell
//! calls via `@tauri-apps/api/core::invoke()`, and starts the background
//! order poller. The webview hosts the server-rendered back office pages;
//! everything here is the enhancement layer on top of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// App start time for uptime calculation (epoch seconds).
pub(crate) static APP_START_EPOCH: AtomicU64 = AtomicU64::new(0);

mod actions;
mod api;
mod commands;
mod detail_tools;
mod diagnostics;
mod notifications;
mod poller;
mod print_doc;
mod refresh;
mod storage;

pub(crate) fn value_str(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Commands accept their payload either as a bare string or wrapped in an
/// object under one of several keys, matching what the webview sends.
pub(crate) fn payload_arg0_as_string(
    arg0: Option<serde_json::Value>,
    keys: &[&str],
) -> Option<String> {
    match arg0 {
        Some(serde_json::Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Some(serde_json::Value::Object(obj)) => {
            let payload = serde_json::Value::Object(obj);
            value_str(&payload, keys)
        }
        _ => None,
    }
}

pub(crate) fn app_data_dir(app: &tauri::AppHandle) -> Result<std::path::PathBuf, String> {
    use tauri::Manager;
    app.path()
        .app_data_dir()
        .map_err(|e| format!("Failed to resolve app data dir: {e}"))
}

/// The operator's UI language, from the preferences file.
pub(crate) fn app_language(app: &tauri::AppHandle) -> String {
    match app_data_dir(app) {
        Ok(dir) => storage::get_language(&dir),
        Err(_) => storage::DEFAULT_LANGUAGE.to_string(),
    }
}

/// The stored pairing, or a "not paired" error for the caller to surface.
pub(crate) fn backoffice_creds() -> Result<(String, String), String> {
    let url = storage::get_backoffice_url().ok_or("Not paired: missing back office URL")?;
    let session = storage::get_session_cookie().ok_or("Not paired: missing admin session")?;
    Ok((url, session))
}

// ---------------------------------------------------------------------------
// System clipboard
// ---------------------------------------------------------------------------

pub(crate) fn write_system_clipboard_text(text: &str) -> Result<(), String> {
    #[cfg(target_os = "windows")]
    {
        use std::io::Write;
        use std::process::Stdio;
        let mut child = std::process::Command::new("powershell")
            .args([
                "-NoProfile",
                "-NonInteractive",
                "-Command",
                "$text = [Console]::In.ReadToEnd(); Set-Clipboard -Value $text",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("write clipboard spawn: {e}"))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .map_err(|e| format!("write clipboard stdin: {e}"))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| format!("write clipboard wait: {e}"))?;
        if !output.status.success() {
            let err = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(format!("write clipboard failed: {err}"));
        }
        Ok(())
    }
    #[cfg(target_os = "macos")]
    {
        pipe_to_clipboard_tool("pbcopy", &[], text)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // Wayland first, X11 fallback.
        pipe_to_clipboard_tool("wl-copy", &[], text)
            .or_else(|_| pipe_to_clipboard_tool("xclip", &["-selection", "clipboard"], text))
    }
}

#[cfg(not(target_os = "windows"))]
pub(crate) fn pipe_to_clipboard_tool(tool: &str, args: &[&str], text: &str) -> Result<(), String> {
    use std::io::Write;
    use std::process::Stdio;
    let mut child = std::process::Command::new(tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("write clipboard spawn ({tool}): {e}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .map_err(|e| format!("write clipboard stdin ({tool}): {e}"))?;
    }
    let output = child
        .wait_with_output()
        .map_err(|e| format!("write clipboard wait ({tool}): {e}"))?;
    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(format!("write clipboard failed ({tool}): {err}"));
    }
    Ok(())
}

// ============================================================================
// App entry point
// ============================================================================

pub fn run() {
    // Record start time for uptime tracking
    let epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    APP_START_EPOCH.store(epoch, Ordering::Relaxed);

    // Initialize structured logging (console + rolling file)
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,order_watch_lib=debug"));

    // Prune old log files before setting up the appender
    diagnostics::prune_old_logs();

    // Rolling file appender: creates daily log files in the logs directory
    let log_dir = diagnostics::get_log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "orderwatch");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Keep the guard alive for the lifetime of the app — dropping it flushes logs.
    // We leak it intentionally since the app runs until process exit.
    std::mem::forget(_guard);

    info!("Starting Order Watch v{}", env!("CARGO_PKG_VERSION"));

    tauri::Builder::default()
        .setup(|app| {
            use tauri::Manager;

            let center = Arc::new(notifications::NotificationCenter::new());
            app.manage(center.clone());

            let page_view = Arc::new(refresh::PageView::new());
            app.manage(page_view.clone());

            let poller_state = Arc::new(poller::PollerState::new());
            app.manage(poller_state.clone());

            // Poll cadence: preferences override, default otherwise
            let interval_secs = app
                .path()
                .app_data_dir()
                .ok()
                .and_then(|dir| storage::get_poll_interval_override(&dir))
                .unwrap_or(poller::POLL_INTERVAL_SECS);

            poller::start_order_poller(
                app.handle().clone(),
                poller_state,
                center,
                page_view,
                interval_secs,
            );

            info!("Notification center, page view, and order poller registered");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // App lifecycle
            commands::runtime::app_get_version,
            commands::runtime::system_open_external_url,
            // Orders
            commands::orders::order_copy,
            commands::orders::order_print,
            commands::orders::order_print_button,
            // Page / notifications
            commands::page::page_register,
            commands::page::page_refresh_region,
            commands::page::notification_dismiss,
            // Poller
            commands::poller::poller_get_status,
            commands::poller::poller_stop,
            commands::poller::poller_force_tick,
            // Settings
            commands::settings::settings_get_connection,
            commands::settings::settings_update_connection,
            commands::settings::settings_clear_connection,
            commands::settings::settings_test_connection,
            commands::settings::settings_get_language,
            commands::settings::settings_set_language,
            // Diagnostics
            commands::runtime::diagnostics_get_about,
            commands::runtime::diagnostics_get_system_health,
        ])
        .run(tauri::generate_context!())
        .expect("error while running Order Watch");
}
