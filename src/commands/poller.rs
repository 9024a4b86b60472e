//! Poller lifecycle and observability commands.

use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use crate::notifications::NotificationCenter;
use crate::poller::{self, PollerState};
use crate::refresh::PageView;

#[tauri::command]
pub async fn poller_get_status(
    state: tauri::State<'_, Arc<PollerState>>,
) -> Result<Value, String> {
    Ok(state.snapshot())
}

/// Flip the stop handle; the loop observes it on its next iteration and
/// exits. Ticks already in flight finish on their own.
#[tauri::command]
pub async fn poller_stop(state: tauri::State<'_, Arc<PollerState>>) -> Result<Value, String> {
    info!("poller stop requested");
    state.is_running.store(false, Ordering::SeqCst);
    Ok(serde_json::json!({ "success": true }))
}

/// Run one tick immediately, outside the cadence. Used by the status screen's
/// "check now" button.
#[tauri::command]
pub async fn poller_force_tick(
    app: tauri::AppHandle,
    state: tauri::State<'_, Arc<PollerState>>,
    center: tauri::State<'_, Arc<NotificationCenter>>,
    page_view: tauri::State<'_, Arc<PageView>>,
) -> Result<Value, String> {
    poller::run_poll_tick(&app, state.inner(), center.inner(), page_view.inner()).await;
    Ok(state.snapshot())
}
