//! Background new-order poller.
//!
//! A fixed-cadence loop that asks the back office whether new orders have
//! arrived since the operator last looked. A positive answer raises the
//! new-order notification and refreshes the order-list region; zero is
//! silent. Ticks are spawned independently, so a stalled response never
//! delays the cadence — the notification center's per-channel replace rule
//! bounds the visible effect to a single message however many ticks resolve
//! together.

use chrono::Utc;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::notifications::{Channel, NotificationCenter, NEW_ORDER_TTL};
use crate::refresh::{PageView, ORDER_LIST_REGION};
use crate::{api, storage};

/// Default cadence between new-order checks.
pub const POLL_INTERVAL_SECS: u64 = 10;
const POLL_INTERVAL_FLOOR_SECS: u64 = 5;

/// One poll response from the back office.
#[derive(Debug, Deserialize)]
pub struct PollResult {
    pub new_orders: u64,
}

/// What a resolved poll response asks the companion to do.
#[derive(Debug, PartialEq, Eq)]
pub enum TickPlan {
    NoChange,
    Announce { count: u64 },
}

pub fn plan_for(result: &PollResult) -> TickPlan {
    if result.new_orders >= 1 {
        TickPlan::Announce {
            count: result.new_orders,
        }
    } else {
        TickPlan::NoChange
    }
}

/// Shared poller state: the stop handle plus counters for the status command.
pub struct PollerState {
    pub is_running: Arc<AtomicBool>,
    pub interval_secs: AtomicU64,
    pub ticks: AtomicU64,
    pub detections: AtomicU64,
    pub last_tick: Mutex<Option<String>>,
    pub last_error: Mutex<Option<String>>,
}

impl PollerState {
    pub fn new() -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
            interval_secs: AtomicU64::new(POLL_INTERVAL_SECS),
            ticks: AtomicU64::new(0),
            detections: AtomicU64::new(0),
            last_tick: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "is_running": self.is_running.load(Ordering::SeqCst),
            "interval_secs": self.interval_secs.load(Ordering::Relaxed),
            "ticks": self.ticks.load(Ordering::Relaxed),
            "detections": self.detections.load(Ordering::Relaxed),
            "last_tick": self.last_tick.lock().unwrap_or_else(|p| p.into_inner()).clone(),
            "last_error": self.last_error.lock().unwrap_or_else(|p| p.into_inner()).clone(),
        })
    }

    fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let mut last_tick = self.last_tick.lock().unwrap_or_else(|p| p.into_inner());
        *last_tick = Some(Utc::now().to_rfc3339());
    }

    fn record_error(&self, error: Option<String>) {
        let mut last_error = self.last_error.lock().unwrap_or_else(|p| p.into_inner());
        *last_error = error;
    }
}

impl Default for PollerState {
    fn default() -> Self {
        Self::new()
    }
}

/// The localized new-order announcement, count embedded.
pub fn new_order_message(count: u64, lang: &str) -> String {
    match lang {
        "en" => format!("📢 You have {count} new orders!"),
        _ => format!("📢 لديك {count} طلبات جديدة!"),
    }
}

/// Query the new-order check endpoint and decode the count.
pub async fn check_new_orders(backoffice_url: &str, session: &str) -> Result<PollResult, String> {
    let body = api::fetch_json(backoffice_url, session, api::CHECK_NEW_ORDERS_PATH).await?;
    serde_json::from_value(body).map_err(|e| format!("Poll response missing new_orders: {e}"))
}

/// Start the poll loop. Runs for the life of the app unless stopped through
/// `PollerState::is_running`; every iteration spawns its tick independently
/// so overlapping ticks are allowed.
pub fn start_order_poller(
    app: tauri::AppHandle,
    state: Arc<PollerState>,
    center: Arc<NotificationCenter>,
    page_view: Arc<PageView>,
    interval_secs: u64,
) {
    let cadence = Duration::from_secs(interval_secs.max(POLL_INTERVAL_FLOOR_SECS));
    state.interval_secs.store(cadence.as_secs(), Ordering::Relaxed);
    let is_running = state.is_running.clone();
    is_running.store(true, Ordering::SeqCst);

    tauri::async_runtime::spawn(async move {
        info!(interval_secs = cadence.as_secs(), "Order poller started");

        loop {
            tokio::time::sleep(cadence).await;

            if !is_running.load(Ordering::SeqCst) {
                info!("Order poller stopped");
                break;
            }

            if !storage::is_configured() {
                debug!("Not paired yet; skipping poll tick");
                continue;
            }

            let app = app.clone();
            let state = state.clone();
            let center = center.clone();
            let page_view = page_view.clone();
            tauri::async_runtime::spawn(async move {
                run_poll_tick(&app, &state, &center, &page_view).await;
            });
        }
    });
}

/// One tick: check the endpoint, and on a positive count raise the
/// notification then refresh the order list. Failures are logged and skipped;
/// the loop never halts on a bad tick.
pub async fn run_poll_tick(
    app: &tauri::AppHandle,
    state: &Arc<PollerState>,
    center: &Arc<NotificationCenter>,
    page_view: &Arc<PageView>,
) {
    state.record_tick();

    let (backoffice_url, session) = match crate::backoffice_creds() {
        Ok(creds) => creds,
        Err(e) => {
            debug!(error = %e, "poll tick skipped");
            return;
        }
    };

    match check_new_orders(&backoffice_url, &session).await {
        Ok(result) => {
            state.record_error(None);
            match plan_for(&result) {
                TickPlan::NoChange => {
                    debug!("no new orders");
                }
                TickPlan::Announce { count } => {
                    info!(count, "new orders detected");
                    state.detections.fetch_add(1, Ordering::Relaxed);

                    let lang = crate::app_language(app);
                    center.show(
                        app,
                        Channel::NewOrder,
                        &new_order_message(count, &lang),
                        NEW_ORDER_TTL,
                    );

                    match crate::refresh::refresh_region(app, page_view, &ORDER_LIST_REGION).await {
                        Ok(outcome) => {
                            debug!(outcome = ?outcome, "order list refresh finished")
                        }
                        Err(e) => warn!(error = %e, "order list refresh failed"),
                    }
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "poll tick failed");
            state.record_error(Some(e));
        }
    }
}
