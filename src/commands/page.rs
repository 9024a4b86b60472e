//! Page lifecycle commands: snapshot registration, manual region refresh,
//! and explicit notification dismissal from the overlay layer.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::notifications::{Channel, NotificationCenter};
use crate::refresh::{self, PageView};
use crate::{api, payload_arg0_as_string};

/// Snapshot the page the webview just loaded so its regions can be
/// refreshed in place later.
#[tauri::command]
pub async fn page_register(
    arg0: Option<Value>,
    page_view: tauri::State<'_, Arc<PageView>>,
) -> Result<Value, String> {
    let url = payload_arg0_as_string(arg0, &["url", "href"]).ok_or("Missing page URL payload")?;
    let (backoffice_url, session) = crate::backoffice_creds()?;
    let html = api::fetch_page_html(&backoffice_url, &session, &url).await?;
    let captured = page_view.register(&url, &html);
    info!(url = %url, regions = ?captured, "page registered");
    Ok(serde_json::json!({ "success": true, "regions": captured }))
}

/// Operator-triggered refresh of a named region (defaults to the order
/// list). Failures come back in the result rather than as an error so the
/// page is never disturbed.
#[tauri::command]
pub async fn page_refresh_region(
    arg0: Option<Value>,
    app: tauri::AppHandle,
    page_view: tauri::State<'_, Arc<PageView>>,
) -> Result<Value, String> {
    let name = payload_arg0_as_string(arg0, &["region", "name"])
        .unwrap_or_else(|| refresh::ORDER_LIST_REGION.name.to_string());
    let region = refresh::region_by_name(&name).ok_or(format!("Unknown region: {name}"))?;

    match refresh::refresh_region(&app, page_view.inner(), region).await {
        Ok(outcome) => Ok(serde_json::json!({
            "success": true,
            "outcome": outcome.as_label(),
        })),
        Err(e) => {
            warn!(region = region.name, error = %e, "manual region refresh failed");
            Ok(serde_json::json!({ "success": false, "error": e }))
        }
    }
}

#[tauri::command]
pub async fn notification_dismiss(
    arg0: Option<Value>,
    app: tauri::AppHandle,
    center: tauri::State<'_, Arc<NotificationCenter>>,
) -> Result<Value, String> {
    let channel = payload_arg0_as_string(arg0, &["channel"])
        .and_then(|s| Channel::from_value(&s))
        .ok_or("Unknown notification channel")?;
    center.dismiss(&app, channel);
    Ok(serde_json::json!({ "success": true }))
}
