//! App runtime commands: version/about info, system health, and opening
//! external URLs in the default browser.

use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::poller::PollerState;
use crate::refresh::PageView;
use crate::{diagnostics, payload_arg0_as_string, storage};

const EXTERNAL_URL_MAX_LEN: usize = 2048;

#[tauri::command]
pub async fn app_get_version() -> Result<Value, String> {
    Ok(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

#[tauri::command]
pub async fn diagnostics_get_about() -> Result<Value, String> {
    let mut about = diagnostics::get_about_info();
    if let Some(obj) = about.as_object_mut() {
        let start = crate::APP_START_EPOCH.load(std::sync::atomic::Ordering::Relaxed);
        let uptime = if start > 0 {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            now.saturating_sub(start)
        } else {
            0
        };
        obj.insert("uptimeSecs".to_string(), serde_json::json!(uptime));
    }
    Ok(about)
}

#[tauri::command]
pub async fn diagnostics_get_system_health(
    poller: tauri::State<'_, Arc<PollerState>>,
    page_view: tauri::State<'_, Arc<PageView>>,
) -> Result<Value, String> {
    Ok(diagnostics::get_system_health(poller.inner(), page_view.inner()))
}

/// Open a URL in the default browser. Only http/https URLs on the paired
/// back office host (or plain localhost) are allowed out.
#[tauri::command]
pub async fn system_open_external_url(arg0: Option<Value>) -> Result<Value, String> {
    let raw = payload_arg0_as_string(arg0, &["url", "href", "target"])
        .ok_or("Missing external URL payload")?;
    let parsed = validate_external_url(&raw, storage::get_backoffice_url().as_deref())?;
    info!(url = %parsed, "opening external URL");
    webbrowser::open(parsed.as_str()).map_err(|e| format!("Failed to open external URL: {e}"))?;
    Ok(serde_json::json!({ "success": true }))
}

fn validate_external_url(url_raw: &str, backoffice_url: Option<&str>) -> Result<Url, String> {
    let trimmed = url_raw.trim();
    if trimmed.is_empty() {
        return Err("External URL cannot be empty".into());
    }
    if trimmed.len() > EXTERNAL_URL_MAX_LEN {
        return Err("External URL is too long".into());
    }

    let parsed = Url::parse(trimmed).map_err(|e| format!("Invalid external URL: {e}"))?;
    let scheme = parsed.scheme().to_ascii_lowercase();
    if scheme != "https" && scheme != "http" {
        return Err("Only http/https URLs are allowed".into());
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err("Credentialed URLs are not allowed".into());
    }

    let host = parsed
        .host_str()
        .ok_or("External URL is missing a host")?
        .to_ascii_lowercase();
    if scheme == "http" && matches!(host.as_str(), "localhost" | "127.0.0.1") {
        return Ok(parsed);
    }

    let allowed_host = backoffice_url
        .map(crate::api::normalize_backoffice_url)
        .as_deref()
        .and_then(|u| Url::parse(u).ok())
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()));
    match allowed_host {
        Some(allowed) if host == allowed => Ok(parsed),
        _ => Err(format!("External host is not allowed: {host}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_urls_are_limited_to_the_backoffice_host() {
        let backoffice = Some("https://shop.example.com");
        assert!(validate_external_url(
            "https://shop.example.com/admin/store/order/7/print/",
            backoffice
        )
        .is_ok());
        assert!(validate_external_url("https://evil.example.com/", backoffice).is_err());
        assert!(validate_external_url("https://shop.example.com/", None).is_err());
    }

    #[test]
    fn localhost_http_is_always_allowed() {
        assert!(validate_external_url("http://localhost:8000/admin/", None).is_ok());
        assert!(validate_external_url("http://127.0.0.1:8000/", None).is_ok());
    }

    #[test]
    fn rejects_bad_schemes_and_credentials() {
        let backoffice = Some("https://shop.example.com");
        assert!(validate_external_url("file:///etc/passwd", backoffice).is_err());
        assert!(
            validate_external_url("https://user:pw@shop.example.com/", backoffice).is_err()
        );
        assert!(validate_external_url("", backoffice).is_err());
        assert!(validate_external_url(&"x".repeat(3000), backoffice).is_err());
    }
}
