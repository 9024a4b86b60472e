//! Back office HTTP client.
//!
//! Provides session-authenticated HTTP communication with the store's admin
//! back office, used for connectivity testing, the new-order check, order
//! actions, and fetching rendered admin pages for partial refresh.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::info;

/// Timeout used for the lightweight connectivity test. Operational fetches
/// (poll tick, page fetch, order actions) carry no timeout: an unresponsive
/// endpoint stalls that one tick or dispatch without blocking the others.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoint polled for newly created orders.
pub const CHECK_NEW_ORDERS_PATH: &str = "/admin/store/order/check-new-orders/";

/// Per-order action endpoint (`action` is `copy` or `print`).
pub fn order_action_path(order_id: &str, action: &str) -> String {
    format!("/api/orders/{order_id}/{action}/")
}

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the back office URL:
/// - strip trailing slashes
/// - strip a trailing `/admin` segment (operators paste the admin page URL)
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_backoffice_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    // Strip trailing /admin
    if url.ends_with("/admin") {
        url.truncate(url.len() - 6);
    }

    // Strip trailing slashes again (in case "/admin/" was present)
    while url.ends_with('/') {
        url.pop();
    }

    url
}

fn decode_connection_string_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<Value>(trimmed).ok();
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('{') {
        return serde_json::from_str::<Value>(&compact).ok();
    }
    if compact.len() < 20 {
        return None;
    }

    let base64 = compact.replace('-', "+").replace('_', "/");
    let padded = format!(
        "{}{}",
        base64,
        "=".repeat((4usize.wrapping_sub(base64.len() % 4)) % 4)
    );
    let decoded = BASE64_STANDARD.decode(padded).ok()?;
    serde_json::from_slice::<Value>(&decoded).ok()
}

pub fn extract_backoffice_url_from_connection_string(raw: &str) -> Option<String> {
    decode_connection_string_payload(raw)
        .and_then(|v| {
            v.get("url")
                .and_then(Value::as_str)
                .map(normalize_backoffice_url)
        })
        .filter(|s| !s.is_empty())
}

pub fn extract_session_from_connection_string(raw: &str) -> Option<String> {
    decode_connection_string_payload(raw)
        .and_then(|v| {
            v.get("sid")
                .or_else(|| v.get("session"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
pub(crate) fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach back office at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid back office URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
pub(crate) fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 | 403 => "Admin session is invalid or expired".to_string(),
        404 => "Back office endpoint not found".to_string(),
        s if s >= 500 => format!("Back office server error (HTTP {s})"),
        s => format!("Unexpected response from back office (HTTP {s})"),
    }
}

fn session_cookie_header(session: &str) -> String {
    // A bare value is the session id; a value containing '=' is taken as a
    // complete cookie string pasted from the browser.
    if session.contains('=') {
        session.trim().to_string()
    } else {
        format!("sessionid={}", session.trim())
    }
}

// ---------------------------------------------------------------------------
// Connectivity test
// ---------------------------------------------------------------------------

/// Result of a connectivity test.
#[derive(serde::Serialize)]
pub struct ConnectivityResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Test connectivity to the back office by hitting the new-order check
/// endpoint, which also validates that the admin session is accepted.
pub async fn test_connectivity(backoffice_url: &str, session: &str) -> ConnectivityResult {
    let url = normalize_backoffice_url(backoffice_url);
    let check_url = format!("{url}{CHECK_NEW_ORDERS_PATH}");

    let client = match Client::builder().timeout(CONNECTIVITY_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(format!("Failed to create HTTP client: {e}")),
            };
        }
    };

    let start = Instant::now();

    let resp = match client
        .get(&check_url)
        .header("Cookie", session_cookie_header(session))
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(friendly_error(&url, &e)),
            };
        }
    };

    let latency = start.elapsed().as_millis() as u64;
    let status = resp.status();

    if status.is_success() {
        info!(latency_ms = latency, "connectivity test passed");
        ConnectivityResult {
            success: true,
            latency_ms: Some(latency),
            error: None,
        }
    } else {
        ConnectivityResult {
            success: false,
            latency_ms: Some(latency),
            error: Some(status_error(status)),
        }
    }
}

// ---------------------------------------------------------------------------
// Authenticated fetches
// ---------------------------------------------------------------------------

/// Perform an authenticated GET against a back office JSON endpoint.
///
/// `path` should include the leading slash, e.g. `/api/orders/12/copy/`.
pub async fn fetch_json(backoffice_url: &str, session: &str, path: &str) -> Result<Value, String> {
    let base = normalize_backoffice_url(backoffice_url);
    let full_url = format!("{base}{path}");

    let client = Client::builder()
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

    let resp = client
        .get(&full_url)
        .header("Cookie", session_cookie_header(session))
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| friendly_error(&base, &e))?;
    let status = resp.status();

    if !status.is_success() {
        // Preserve any server-provided detail for the log.
        let body_text = resp.text().await.unwrap_or_default();
        let detail = if let Ok(json) = serde_json::from_str::<Value>(&body_text) {
            let message = json
                .get("error")
                .or_else(|| json.get("message"))
                .and_then(Value::as_str)
                .map(|s| s.to_string())
                .unwrap_or_else(|| status_error(status));
            format!("{message} (HTTP {})", status.as_u16())
        } else {
            format!("{} (HTTP {})", status_error(status), status.as_u16())
        };
        return Err(detail);
    }

    let body_text = resp.text().await.unwrap_or_default();
    if body_text.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body_text).map_err(|e| format!("Invalid JSON from back office: {e}"))
}

/// Fetch a rendered admin page as HTML, for region extraction. `page_url` is
/// absolute (the URL the webview currently shows), and must live under the
/// paired back office origin.
pub async fn fetch_page_html(
    backoffice_url: &str,
    session: &str,
    page_url: &str,
) -> Result<String, String> {
    let base = normalize_backoffice_url(backoffice_url);
    if !page_url.starts_with(&base) {
        return Err(format!(
            "Page URL {page_url} is outside the back office origin"
        ));
    }

    let client = Client::builder()
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

    let resp = client
        .get(page_url)
        .header("Cookie", session_cookie_header(session))
        .header("Accept", "text/html")
        .send()
        .await
        .map_err(|e| friendly_error(&base, &e))?;
    let status = resp.status();

    if !status.is_success() {
        return Err(format!(
            "{} (HTTP {})",
            status_error(status),
            status.as_u16()
        ));
    }

    resp.text()
        .await
        .map_err(|e| format!("Failed to read page body: {e}"))
}
