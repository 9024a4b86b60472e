//! Secure pairing storage using the OS credential store.
//!
//! The companion authenticates against the back office with the operator's
//! admin session, so the session cookie and back office URL are kept in the
//! platform credential store (DPAPI on Windows, Keychain on macOS, Secret
//! Service on Linux) rather than a flat file. Non-secret preferences live in
//! a JSON file under the app data directory.

use keyring::Entry;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SERVICE_NAME: &str = "order-watch";

// Credential keys
const KEY_BACKOFFICE_URL: &str = "backoffice_url";
const KEY_SESSION_COOKIE: &str = "session_cookie";
const KEY_STORE_NAME: &str = "store_name";

/// All credential keys managed by this module.
const ALL_KEYS: &[&str] = &[KEY_BACKOFFICE_URL, KEY_SESSION_COOKIE, KEY_STORE_NAME];

const PREFS_FILE: &str = "prefs.json";

pub const DEFAULT_LANGUAGE: &str = "ar";

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential from the OS keyring. Returns `None` when the
/// entry does not exist (or the platform returns a "not found" error).
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

/// Store a credential in the OS keyring.
pub fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())?;
    Ok(())
}

/// Delete a credential from the OS keyring. Silently succeeds if the entry
/// does not exist.
pub fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

pub fn has_credential(key: &str) -> bool {
    get_credential(key).is_some()
}

// ---------------------------------------------------------------------------
// High-level API
// ---------------------------------------------------------------------------

/// The companion is considered paired when both the back office URL and the
/// admin session cookie are present in the credential store.
pub fn is_configured() -> bool {
    has_credential(KEY_BACKOFFICE_URL) && has_credential(KEY_SESSION_COOKIE)
}

pub fn get_backoffice_url() -> Option<String> {
    get_credential(KEY_BACKOFFICE_URL)
}

pub fn get_session_cookie() -> Option<String> {
    get_credential(KEY_SESSION_COOKIE)
}

/// Return the stored pairing config as a JSON value matching the shape the
/// pairing screen expects. The session cookie itself is never echoed back.
pub fn get_connection_info() -> Value {
    serde_json::json!({
        "backoffice_url": get_credential(KEY_BACKOFFICE_URL),
        "store_name":     get_credential(KEY_STORE_NAME),
        "paired":         is_configured(),
    })
}

/// Store pairing credentials received from the pairing screen.
///
/// Expected JSON shape (camelCase, matching the webview payload):
/// ```json
/// {
///   "connection": "...",     // pasted connection string, or
///   "backofficeUrl": "...",
///   "sessionCookie": "...",
///   "storeName": "..."       // optional
/// }
/// ```
pub fn update_connection(payload: &Value) -> Result<Value, String> {
    let mut backoffice_url = payload
        .get("backofficeUrl")
        .or_else(|| payload.get("backoffice_url"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let mut session_cookie = payload
        .get("sessionCookie")
        .or_else(|| payload.get("session_cookie"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    if let Some(raw) = payload
        .get("connection")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
    {
        if let Some(decoded_url) = crate::api::extract_backoffice_url_from_connection_string(raw) {
            backoffice_url = Some(decoded_url);
        }
        if let Some(decoded_sid) = crate::api::extract_session_from_connection_string(raw) {
            session_cookie = Some(decoded_sid);
        }
    }

    let backoffice_url = backoffice_url.ok_or("Missing required field: backofficeUrl")?;
    let session_cookie = session_cookie.ok_or("Missing required field: sessionCookie")?;

    let normalized = crate::api::normalize_backoffice_url(&backoffice_url);
    if normalized.trim().is_empty() {
        return Err("Missing required field: backofficeUrl".to_string());
    }
    set_credential(KEY_BACKOFFICE_URL, normalized.trim())?;
    set_credential(KEY_SESSION_COOKIE, session_cookie.trim())?;

    if let Some(name) = payload
        .get("storeName")
        .or_else(|| payload.get("store_name"))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
    {
        set_credential(KEY_STORE_NAME, name.trim())?;
    }

    info!(backoffice_url = %normalized, "pairing credentials updated");
    Ok(serde_json::json!({ "success": true }))
}

/// Delete every stored credential (unpair).
pub fn clear_connection() -> Result<Value, String> {
    info!("clearing pairing – deleting all credentials");
    for key in ALL_KEYS {
        delete_credential(key)?;
    }
    Ok(serde_json::json!({ "success": true }))
}

// ---------------------------------------------------------------------------
// Preferences file
// ---------------------------------------------------------------------------

fn prefs_path(app_data_dir: &Path) -> PathBuf {
    app_data_dir.join(PREFS_FILE)
}

/// Read the preferences file. A missing or unreadable file yields an empty
/// object so callers only deal with defaults.
pub fn read_prefs(app_data_dir: &Path) -> Value {
    let path = prefs_path(app_data_dir);
    match std::fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str::<Value>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "prefs file is not valid JSON, using defaults");
            serde_json::json!({})
        }),
        Err(_) => serde_json::json!({}),
    }
}

pub fn write_prefs(app_data_dir: &Path, prefs: &Value) -> Result<(), String> {
    std::fs::create_dir_all(app_data_dir).map_err(|e| format!("create data dir: {e}"))?;
    let text = serde_json::to_string_pretty(prefs).map_err(|e| format!("serialize prefs: {e}"))?;
    std::fs::write(prefs_path(app_data_dir), text).map_err(|e| format!("write prefs: {e}"))
}

/// Merge a single preference key into the file.
pub fn set_pref(app_data_dir: &Path, key: &str, value: Value) -> Result<(), String> {
    let mut prefs = read_prefs(app_data_dir);
    if let Some(obj) = prefs.as_object_mut() {
        obj.insert(key.to_string(), value);
    }
    write_prefs(app_data_dir, &prefs)
}

/// UI language for notification strings. The back office audience is
/// Arabic-first, so that is the default.
pub fn get_language(app_data_dir: &Path) -> String {
    read_prefs(app_data_dir)
        .get("language")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| s == "ar" || s == "en")
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

pub fn set_language(app_data_dir: &Path, lang: &str) -> Result<(), String> {
    let lang = lang.trim().to_ascii_lowercase();
    if lang != "ar" && lang != "en" {
        return Err(format!("Unsupported language: {lang}"));
    }
    set_pref(app_data_dir, "language", Value::String(lang))
}

/// Poll cadence override in seconds, if present and sane.
pub fn get_poll_interval_override(app_data_dir: &Path) -> Option<u64> {
    read_prefs(app_data_dir)
        .get("poll_interval_secs")
        .and_then(Value::as_u64)
        .filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_data_dir(tag: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("order-watch-test-{tag}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn missing_prefs_file_yields_defaults() {
        let dir = temp_data_dir("prefs-missing");
        assert_eq!(read_prefs(&dir), serde_json::json!({}));
        assert_eq!(get_language(&dir), "ar");
        assert_eq!(get_poll_interval_override(&dir), None);
    }

    #[test]
    fn language_round_trip_and_validation() {
        let dir = temp_data_dir("prefs-lang");
        set_language(&dir, "EN").expect("set language");
        assert_eq!(get_language(&dir), "en");
        assert!(set_language(&dir, "fr").is_err());
        // Rejected value must not clobber the stored one
        assert_eq!(get_language(&dir), "en");
    }

    #[test]
    fn poll_interval_override_ignores_garbage() {
        let dir = temp_data_dir("prefs-interval");
        set_pref(&dir, "poll_interval_secs", serde_json::json!(30)).unwrap();
        assert_eq!(get_poll_interval_override(&dir), Some(30));
        set_pref(&dir, "poll_interval_secs", serde_json::json!("soon")).unwrap();
        assert_eq!(get_poll_interval_override(&dir), None);
        set_pref(&dir, "poll_interval_secs", serde_json::json!(0)).unwrap();
        assert_eq!(get_poll_interval_override(&dir), None);
    }

    #[test]
    fn corrupt_prefs_file_is_replaced_on_write() {
        let dir = temp_data_dir("prefs-corrupt");
        std::fs::write(dir.join(PREFS_FILE), "not json {").unwrap();
        assert_eq!(read_prefs(&dir), serde_json::json!({}));
        set_language(&dir, "en").expect("set language over corrupt file");
        assert_eq!(get_language(&dir), "en");
    }

    #[test]
    fn update_connection_requires_both_fields() {
        let err = update_connection(&serde_json::json!({ "backofficeUrl": "https://shop.example" }))
            .unwrap_err();
        assert!(err.contains("sessionCookie"));
        let err = update_connection(&serde_json::json!({ "sessionCookie": "abc" })).unwrap_err();
        assert!(err.contains("backofficeUrl"));
    }
}
