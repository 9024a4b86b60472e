//! Pairing and preference commands.

use serde_json::Value;

use crate::{api, payload_arg0_as_string, storage};

#[tauri::command]
pub async fn settings_get_connection() -> Result<Value, String> {
    Ok(storage::get_connection_info())
}

/// Store pairing credentials. Accepts either the field object or a bare
/// pasted connection string.
#[tauri::command]
pub async fn settings_update_connection(arg0: Option<Value>) -> Result<Value, String> {
    let payload = match arg0 {
        Some(Value::String(s)) => serde_json::json!({ "connection": s }),
        Some(v) => v,
        None => return Err("Missing connection payload".into()),
    };
    storage::update_connection(&payload)
}

#[tauri::command]
pub async fn settings_clear_connection() -> Result<Value, String> {
    storage::clear_connection()
}

/// Probe the back office with the stored pairing (or the one in the
/// payload, during pairing itself).
#[tauri::command]
pub async fn settings_test_connection(arg0: Option<Value>) -> Result<Value, String> {
    let payload = arg0.unwrap_or(Value::Null);
    let backoffice_url = crate::value_str(&payload, &["backofficeUrl", "backoffice_url"])
        .or_else(storage::get_backoffice_url)
        .ok_or("Not paired: missing back office URL")?;
    let session = crate::value_str(&payload, &["sessionCookie", "session_cookie"])
        .or_else(storage::get_session_cookie)
        .ok_or("Not paired: missing admin session")?;

    let result = api::test_connectivity(&backoffice_url, &session).await;
    serde_json::to_value(result).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn settings_get_language(app: tauri::AppHandle) -> Result<Value, String> {
    Ok(serde_json::json!({ "language": crate::app_language(&app) }))
}

#[tauri::command]
pub async fn settings_set_language(
    arg0: Option<Value>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let lang =
        payload_arg0_as_string(arg0, &["language", "lang"]).ok_or("Missing language payload")?;
    let data_dir = crate::app_data_dir(&app)?;
    storage::set_language(&data_dir, &lang)?;
    Ok(serde_json::json!({ "success": true, "language": lang.to_lowercase() }))
}
