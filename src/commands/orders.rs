//! Order action commands: copy, print, and the detail-page print button.

use serde_json::Value;
use std::sync::Arc;

use crate::actions::{self, ActionKind, SystemEffects};
use crate::notifications::NotificationCenter;
use crate::{detail_tools, payload_arg0_as_string};

fn parse_order_id_payload(arg0: Option<Value>) -> Result<String, String> {
    payload_arg0_as_string(arg0, &["orderId", "order_id", "id"]).ok_or("Missing orderId".into())
}

#[tauri::command]
pub async fn order_copy(
    arg0: Option<Value>,
    app: tauri::AppHandle,
    center: tauri::State<'_, Arc<NotificationCenter>>,
) -> Result<Value, String> {
    let order_id = parse_order_id_payload(arg0)?;
    let effects = SystemEffects {
        app_data_dir: crate::app_data_dir(&app)?,
    };
    Ok(actions::dispatch(&app, center.inner(), &effects, &order_id, ActionKind::Copy).await)
}

#[tauri::command]
pub async fn order_print(
    arg0: Option<Value>,
    app: tauri::AppHandle,
    center: tauri::State<'_, Arc<NotificationCenter>>,
) -> Result<Value, String> {
    let order_id = parse_order_id_payload(arg0)?;
    let effects = SystemEffects {
        app_data_dir: crate::app_data_dir(&app)?,
    };
    Ok(actions::dispatch(&app, center.inner(), &effects, &order_id, ActionKind::Print).await)
}

/// Print-button descriptor for the current path; `null` off detail pages.
#[tauri::command]
pub async fn order_print_button(
    arg0: Option<Value>,
    app: tauri::AppHandle,
) -> Result<Value, String> {
    let path = payload_arg0_as_string(arg0, &["path", "pathname"]).ok_or("Missing path payload")?;
    let lang = crate::app_language(&app);
    match detail_tools::print_button_for_path(&path, &lang) {
        Some(button) => serde_json::to_value(button).map_err(|e| e.to_string()),
        None => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_accepts_string_and_object_payloads() {
        assert_eq!(
            parse_order_id_payload(Some(serde_json::json!("119"))).unwrap(),
            "119"
        );
        assert_eq!(
            parse_order_id_payload(Some(serde_json::json!({ "orderId": "7" }))).unwrap(),
            "7"
        );
        assert_eq!(
            parse_order_id_payload(Some(serde_json::json!({ "order_id": " 8 " }))).unwrap(),
            "8"
        );
        assert!(parse_order_id_payload(None).is_err());
        assert!(parse_order_id_payload(Some(serde_json::json!({}))).is_err());
    }
}
