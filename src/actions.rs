//! Order action dispatcher.
//!
//! Operator-triggered "copy order" and "print order" operations: call the
//! per-order endpoint, perform the kind-specific platform effect (clipboard
//! write or print-context open), and report the outcome through the
//! action-result notification channel. Every failure path ends in a reported
//! notification; nothing here propagates an error to the invoking button
//! beyond the returned outcome value.
//!
//! Platform capabilities sit behind [`ActionEffects`] so the flow around
//! them stays testable; [`SystemEffects`] is the production implementation.

use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::notifications::{Channel, NotificationCenter, ACTION_FAILURE_TTL, ACTION_SUCCESS_TTL};
use crate::print_doc::{render_print_html, OrderPrintDoc};
use crate::{api, storage};

/// The two operator actions on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Copy,
    Print,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Copy => "copy",
            ActionKind::Print => "print",
        }
    }
}

/// Dispatcher failure taxonomy. Each variant carries its own loggable
/// description; the user-facing text comes from [`ActionError::user_message`].
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("response missing expected field: {0}")]
    ShapeMismatch(String),
    #[error("platform permission denied: {0}")]
    PlatformPermission(String),
    #[error("back office reported failure: {0}")]
    ServerReported(String),
}

impl ActionError {
    /// Localized operator-facing message. Server-reported failures carry the
    /// server's own message; everything else collapses to a generic line and
    /// keeps its detail in the log.
    pub fn user_message(&self, kind: ActionKind, lang: &str) -> String {
        let verb_ar = match kind {
            ActionKind::Copy => "نسخ",
            ActionKind::Print => "طباعة",
        };
        let verb_en = kind.as_str();
        match (self, lang) {
            (ActionError::ServerReported(msg), "en") => {
                format!("Failed to {verb_en} order: {msg}")
            }
            (ActionError::ServerReported(msg), _) => {
                format!("حدث خطأ في {verb_ar} الطلب: {msg}")
            }
            (_, "en") => format!("Failed to {verb_en} order"),
            (_, _) => format!("حدث خطأ في {verb_ar} الطلب"),
        }
    }
}

pub fn success_message(kind: ActionKind, lang: &str) -> String {
    match (kind, lang) {
        (ActionKind::Copy, "en") => "Order copied successfully!".to_string(),
        (ActionKind::Copy, _) => "تم نسخ الطلب بنجاح!".to_string(),
        (ActionKind::Print, "en") => "Order sent to print!".to_string(),
        (ActionKind::Print, _) => "تم إرسال الطلب للطباعة!".to_string(),
    }
}

/// The back office's action response contract.
#[derive(Debug, Deserialize)]
struct OrderActionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    order_text: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Platform capabilities the dispatcher needs: a clipboard and a fresh
/// browsing context for the print document.
pub trait ActionEffects: Send + Sync {
    fn write_clipboard(&self, text: &str) -> Result<(), String>;
    /// Open `html` in a new browsing context; the document itself invokes
    /// the print dialog on load.
    fn open_print_context(&self, html: &str) -> Result<(), String>;
}

/// Production effects: OS clipboard and the default browser as the print
/// context, fed from a file under the app data directory.
pub struct SystemEffects {
    pub app_data_dir: PathBuf,
}

impl ActionEffects for SystemEffects {
    fn write_clipboard(&self, text: &str) -> Result<(), String> {
        crate::write_system_clipboard_text(text)
    }

    fn open_print_context(&self, html: &str) -> Result<(), String> {
        let print_dir = self.app_data_dir.join("print");
        std::fs::create_dir_all(&print_dir).map_err(|e| format!("create print dir: {e}"))?;
        // One file per print so concurrent dispatches never clobber each other.
        let path = print_dir.join(format!("order-print-{}.html", Uuid::new_v4()));
        std::fs::write(&path, html).map_err(|e| format!("write print document: {e}"))?;
        let url = format!("file://{}", path.display());
        webbrowser::open(&url).map_err(|e| format!("open print context: {e}"))
    }
}

/// Run an action end to end and report the outcome on the action-result
/// channel. Returns the outcome as a JSON value for the invoking button.
pub async fn dispatch(
    app: &tauri::AppHandle,
    center: &Arc<NotificationCenter>,
    effects: &dyn ActionEffects,
    order_id: &str,
    kind: ActionKind,
) -> Value {
    let lang = crate::app_language(app);
    match run_action(effects, order_id, kind).await {
        Ok(()) => {
            info!(order_id, action = kind.as_str(), "order action completed");
            center.show(
                app,
                Channel::ActionResult,
                &success_message(kind, &lang),
                ACTION_SUCCESS_TTL,
            );
            serde_json::json!({ "success": true })
        }
        Err(e) => {
            warn!(order_id, action = kind.as_str(), error = %e, "order action failed");
            center.show(
                app,
                Channel::ActionResult,
                &e.user_message(kind, &lang),
                ACTION_FAILURE_TTL,
            );
            serde_json::json!({ "success": false, "error": e.to_string() })
        }
    }
}

/// Steps 1 and 2 of a dispatch: endpoint call, then the kind-specific effect.
pub async fn run_action(
    effects: &dyn ActionEffects,
    order_id: &str,
    kind: ActionKind,
) -> Result<(), ActionError> {
    let backoffice_url = storage::get_backoffice_url()
        .ok_or_else(|| ActionError::Network("Not paired: missing back office URL".into()))?;
    let session = storage::get_session_cookie()
        .ok_or_else(|| ActionError::Network("Not paired: missing admin session".into()))?;

    run_action_against(effects, &backoffice_url, &session, order_id, kind).await
}

pub(crate) async fn run_action_against(
    effects: &dyn ActionEffects,
    backoffice_url: &str,
    session: &str,
    order_id: &str,
    kind: ActionKind,
) -> Result<(), ActionError> {
    let path = api::order_action_path(order_id, kind.as_str());
    let body = api::fetch_json(backoffice_url, session, &path)
        .await
        .map_err(ActionError::Network)?;

    let resp: OrderActionResponse = serde_json::from_value(body)
        .map_err(|e| ActionError::ShapeMismatch(format!("action response: {e}")))?;

    if !resp.success {
        return Err(ActionError::ServerReported(
            resp.error
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "unspecified error".to_string()),
        ));
    }

    match kind {
        ActionKind::Copy => {
            let text = resp
                .order_text
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ActionError::ShapeMismatch("copy response missing order_text".into()))?;
            effects
                .write_clipboard(&text)
                .map_err(ActionError::PlatformPermission)?;
        }
        ActionKind::Print => {
            let payload = resp
                .data
                .ok_or_else(|| ActionError::ShapeMismatch("print response missing data".into()))?;
            let doc = OrderPrintDoc::from_payload(payload).map_err(ActionError::ShapeMismatch)?;
            effects
                .open_print_context(&render_print_html(&doc))
                .map_err(ActionError::PlatformPermission)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEffects {
        clipboard: Mutex<Vec<String>>,
        print_contexts: AtomicUsize,
        last_print_html: Mutex<Option<String>>,
        deny_clipboard: bool,
        deny_print: bool,
    }

    impl ActionEffects for RecordingEffects {
        fn write_clipboard(&self, text: &str) -> Result<(), String> {
            if self.deny_clipboard {
                return Err("clipboard access denied".into());
            }
            self.clipboard.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn open_print_context(&self, html: &str) -> Result<(), String> {
            if self.deny_print {
                return Err("popup blocked".into());
            }
            self.print_contexts.fetch_add(1, Ordering::SeqCst);
            *self.last_print_html.lock().unwrap() = Some(html.to_string());
            Ok(())
        }
    }

    async fn mock_action(
        server: &mut mockito::ServerGuard,
        order_id: &str,
        action: &str,
        status: usize,
        body: &str,
    ) {
        server
            .mock("GET", format!("/api/orders/{order_id}/{action}/").as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn copy_success_writes_clipboard() {
        let mut server = mockito::Server::new_async().await;
        mock_action(&mut server, "12", "copy", 200, r#"{"success":true,"order_text":"ABC"}"#).await;

        let effects = RecordingEffects::default();
        run_action_against(&effects, &server.url(), "s1", "12", ActionKind::Copy)
            .await
            .expect("copy ok");

        assert_eq!(*effects.clipboard.lock().unwrap(), vec!["ABC".to_string()]);
        assert_eq!(effects.print_contexts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn copy_server_failure_reports_message_and_skips_clipboard() {
        let mut server = mockito::Server::new_async().await;
        mock_action(&mut server, "12", "copy", 200, r#"{"success":false,"error":"X"}"#).await;

        let effects = RecordingEffects::default();
        let err = run_action_against(&effects, &server.url(), "s1", "12", ActionKind::Copy)
            .await
            .unwrap_err();

        match &err {
            ActionError::ServerReported(msg) => assert_eq!(msg, "X"),
            other => panic!("expected ServerReported, got {other:?}"),
        }
        assert!(err.user_message(ActionKind::Copy, "ar").contains('X'));
        assert!(effects.clipboard.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn copy_without_order_text_is_a_shape_mismatch() {
        let mut server = mockito::Server::new_async().await;
        mock_action(&mut server, "12", "copy", 200, r#"{"success":true}"#).await;

        let effects = RecordingEffects::default();
        let err = run_action_against(&effects, &server.url(), "s1", "12", ActionKind::Copy)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::ShapeMismatch(_)));
        assert!(effects.clipboard.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn print_success_opens_exactly_one_context() {
        let mut server = mockito::Server::new_async().await;
        mock_action(
            &mut server,
            "7",
            "print",
            200,
            r#"{"success":true,"data":{"id":7,"customer":"A","items":[],"total_price":10.0}}"#,
        )
        .await;

        let effects = RecordingEffects::default();
        run_action_against(&effects, &server.url(), "s1", "7", ActionKind::Print)
            .await
            .expect("print ok");

        assert_eq!(effects.print_contexts.load(Ordering::SeqCst), 1);
        let html = effects.last_print_html.lock().unwrap().clone().unwrap();
        assert!(html.contains("#7"));
        assert_eq!(html.matches("window.print()").count(), 1);
    }

    #[tokio::test]
    async fn print_failure_opens_zero_contexts() {
        let mut server = mockito::Server::new_async().await;
        mock_action(&mut server, "7", "print", 200, r#"{"success":false,"error":"no items"}"#)
            .await;

        let effects = RecordingEffects::default();
        let err = run_action_against(&effects, &server.url(), "s1", "7", ActionKind::Print)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::ServerReported(_)));
        assert_eq!(effects.print_contexts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn network_failure_maps_to_network_variant() {
        let mut server = mockito::Server::new_async().await;
        mock_action(&mut server, "12", "copy", 502, "bad gateway").await;

        let effects = RecordingEffects::default();
        let err = run_action_against(&effects, &server.url(), "s1", "12", ActionKind::Copy)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Network(_)));
    }

    #[tokio::test]
    async fn denied_clipboard_maps_to_platform_permission() {
        let mut server = mockito::Server::new_async().await;
        mock_action(&mut server, "12", "copy", 200, r#"{"success":true,"order_text":"ABC"}"#).await;

        let effects = RecordingEffects {
            deny_clipboard: true,
            ..Default::default()
        };
        let err = run_action_against(&effects, &server.url(), "s1", "12", ActionKind::Copy)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::PlatformPermission(_)));
        assert!(err.to_string().contains("clipboard access denied"));
    }

    #[tokio::test]
    async fn blocked_print_context_maps_to_platform_permission() {
        let mut server = mockito::Server::new_async().await;
        mock_action(
            &mut server,
            "7",
            "print",
            200,
            r#"{"success":true,"data":{"id":7,"customer":"A","items":[],"total_price":10.0}}"#,
        )
        .await;

        let effects = RecordingEffects {
            deny_print: true,
            ..Default::default()
        };
        let err = run_action_against(&effects, &server.url(), "s1", "7", ActionKind::Print)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::PlatformPermission(_)));
        assert_eq!(effects.print_contexts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn user_messages_localize_and_embed_server_detail() {
        let err = ActionError::ServerReported("سلة فارغة".into());
        assert_eq!(
            err.user_message(ActionKind::Copy, "ar"),
            "حدث خطأ في نسخ الطلب: سلة فارغة"
        );
        assert_eq!(
            ActionError::Network("down".into()).user_message(ActionKind::Print, "en"),
            "Failed to print order"
        );
        assert_eq!(success_message(ActionKind::Copy, "ar"), "تم نسخ الطلب بنجاح!");
    }
}
