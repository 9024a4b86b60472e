//! Transient notification center.
//!
//! The webview overlay layer renders whatever this module tells it to: a
//! `notification_show` event puts a message on screen, `notification_dismiss`
//! takes it down. Each logical channel holds at most one live notification;
//! showing a new one replaces the old and restarts the dismissal clock.
//! Replacement is enforced by a per-channel registry with a generation
//! counter, so a superseded auto-dismiss can never take down a newer message.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tauri::Emitter;
use tracing::debug;
use uuid::Uuid;

/// How long a new-order announcement stays on screen.
pub const NEW_ORDER_TTL: Duration = Duration::from_secs(5);
/// How long a successful action result stays on screen.
pub const ACTION_SUCCESS_TTL: Duration = Duration::from_secs(3);
/// Failures linger a little longer so the operator can read the message.
pub const ACTION_FAILURE_TTL: Duration = Duration::from_secs(6);

/// Logical notification slot. Distinct channels may be visible at the same
/// time; within a channel the newest message wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    NewOrder,
    ActionResult,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::NewOrder => "new-order",
            Channel::ActionResult => "action-result",
        }
    }

    pub fn from_value(value: &str) -> Option<Self> {
        match value.trim() {
            "new-order" => Some(Channel::NewOrder),
            "action-result" => Some(Channel::ActionResult),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveNotification {
    id: Uuid,
    message: String,
    generation: u64,
}

/// Ticket handed back by [`NotificationRegistry::begin_show`]; the dismissal
/// timer uses it to prove it still owns the slot when the ttl elapses.
#[derive(Debug, Clone, Copy)]
pub struct ShowTicket {
    pub id: Uuid,
    pub generation: u64,
}

/// Per-channel single-slot registry. This is the only shared state between
/// the poller and the dispatcher.
#[derive(Default)]
pub struct NotificationRegistry {
    slots: Mutex<HashMap<Channel, ActiveNotification>>,
    generation: AtomicU64,
}

impl NotificationRegistry {
    /// Claim the channel slot, replacing any live notification on it.
    pub fn begin_show(&self, channel: Channel, message: &str) -> ShowTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let id = Uuid::new_v4();
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.insert(
            channel,
            ActiveNotification {
                id,
                message: message.to_string(),
                generation,
            },
        );
        ShowTicket { id, generation }
    }

    /// The currently visible message on a channel, if any.
    pub fn visible(&self, channel: Channel) -> Option<(Uuid, String)> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.get(&channel).map(|n| (n.id, n.message.clone()))
    }

    pub fn visible_count(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.len()
    }

    /// Remove the channel's notification unconditionally (explicit dismiss).
    pub fn dismiss(&self, channel: Channel) -> Option<Uuid> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.remove(&channel).map(|n| n.id)
    }

    /// Remove the channel's notification only if the given generation still
    /// owns the slot. A ttl expiry that lost a replacement race is a no-op.
    pub fn expire(&self, channel: Channel, generation: u64) -> Option<Uuid> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        match slots.get(&channel) {
            Some(active) if active.generation == generation => slots.remove(&channel).map(|n| n.id),
            _ => None,
        }
    }
}

/// Registry plus the event/timer glue. The registry is shared with the
/// dismissal timers, which hold it across their sleep.
#[derive(Default)]
pub struct NotificationCenter {
    pub registry: Arc<NotificationRegistry>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display `message` on `channel`, replacing any visible notification on
    /// that channel, and schedule auto-dismissal after `ttl`.
    ///
    /// Never fails: a webview that is gone (teardown) just drops the event.
    pub fn show(&self, app: &tauri::AppHandle, channel: Channel, message: &str, ttl: Duration) {
        let ticket = self.registry.begin_show(channel, message);

        if let Err(e) = app.emit(
            "notification_show",
            serde_json::json!({
                "channel": channel.as_str(),
                "id": ticket.id.to_string(),
                "message": message,
                "ttl_ms": ttl.as_millis() as u64,
                "timestamp": Utc::now().to_rfc3339(),
            }),
        ) {
            debug!(channel = channel.as_str(), error = %e, "notification_show emit dropped");
        }

        let registry = Arc::clone(&self.registry);
        let app = app.clone();
        tauri::async_runtime::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(id) = registry.expire(channel, ticket.generation) {
                emit_dismiss(&app, channel, id);
            }
        });
    }

    /// Remove the channel's notification immediately. The pending expiry for
    /// the removed generation becomes a no-op on its own.
    pub fn dismiss(&self, app: &tauri::AppHandle, channel: Channel) {
        if let Some(id) = self.registry.dismiss(channel) {
            emit_dismiss(app, channel, id);
        }
    }
}

fn emit_dismiss(app: &tauri::AppHandle, channel: Channel, id: Uuid) {
    if let Err(e) = app.emit(
        "notification_dismiss",
        serde_json::json!({
            "channel": channel.as_str(),
            "id": id.to_string(),
        }),
    ) {
        debug!(channel = channel.as_str(), error = %e, "notification_dismiss emit dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_replaces_within_channel() {
        let registry = NotificationRegistry::default();
        let first = registry.begin_show(Channel::NewOrder, "📢 لديك 1 طلبات جديدة!");
        let second = registry.begin_show(Channel::NewOrder, "📢 لديك 3 طلبات جديدة!");

        assert_eq!(registry.visible_count(), 1);
        let (id, message) = registry.visible(Channel::NewOrder).expect("visible");
        assert_eq!(id, second.id);
        assert!(message.contains('3'));
        assert_ne!(first.generation, second.generation);
    }

    #[test]
    fn channels_are_independent_slots() {
        let registry = NotificationRegistry::default();
        registry.begin_show(Channel::NewOrder, "new order");
        registry.begin_show(Channel::ActionResult, "copied");

        assert_eq!(registry.visible_count(), 2);
        assert!(registry.visible(Channel::NewOrder).is_some());
        assert!(registry.visible(Channel::ActionResult).is_some());

        registry.dismiss(Channel::ActionResult);
        assert!(registry.visible(Channel::NewOrder).is_some());
        assert!(registry.visible(Channel::ActionResult).is_none());
    }

    #[test]
    fn superseded_expiry_never_removes_newer_notification() {
        let registry = NotificationRegistry::default();
        let first = registry.begin_show(Channel::NewOrder, "count 1");
        let second = registry.begin_show(Channel::NewOrder, "count 2");

        // The first show's ttl elapses after it was replaced.
        assert_eq!(registry.expire(Channel::NewOrder, first.generation), None);
        let (_, message) = registry.visible(Channel::NewOrder).expect("still visible");
        assert_eq!(message, "count 2");

        // The owning generation's expiry does remove it.
        assert_eq!(
            registry.expire(Channel::NewOrder, second.generation),
            Some(second.id)
        );
        assert!(registry.visible(Channel::NewOrder).is_none());
    }

    #[test]
    fn expire_after_explicit_dismiss_is_noop() {
        let registry = NotificationRegistry::default();
        let ticket = registry.begin_show(Channel::ActionResult, "copied");
        assert_eq!(registry.dismiss(Channel::ActionResult), Some(ticket.id));
        assert_eq!(registry.expire(Channel::ActionResult, ticket.generation), None);
        assert_eq!(registry.visible_count(), 0);
    }

    #[test]
    fn channel_names_round_trip() {
        assert_eq!(Channel::from_value("new-order"), Some(Channel::NewOrder));
        assert_eq!(
            Channel::from_value(" action-result "),
            Some(Channel::ActionResult)
        );
        assert_eq!(Channel::from_value("toast"), None);
        assert_eq!(Channel::NewOrder.as_str(), "new-order");
    }
}
