//! Push notifications and notification clicks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::WorkerContext;

/// A notification to display, built from a push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub tag: String,
    pub require_interaction: bool,
}

/// What the host should do when a notification is clicked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickAction {
    /// Dismiss the notification and open a window at `url`.
    OpenWindow { url: String },
}

impl WorkerContext {
    /// A push without data shows the configured default body.
    pub fn on_push(&self, data: Option<&str>) -> Notification {
        let settings = &self.config.notification;
        let notification = Notification {
            title: settings.title.clone(),
            body: data.map_or_else(|| settings.body.clone(), str::to_string),
            icon: settings.icon.clone(),
            badge: settings.badge.clone(),
            vibrate: settings.vibrate.clone(),
            tag: settings.tag.clone(),
            require_interaction: false,
        };
        tracing::info!(tag = %notification.tag, has_data = data.is_some(), "push received");
        notification
    }

    pub fn on_notification_click(&self) -> ClickAction {
        let url = self
            .origin_base()
            .join(&self.config.notification.click_url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| self.config.notification.click_url.clone());
        tracing::info!(%url, "notification clicked");
        ClickAction::OpenWindow { url }
    }
}
