//! Push notifications and notification clicks.

use chrono::Utc;
use color_eyre::Result;
use tracing::debug;

use crate::cache::CacheStorage;
use crate::config::NotificationConfig;
use crate::network::Network;

use super::host::{Host, Notification, NotificationAction, NotificationData};
use super::OfflineWorker;

/// Action that opens the app
pub const EXPLORE_ACTION: &str = "explore";
pub const CLOSE_ACTION: &str = "close";

impl<S: CacheStorage, N: Network, H: Host> OfflineWorker<S, N, H> {
  /// Show a notification for a push message. `data` is the payload text, if any.
  pub fn push(&self, data: Option<&str>) -> Result<Notification> {
    let now_ms = Utc::now().timestamp_millis();
    let notification = build_notification(&self.config.notifications, data, now_ms);
    self.host.show_notification(&notification)?;
    Ok(notification)
  }

  /// Close the clicked notification and open the app if it asked to.
  /// Returns true when a window was opened.
  pub fn notification_click(&self, action: Option<&str>) -> Result<bool> {
    self.host.close_notification()?;

    if action != Some(EXPLORE_ACTION) {
      debug!(?action, "Notification dismissed");
      return Ok(false);
    }

    let root = self.config.resolve(&self.config.routes.root_page)?;
    self.host.open_window(&root)?;
    Ok(true)
  }
}

fn build_notification(config: &NotificationConfig, data: Option<&str>, now_ms: i64) -> Notification {
  let action = |action: &str, title: &str| NotificationAction {
    action: action.to_string(),
    title: title.to_string(),
    icon: config.action_icon.clone(),
  };

  Notification {
    title: config.title.clone(),
    body: data.unwrap_or(config.default_body.as_str()).to_string(),
    icon: config.icon.clone(),
    badge: config.badge.clone(),
    vibrate: config.vibrate.clone(),
    data: NotificationData {
      date_of_arrival: now_ms,
      primary_key: 1,
    },
    actions: vec![action(EXPLORE_ACTION, "Open App"), action(CLOSE_ACTION, "Close")],
  }
}
