//! The hosting runtime as seen from the worker.

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

/// Message posted to every open client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
  SyncComplete { message: String },
}

/// A notification as handed to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub data: NotificationData,
  pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
  /// Milliseconds since the Unix epoch
  pub date_of_arrival: i64,
  pub primary_key: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
  pub icon: String,
}

/// Services the hosting runtime provides to the worker.
///
/// The worker only signals through these; it never waits on clients.
pub trait Host: Send + Sync {
  /// Start controlling every open client without waiting for a navigation.
  fn claim_clients(&self) -> Result<()>;

  /// Post a message to every open client. Returns the number of clients reached.
  fn post_message(&self, message: &ClientMessage) -> Result<usize>;

  fn show_notification(&self, notification: &Notification) -> Result<()>;

  /// Close the notification the current click event belongs to.
  fn close_notification(&self) -> Result<()>;

  fn open_window(&self, url: &Url) -> Result<()>;
}

/// Host for the command line: clients and notifications are printed to stdout.
#[derive(Debug, Default)]
pub struct ConsoleHost;

impl Host for ConsoleHost {
  fn claim_clients(&self) -> Result<()> {
    info!("Claimed clients");
    Ok(())
  }

  fn post_message(&self, message: &ClientMessage) -> Result<usize> {
    // The console shows the message but has no clients to deliver it to
    println!("message: {}", serde_json::to_string(message)?);
    Ok(0)
  }

  fn show_notification(&self, notification: &Notification) -> Result<()> {
    println!("notification: {}", serde_json::to_string_pretty(notification)?);
    Ok(())
  }

  fn close_notification(&self) -> Result<()> {
    info!("Closed notification");
    Ok(())
  }

  fn open_window(&self, url: &Url) -> Result<()> {
    println!("open window: {}", url);
    Ok(())
  }
}
