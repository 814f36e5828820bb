//! Runtime events and the dispatcher that routes them to handlers.

use color_eyre::Result;
use tracing::debug;

use crate::cache::CacheStorage;
use crate::http::Request;
use crate::network::Network;

use super::host::{Host, Notification};
use super::lifecycle::{ActivateReport, InstallReport, WorkerCommand};
use super::strategy::FetchOutcome;
use super::sync::SyncReport;
use super::OfflineWorker;

/// An event delivered by the hosting runtime
#[derive(Debug, Clone)]
pub enum Event {
  Install,
  Activate,
  Fetch(Request),
  Sync { tag: String },
  Push { data: Option<String> },
  NotificationClick { action: Option<String> },
  /// Message posted by a client page
  Message(serde_json::Value),
}

impl Event {
  pub fn kind(&self) -> &'static str {
    match self {
      Event::Install => "install",
      Event::Activate => "activate",
      Event::Fetch(_) => "fetch",
      Event::Sync { .. } => "sync",
      Event::Push { .. } => "push",
      Event::NotificationClick { .. } => "notificationclick",
      Event::Message(_) => "message",
    }
  }
}

/// What handling an event produced
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
  Installed(InstallReport),
  Activated(ActivateReport),
  Fetched(FetchOutcome),
  Synced(SyncReport),
  Notified(Notification),
  /// Handled with nothing to report
  Completed,
  /// Tag or message type this worker does not handle
  Ignored,
}

impl<S: CacheStorage, N: Network, H: Host> OfflineWorker<S, N, H> {
  /// Route an event to its handler.
  ///
  /// Fetches are only intercepted once the worker is activated; before that
  /// they pass through to the network untouched.
  pub async fn dispatch(&self, event: Event) -> Result<EventOutcome> {
    debug!(event = event.kind(), state = %self.state(), "Dispatching");

    match event {
      Event::Install => Ok(EventOutcome::Installed(self.install().await?)),
      Event::Activate => Ok(EventOutcome::Activated(self.activate()?)),
      Event::Fetch(request) => {
        if !self.state().can_intercept_fetch() {
          return Ok(EventOutcome::Fetched(FetchOutcome::Passthrough));
        }
        Ok(EventOutcome::Fetched(self.handle_fetch(&request).await))
      }
      Event::Sync { tag } => {
        if tag != self.config.sync.tag {
          debug!(tag = %tag, "Ignoring sync event");
          return Ok(EventOutcome::Ignored);
        }
        Ok(EventOutcome::Synced(self.sync_api_cache().await?))
      }
      Event::Push { data } => Ok(EventOutcome::Notified(self.push(data.as_deref())?)),
      Event::NotificationClick { action } => {
        self.notification_click(action.as_deref())?;
        Ok(EventOutcome::Completed)
      }
      Event::Message(value) => match serde_json::from_value::<WorkerCommand>(value) {
        Ok(command) => Ok(match self.handle_command(command)? {
          Some(report) => EventOutcome::Activated(report),
          None => EventOutcome::Completed,
        }),
        Err(e) => {
          debug!(error = %e, "Ignoring message");
          Ok(EventOutcome::Ignored)
        }
      },
    }
  }
}
