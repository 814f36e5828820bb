//! Install, activate and the skip-waiting upgrade protocol.

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::CacheStorage;
use crate::http::Request;
use crate::network::Network;

use super::host::Host;
use super::OfflineWorker;

/// Worker lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  /// Created, install not started
  Parsed,
  Installing,
  /// Installed, waiting to activate
  Installed,
  Activating,
  /// Active and intercepting fetches
  Activated,
  /// Install failed; this generation is never used
  Redundant,
}

impl WorkerState {
  /// Check if this state allows fetch interception
  pub fn can_intercept_fetch(&self) -> bool {
    matches!(self, WorkerState::Activated)
  }
}

impl std::fmt::Display for WorkerState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      WorkerState::Parsed => "parsed",
      WorkerState::Installing => "installing",
      WorkerState::Installed => "installed",
      WorkerState::Activating => "activating",
      WorkerState::Activated => "activated",
      WorkerState::Redundant => "redundant",
    };
    f.write_str(name)
  }
}

/// Outcome of precaching the static manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
  /// Manifest paths now stored in the static partition
  pub cached: Vec<String>,
  /// Manifest paths that could not be cached, with the reason
  pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
  /// Partitions of older generations that were deleted
  pub deleted: Vec<String>,
}

/// Commands a client page may post to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum WorkerCommand {
  SkipWaiting,
}

impl<S: CacheStorage, N: Network, H: Host> OfflineWorker<S, N, H> {
  /// Precache the static manifest and pre-create every partition.
  ///
  /// A failing asset never fails the install; only a partition that cannot be
  /// created does, which leaves the worker redundant.
  pub async fn install(&self) -> Result<InstallReport> {
    info!(version = %self.config.cache.version, "Installing");
    self.set_state(WorkerState::Installing);

    match self.precache().await {
      Ok(report) => {
        self.set_state(WorkerState::Installed);
        info!(
          cached = report.cached.len(),
          failed = report.failed.len(),
          "Installation complete"
        );
        self.skip_waiting();
        Ok(report)
      }
      Err(e) => {
        self.set_state(WorkerState::Redundant);
        Err(e)
      }
    }
  }

  async fn precache(&self) -> Result<InstallReport> {
    for name in self.names.whitelist() {
      self.caches.open(name)?;
    }

    let adds = self
      .config
      .cache
      .static_assets
      .iter()
      .map(|path| async move { (path.clone(), self.add_asset(path).await) });

    let mut report = InstallReport::default();
    for (path, result) in join_all(adds).await {
      match result {
        Ok(()) => report.cached.push(path),
        Err(e) => {
          warn!(asset = %path, error = %e, "Failed to cache");
          report.failed.push((path, e.to_string()));
        }
      }
    }

    Ok(report)
  }

  /// Fetch one manifest entry and store it; non-2xx statuses are failures.
  async fn add_asset(&self, path: &str) -> Result<()> {
    let request = Request::get(self.config.resolve(path)?);
    let response = self.network.fetch(&request).await?;
    if !response.ok() {
      return Err(eyre!("Bad response status {}", response.status));
    }

    self
      .caches
      .put(&self.names.static_assets, &request.cache_key(), &response)
  }

  /// Delete partitions outside the current whitelist and claim all clients.
  pub fn activate(&self) -> Result<ActivateReport> {
    let previous = self.state();
    if matches!(
      previous,
      WorkerState::Parsed | WorkerState::Installing | WorkerState::Redundant
    ) {
      return Err(eyre!("Cannot activate a worker that is {}", previous));
    }

    info!("Activating");
    self.set_state(WorkerState::Activating);

    match self.remove_stale_caches() {
      Ok(report) => {
        self.set_state(WorkerState::Activated);
        info!(deleted = report.deleted.len(), "Activation complete");
        Ok(report)
      }
      Err(e) => {
        self.set_state(previous);
        Err(e)
      }
    }
  }

  fn remove_stale_caches(&self) -> Result<ActivateReport> {
    let mut report = ActivateReport::default();
    for name in self.caches.names()? {
      if !self.names.contains(&name) {
        info!(cache = %name, "Deleting old cache");
        self.caches.delete(&name)?;
        report.deleted.push(name);
      }
    }

    self.host.claim_clients()?;
    Ok(report)
  }

  /// Let this generation activate without waiting for old clients to close.
  /// Returns true when the worker is installed and waiting.
  pub fn skip_waiting(&self) -> bool {
    let mut lifecycle = self.lifecycle();
    lifecycle.skip_waiting = true;
    lifecycle.state == WorkerState::Installed
  }

  /// Whether the runtime should activate this worker now.
  pub fn should_activate(&self) -> bool {
    let lifecycle = self.lifecycle();
    lifecycle.state == WorkerState::Installed && lifecycle.skip_waiting
  }

  /// Adopt a generation installed by an earlier run: if all of its partitions
  /// already exist the worker starts out installed and waiting. Returns true
  /// when the generation is installed or active.
  pub fn resume(&self) -> Result<bool> {
    let state = self.state();
    if state != WorkerState::Parsed {
      return Ok(matches!(state, WorkerState::Installed | WorkerState::Activated));
    }

    for name in self.names.whitelist() {
      if !self.caches.has(name)? {
        debug!(cache = name, "Generation not installed yet");
        return Ok(false);
      }
    }

    self.set_state(WorkerState::Installed);
    Ok(true)
  }

  /// Bring the worker to the activated state, installing if needed.
  /// Activation always runs, so partitions of older generations are gone
  /// before the first fetch is served.
  pub async fn ensure_active(&self) -> Result<()> {
    if self.state() == WorkerState::Activated {
      return Ok(());
    }

    if !self.resume()? {
      self.install().await?;
    }
    self.activate()?;
    Ok(())
  }

  /// Handle a message posted by a client page. Returns the activation report
  /// when the message activated a waiting worker, `None` for other messages.
  pub(crate) fn handle_command(&self, command: WorkerCommand) -> Result<Option<ActivateReport>> {
    match command {
      WorkerCommand::SkipWaiting => {
        debug!("Client requested skip waiting");
        if self.skip_waiting() {
          return self.activate().map(Some);
        }
        Ok(None)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use crate::worker::testing::{
    page, test_config, test_worker, url_for, worker_with, FailingStorage, HostAction,
  };
  use std::sync::Arc;

  fn serve_manifest(worker: &crate::worker::testing::TestWorker) {
    for path in worker.config().cache.static_assets.clone() {
      worker.network().respond(&url_for(&path), page(200, &path));
    }
  }

  #[tokio::test]
  async fn test_install_caches_manifest_and_creates_partitions() {
    let worker = test_worker();
    serve_manifest(&worker);

    let report = worker.install().await.unwrap();
    assert_eq!(report.cached.len(), 7);
    assert!(report.failed.is_empty());
    assert_eq!(worker.state(), WorkerState::Installed);
    assert!(worker.should_activate());

    let names = worker.cache_names();
    assert_eq!(worker.caches().keys(&names.static_assets).unwrap().len(), 7);
    assert!(worker.caches().has(&names.dynamic).unwrap());
    assert!(worker.caches().has(&names.api).unwrap());
    assert!(worker.caches().keys(&names.api).unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_failed_asset_does_not_block_install() {
    let worker = test_worker();
    serve_manifest(&worker);
    // A stale bundle hash after a rebuild
    worker
      .network()
      .respond(&url_for("/assets/index-e-GuRZr5.js"), page(404, "gone"));

    let report = worker.install().await.unwrap();
    assert_eq!(report.cached.len(), 6);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "/assets/index-e-GuRZr5.js");
    assert_eq!(worker.state(), WorkerState::Installed);

    let missing = url_for("/assets/index-e-GuRZr5.js");
    assert!(worker.caches().find(missing.as_str()).unwrap().is_none());
  }

  #[tokio::test]
  async fn test_install_offline_still_resolves() {
    let worker = test_worker();
    worker.network().go_offline();

    let report = worker.install().await.unwrap();
    assert!(report.cached.is_empty());
    assert_eq!(report.failed.len(), 7);
    assert_eq!(worker.state(), WorkerState::Installed);
  }

  #[tokio::test]
  async fn test_activate_deletes_old_generations_and_claims() {
    let storage = Arc::new(SqliteStorage::in_memory().unwrap());
    storage.open("pritechvior-static-v1.0.0").unwrap();
    storage.open("pritechvior-api-v1.0.0").unwrap();
    storage.open("some-other-cache").unwrap();

    let worker = worker_with(test_config(), storage);
    worker.install().await.unwrap();
    let report = worker.activate().unwrap();

    assert_eq!(report.deleted.len(), 3);
    let mut names = worker.caches().names().unwrap();
    names.sort();
    let mut expected: Vec<String> = worker
      .cache_names()
      .whitelist()
      .iter()
      .map(|s| s.to_string())
      .collect();
    expected.sort();
    assert_eq!(names, expected);
    assert_eq!(worker.state(), WorkerState::Activated);
    assert!(worker.host().actions().contains(&HostAction::Claimed));
  }

  #[tokio::test]
  async fn test_activate_twice_is_idempotent() {
    let worker = test_worker();
    worker.install().await.unwrap();
    worker.activate().unwrap();
    let before = worker.caches().names().unwrap();

    let report = worker.activate().unwrap();
    assert!(report.deleted.is_empty());
    assert_eq!(worker.caches().names().unwrap(), before);
  }

  #[tokio::test]
  async fn test_install_without_partitions_makes_worker_redundant() {
    let storage = Arc::new(FailingStorage::new());
    storage.fail_open();
    let worker = worker_with(test_config(), storage);

    assert!(worker.install().await.is_err());
    assert_eq!(worker.state(), WorkerState::Redundant);
    assert!(!worker.should_activate());
    assert!(worker.activate().is_err());
  }

  #[tokio::test]
  async fn test_failed_activation_restores_previous_state() {
    let storage = Arc::new(FailingStorage::new());
    let worker = worker_with(test_config(), storage.clone());
    worker.install().await.unwrap();
    storage.fail_names();

    assert!(worker.activate().is_err());
    assert_eq!(worker.state(), WorkerState::Installed);
    assert!(!worker.host().actions().contains(&HostAction::Claimed));
  }

  #[test]
  fn test_activate_before_install_is_rejected() {
    let worker = test_worker();
    assert!(worker.activate().is_err());
    assert_eq!(worker.state(), WorkerState::Parsed);
  }

  #[tokio::test]
  async fn test_version_bump_replaces_generation() {
    let storage = Arc::new(SqliteStorage::in_memory().unwrap());

    let old = worker_with(test_config(), storage.clone());
    old.ensure_active().await.unwrap();

    let mut config = test_config();
    config.cache.version = "v2.1.0".to_string();
    let new = worker_with(config, storage.clone());
    assert!(!new.resume().unwrap());
    new.ensure_active().await.unwrap();

    let mut names = storage.names().unwrap();
    names.sort();
    assert_eq!(
      names,
      vec![
        "pritechvior-api-v2.1.0",
        "pritechvior-dynamic-v2.1.0",
        "pritechvior-static-v2.1.0",
      ]
    );
  }

  #[tokio::test]
  async fn test_resume_adopts_installed_generation() {
    let storage = Arc::new(SqliteStorage::in_memory().unwrap());
    let first = worker_with(test_config(), storage.clone());
    first.ensure_active().await.unwrap();

    let second = worker_with(test_config(), storage);
    assert!(second.resume().unwrap());
    assert_eq!(second.state(), WorkerState::Installed);

    second.ensure_active().await.unwrap();
    assert_eq!(second.state(), WorkerState::Activated);
    assert!(second.network().calls().is_empty());
  }

  #[tokio::test]
  async fn test_resumed_generation_drops_older_one_before_serving() {
    let storage = Arc::new(SqliteStorage::in_memory().unwrap());

    let old = worker_with(test_config(), storage.clone());
    old.network().respond(&url_for("/"), page(200, "old shell"));
    old.ensure_active().await.unwrap();

    // Installed in one run, never activated
    let mut config = test_config();
    config.cache.version = "v2.1.0".to_string();
    let installer = worker_with(config.clone(), storage.clone());
    installer.network().respond(&url_for("/"), page(200, "new shell"));
    installer.install().await.unwrap();
    assert_eq!(storage.names().unwrap().len(), 6);

    let fresh = worker_with(config, storage.clone());
    fresh.network().go_offline();
    fresh.ensure_active().await.unwrap();

    let mut names = storage.names().unwrap();
    names.sort();
    assert_eq!(
      names,
      vec![
        "pritechvior-api-v2.1.0",
        "pritechvior-dynamic-v2.1.0",
        "pritechvior-static-v2.1.0",
      ]
    );

    let outcome = fresh.handle_fetch(&Request::navigate(url_for("/"))).await;
    assert_eq!(outcome.response().unwrap().text(), "new shell");
  }

  #[tokio::test]
  async fn test_skip_waiting_message_activates_resumed_worker() {
    let storage = Arc::new(SqliteStorage::in_memory().unwrap());
    worker_with(test_config(), storage.clone()).install().await.unwrap();

    let worker = worker_with(test_config(), storage);
    assert!(worker.resume().unwrap());
    let report = worker.handle_command(WorkerCommand::SkipWaiting).unwrap();
    assert!(report.is_some());
    assert_eq!(worker.state(), WorkerState::Activated);
  }

  #[tokio::test]
  async fn test_skip_waiting_message_activates_waiting_worker() {
    let worker = test_worker();
    worker.install().await.unwrap();

    let report = worker.handle_command(WorkerCommand::SkipWaiting).unwrap();
    assert!(report.is_some());
    assert_eq!(worker.state(), WorkerState::Activated);

    // Already active: nothing left to do
    assert!(worker.handle_command(WorkerCommand::SkipWaiting).unwrap().is_none());
  }

  #[test]
  fn test_worker_command_wire_format() {
    let command: WorkerCommand =
      serde_json::from_value(serde_json::json!({ "type": "SKIP_WAITING" })).unwrap();
    assert_eq!(command, WorkerCommand::SkipWaiting);
    assert!(serde_json::from_value::<WorkerCommand>(serde_json::json!({ "type": "PING" })).is_err());
  }

  #[test]
  fn test_state_display() {
    assert_eq!(WorkerState::Activated.to_string(), "activated");
    assert!(WorkerState::Activated.can_intercept_fetch());
    assert!(!WorkerState::Installed.can_intercept_fetch());
  }
}
