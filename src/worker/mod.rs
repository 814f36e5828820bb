//! The offline cache manager.
//!
//! `OfflineWorker` reacts to the runtime events of one worker generation:
//! - install: precache the static manifest, pre-create all partitions
//! - activate: delete partitions of older generations, claim clients
//! - fetch: route each request to network-first or cache-first handling
//! - sync: refresh every stored API response
//! - push / notificationclick: show notifications, open the app
//! - message: honour SKIP_WAITING from a client page
//!
//! Every event goes through `OfflineWorker::dispatch`.

mod event;
mod fallback;
mod host;
mod lifecycle;
mod notify;
mod route;
mod strategy;
mod sync;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::cache::CacheStorage;
use crate::config::{CacheNames, Config};
use crate::network::Network;

pub use event::{Event, EventOutcome};
pub use host::{ConsoleHost, Host};
pub use lifecycle::{ActivateReport, InstallReport, WorkerState};
pub use strategy::FetchOutcome;
pub use sync::SyncReport;

/// Lifecycle bookkeeping guarded by one lock
#[derive(Debug)]
struct Lifecycle {
  state: WorkerState,
  skip_waiting: bool,
}

/// One generation of the offline cache manager.
pub struct OfflineWorker<S: CacheStorage, N: Network, H: Host> {
  config: Config,
  names: CacheNames,
  caches: Arc<S>,
  network: N,
  host: H,
  lifecycle: Mutex<Lifecycle>,
}

impl<S: CacheStorage, N: Network, H: Host> OfflineWorker<S, N, H> {
  pub fn new(config: Config, caches: Arc<S>, network: N, host: H) -> Self {
    let names = config.cache_names();
    Self {
      config,
      names,
      caches,
      network,
      host,
      lifecycle: Mutex::new(Lifecycle {
        state: WorkerState::Parsed,
        skip_waiting: false,
      }),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Partition names of this generation.
  pub fn cache_names(&self) -> &CacheNames {
    &self.names
  }

  pub fn caches(&self) -> &S {
    &self.caches
  }

  #[cfg(test)]
  pub(crate) fn host(&self) -> &H {
    &self.host
  }

  #[cfg(test)]
  pub(crate) fn network(&self) -> &N {
    &self.network
  }

  pub fn state(&self) -> WorkerState {
    self.lifecycle().state
  }

  fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
    self
      .lifecycle
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  fn set_state(&self, state: WorkerState) {
    let mut lifecycle = self.lifecycle();
    if lifecycle.state != state {
      tracing::debug!(from = %lifecycle.state, to = %state, "Worker state change");
      lifecycle.state = state;
    }
  }
}
