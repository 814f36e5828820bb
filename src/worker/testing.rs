//! Test doubles for the network and the hosting runtime.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use color_eyre::{eyre::eyre, Result};
use url::Url;

use crate::cache::{CacheStorage, CachedResponse, SqliteStorage};
use crate::config::Config;
use crate::http::{Request, Response, ResponseType};
use crate::network::{Network, NetworkError};

use super::host::{ClientMessage, Host, Notification};
use super::OfflineWorker;

pub(crate) const ORIGIN: &str = "https://pritechvior.com";

pub(crate) type TestWorker = OfflineWorker<SqliteStorage, StubNetwork, RecordingHost>;

pub(crate) fn test_config() -> Config {
  let mut config = Config::default();
  config.set_origin(ORIGIN).unwrap();
  config
}

pub(crate) fn test_worker() -> TestWorker {
  worker_with(test_config(), Arc::new(SqliteStorage::in_memory().unwrap()))
}

pub(crate) fn worker_with<S: CacheStorage>(
  config: Config,
  storage: Arc<S>,
) -> OfflineWorker<S, StubNetwork, RecordingHost> {
  OfflineWorker::new(config, storage, StubNetwork::default(), RecordingHost::default())
}

pub(crate) fn url_for(path: &str) -> Url {
  Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// Same-origin response with the given status and body.
pub(crate) fn page(status: u16, body: &str) -> Response {
  Response {
    status,
    status_text: String::new(),
    headers: vec![("content-type".to_string(), "text/html".to_string())],
    body: body.as_bytes().to_vec(),
    kind: ResponseType::Basic,
    url: String::new(),
  }
}

/// In-memory storage whose reads, partition creation or listing can be made to fail.
pub(crate) struct FailingStorage {
  inner: SqliteStorage,
  fail_reads: AtomicBool,
  fail_open: AtomicBool,
  fail_names: AtomicBool,
}

impl FailingStorage {
  pub fn new() -> Self {
    Self {
      inner: SqliteStorage::in_memory().unwrap(),
      fail_reads: AtomicBool::new(false),
      fail_open: AtomicBool::new(false),
      fail_names: AtomicBool::new(false),
    }
  }

  pub fn fail_reads(&self) {
    self.fail_reads.store(true, Ordering::SeqCst);
  }

  pub fn fail_open(&self) {
    self.fail_open.store(true, Ordering::SeqCst);
  }

  pub fn fail_names(&self) {
    self.fail_names.store(true, Ordering::SeqCst);
  }

  fn check(flag: &AtomicBool, operation: &str) -> Result<()> {
    if flag.load(Ordering::SeqCst) {
      return Err(eyre!("{}: disk I/O error", operation));
    }
    Ok(())
  }
}

impl CacheStorage for FailingStorage {
  fn open(&self, name: &str) -> Result<()> {
    Self::check(&self.fail_open, "open")?;
    self.inner.open(name)
  }

  fn has(&self, name: &str) -> Result<bool> {
    self.inner.has(name)
  }

  fn names(&self) -> Result<Vec<String>> {
    Self::check(&self.fail_names, "names")?;
    self.inner.names()
  }

  fn delete(&self, name: &str) -> Result<bool> {
    self.inner.delete(name)
  }

  fn put(&self, name: &str, key: &str, response: &Response) -> Result<()> {
    self.inner.put(name, key, response)
  }

  fn get(&self, name: &str, key: &str) -> Result<Option<CachedResponse>> {
    Self::check(&self.fail_reads, "get")?;
    self.inner.get(name, key)
  }

  fn find(&self, key: &str) -> Result<Option<CachedResponse>> {
    Self::check(&self.fail_reads, "find")?;
    self.inner.find(key)
  }

  fn keys(&self, name: &str) -> Result<Vec<String>> {
    self.inner.keys(name)
  }

  fn remove(&self, name: &str, key: &str) -> Result<bool> {
    self.inner.remove(name, key)
  }
}

/// Network that answers from a fixed table and can be switched off.
/// Unknown URLs get a 404.
#[derive(Default)]
pub(crate) struct StubNetwork {
  routes: Mutex<HashMap<String, Response>>,
  offline: AtomicBool,
  calls: Mutex<Vec<String>>,
}

impl StubNetwork {
  pub fn respond(&self, url: &Url, response: Response) {
    self.routes.lock().unwrap().insert(url.to_string(), response);
  }

  pub fn go_offline(&self) {
    self.offline.store(true, Ordering::SeqCst);
  }

  pub fn go_online(&self) {
    self.offline.store(false, Ordering::SeqCst);
  }

  /// URLs fetched so far, in order
  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }
}

impl Network for StubNetwork {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response, NetworkError>> + Send {
    let url = request.url.to_string();
    self.calls.lock().unwrap().push(url.clone());

    let result = if self.offline.load(Ordering::SeqCst) {
      Err(NetworkError::Connect(format!("offline: {}", url)))
    } else {
      Ok(
        self
          .routes
          .lock()
          .unwrap()
          .get(&url)
          .cloned()
          .unwrap_or_else(|| page(404, "Not Found")),
      )
    };

    async move { result }
  }
}

/// Everything the worker asked the runtime to do
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostAction {
  Claimed,
  Posted(ClientMessage),
  Shown(Notification),
  Closed,
  Opened(String),
}

/// Host that records calls and reports a fixed number of open clients.
pub(crate) struct RecordingHost {
  actions: Mutex<Vec<HostAction>>,
  clients: usize,
}

impl Default for RecordingHost {
  fn default() -> Self {
    Self {
      actions: Mutex::new(Vec::new()),
      clients: 2,
    }
  }
}

impl RecordingHost {
  pub fn actions(&self) -> Vec<HostAction> {
    self.actions.lock().unwrap().clone()
  }

  fn record(&self, action: HostAction) {
    self.actions.lock().unwrap().push(action);
  }
}

impl Host for RecordingHost {
  fn claim_clients(&self) -> Result<()> {
    self.record(HostAction::Claimed);
    Ok(())
  }

  fn post_message(&self, message: &ClientMessage) -> Result<usize> {
    self.record(HostAction::Posted(message.clone()));
    Ok(self.clients)
  }

  fn show_notification(&self, notification: &Notification) -> Result<()> {
    self.record(HostAction::Shown(notification.clone()));
    Ok(())
  }

  fn close_notification(&self) -> Result<()> {
    self.record(HostAction::Closed);
    Ok(())
  }

  fn open_window(&self, url: &Url) -> Result<()> {
    self.record(HostAction::Opened(url.to_string()));
    Ok(())
  }
}
