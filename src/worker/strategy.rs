//! Fetch interception: network-first for the API, cache-first for everything else.

use tracing::{debug, warn};

use crate::cache::{CacheStorage, CachedResponse};
use crate::http::{Request, Response, ResponseType};
use crate::network::Network;

use super::fallback::{self, FallbackChain};
use super::host::Host;
use super::route::{asset_partition, Route};
use super::OfflineWorker;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Live network response
  Network,
  /// Stored copy of the requested URL
  Cache,
  /// Cached substitute page or synthesized placeholder
  Fallback,
}

/// Result of intercepting one request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
  /// Not intercepted; the runtime performs its default fetch
  Passthrough,
  Respond {
    response: Response,
    source: ResponseSource,
  },
}

impl FetchOutcome {
  fn respond(response: Response, source: ResponseSource) -> Self {
    FetchOutcome::Respond { response, source }
  }

  pub fn response(&self) -> Option<&Response> {
    match self {
      FetchOutcome::Respond { response, .. } => Some(response),
      FetchOutcome::Passthrough => None,
    }
  }

  pub fn source(&self) -> Option<ResponseSource> {
    match self {
      FetchOutcome::Respond { source, .. } => Some(*source),
      FetchOutcome::Passthrough => None,
    }
  }
}

impl<S: CacheStorage, N: Network, H: Host> OfflineWorker<S, N, H> {
  /// Intercept one request. Never fails: every network failure ends in a
  /// cached or synthesized response.
  pub async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
    let route = Route::classify(request, &self.config);
    debug!(url = %request.url, ?route, "Intercepted fetch");

    match route {
      Route::Bypass => FetchOutcome::Passthrough,
      Route::Api => self.network_first(request).await,
      Route::Navigation => self.serve_navigation(request).await,
      Route::Asset => self.serve_asset(request).await,
    }
  }

  async fn network_first(&self, request: &Request) -> FetchOutcome {
    match self.network.fetch(request).await {
      Ok(response) => {
        if response.status == 200 {
          self.store(&self.names.api, request, &response);
        }
        FetchOutcome::respond(response, ResponseSource::Network)
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "API fetch failed, trying cache");
        if let Some(cached) = self.lookup_in(&self.names.api, request) {
          return FetchOutcome::respond(cached.response, ResponseSource::Cache);
        }
        FetchOutcome::respond(fallback::offline_api_response(), ResponseSource::Fallback)
      }
    }
  }

  async fn serve_navigation(&self, request: &Request) -> FetchOutcome {
    if let Some(cached) = self.lookup(request) {
      debug!(url = %request.url, "Serving cached page");
      return FetchOutcome::respond(cached.response, ResponseSource::Cache);
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        if response.status == 200 {
          self.store(&self.names.dynamic, request, &response);
        }
        FetchOutcome::respond(response, ResponseSource::Network)
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "Navigation failed, trying fallbacks");
        let response =
          FallbackChain::navigation(&self.config.routes).resolve(&*self.caches, &self.config.origin);
        FetchOutcome::respond(response, ResponseSource::Fallback)
      }
    }
  }

  async fn serve_asset(&self, request: &Request) -> FetchOutcome {
    if let Some(cached) = self.lookup(request) {
      return FetchOutcome::respond(cached.response, ResponseSource::Cache);
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        // Error statuses and cross-origin responses are passed through unstored
        if response.status == 200 && response.kind == ResponseType::Basic {
          let partition = asset_partition(request, &self.config, &self.names);
          self.store(partition, request, &response);
        }
        FetchOutcome::respond(response, ResponseSource::Network)
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "Asset fetch failed, trying fallbacks");
        let response = FallbackChain::asset(request, &self.config.routes)
          .resolve(&*self.caches, &self.config.origin);
        FetchOutcome::respond(response, ResponseSource::Fallback)
      }
    }
  }

  /// Best-effort write; failures are logged and dropped.
  pub(crate) fn store(&self, partition: &str, request: &Request, response: &Response) {
    if !request.is_cacheable() {
      return;
    }

    let key = request.cache_key();
    match self.caches.put(partition, &key, response) {
      Ok(()) => debug!(cache = partition, key = %key, "Stored response"),
      Err(e) => warn!(cache = partition, key = %key, error = %e, "Failed to store response"),
    }
  }

  /// Match the request in one partition, treating read errors as a miss.
  fn lookup_in(&self, partition: &str, request: &Request) -> Option<CachedResponse> {
    if !request.is_cacheable() {
      return None;
    }

    self
      .caches
      .get(partition, &request.cache_key())
      .unwrap_or_else(|e| {
        warn!(cache = partition, url = %request.url, error = %e, "Cache read failed");
        None
      })
  }

  /// Match the request across all partitions, treating read errors as a miss.
  fn lookup(&self, request: &Request) -> Option<CachedResponse> {
    if !request.is_cacheable() {
      return None;
    }

    self.caches.find(&request.cache_key()).unwrap_or_else(|e| {
      warn!(url = %request.url, error = %e, "Cache read failed");
      None
    })
  }
}
