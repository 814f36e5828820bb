//! Ordered fallback chains used when the network fails.

use tracing::{debug, warn};
use url::Url;

use crate::cache::CacheStorage;
use crate::config::RouteConfig;
use crate::http::{Destination, Request, Response};

const OFFLINE_HTML: &str = "<!DOCTYPE html><html><head><title>Offline</title></head><body><h1>You're offline</h1><p>Please check your internet connection.</p></body></html>";

const OFFLINE_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200" viewBox="0 0 200 200"><rect width="200" height="200" fill="#f0f0f0"/><text x="100" y="100" text-anchor="middle" fill="#666">Offline</text></svg>"##;

/// One step of a fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
  /// A page stored in any partition, by path relative to the origin
  Cached(String),
  /// Inline "You're offline" HTML page
  OfflinePage,
  /// SVG placeholder image
  OfflineImage,
  /// Plain-text 503
  Unavailable,
}

/// Steps tried in order until one produces a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
  steps: Vec<Fallback>,
}

impl FallbackChain {
  pub fn new(steps: Vec<Fallback>) -> Self {
    Self { steps }
  }

  /// Root document, then offline document, then the inline page.
  pub fn navigation(routes: &RouteConfig) -> Self {
    Self::new(vec![
      Fallback::Cached(routes.root_page.clone()),
      Fallback::Cached(routes.offline_page.clone()),
      Fallback::OfflinePage,
    ])
  }

  /// Chain for a failed sub-resource fetch, chosen by what was requested.
  pub fn asset(request: &Request, routes: &RouteConfig) -> Self {
    if request.destination == Destination::Image {
      Self::new(vec![Fallback::OfflineImage])
    } else if request.is_navigation() || request.destination == Destination::Document {
      Self::new(vec![
        Fallback::Cached(routes.offline_page.clone()),
        Fallback::Cached(routes.root_page.clone()),
        Fallback::OfflinePage,
      ])
    } else {
      Self::new(vec![Fallback::Unavailable])
    }
  }

  #[cfg(test)]
  pub fn steps(&self) -> &[Fallback] {
    &self.steps
  }

  /// Walk the chain. Cache misses and cache read errors move on to the next step;
  /// a chain that runs dry ends in `Unavailable`.
  pub fn resolve<S: CacheStorage + ?Sized>(&self, caches: &S, origin: &Url) -> Response {
    for step in &self.steps {
      match step {
        Fallback::Cached(path) => {
          let key = match origin.join(path) {
            Ok(url) => Request::get(url).cache_key(),
            Err(e) => {
              warn!(path = %path, error = %e, "Invalid fallback path");
              continue;
            }
          };

          match caches.find(&key) {
            Ok(Some(cached)) => {
              debug!(fallback = %key, "Serving cached fallback");
              return cached.response;
            }
            Ok(None) => continue,
            Err(e) => warn!(fallback = %key, error = %e, "Failed to read fallback from cache"),
          }
        }
        Fallback::OfflinePage => return offline_page(),
        Fallback::OfflineImage => return offline_image(),
        Fallback::Unavailable => return unavailable(),
      }
    }

    unavailable()
  }
}

/// Body returned for API requests with neither network nor cached copy.
pub(crate) fn offline_api_response() -> Response {
  let body = serde_json::json!({
    "error": "Network unavailable",
    "offline": true,
    "message": "This data is not available offline",
  });
  Response::new(503, "application/json", body.to_string())
}

pub(crate) fn offline_page() -> Response {
  Response::html(OFFLINE_HTML)
}

pub(crate) fn offline_image() -> Response {
  Response::new(200, "image/svg+xml", OFFLINE_SVG)
}

pub(crate) fn unavailable() -> Response {
  Response::new(503, "text/plain", "Resource not available offline")
}
