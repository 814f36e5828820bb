use crate::config::{CacheNames, Config};
use crate::http::{Destination, Request};

/// How an intercepted request is handled, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Cross-origin: left to the default network behaviour
  Bypass,
  /// API path: network-first with the API partition as fallback
  Api,
  /// Full page load: cache-first, then network, then offline pages
  Navigation,
  /// Any other same-origin resource: cache-first, then network
  Asset,
}

impl Route {
  pub fn classify(request: &Request, config: &Config) -> Self {
    if request.url.origin() != config.origin.origin() {
      Route::Bypass
    } else if request.url.path().starts_with(&config.routes.api_prefix) {
      Route::Api
    } else if request.is_navigation() {
      Route::Navigation
    } else {
      Route::Asset
    }
  }
}

/// Partition a freshly fetched asset is stored in.
pub(crate) fn asset_partition<'a>(
  request: &Request,
  config: &Config,
  names: &'a CacheNames,
) -> &'a str {
  let is_static = request.url.as_str().contains(&config.routes.assets_marker)
    || matches!(
      request.destination,
      Destination::Script | Destination::Style | Destination::Image
    );

  if is_static {
    &names.static_assets
  } else {
    &names.dynamic
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn config() -> Config {
    let mut config = Config::default();
    config.set_origin("https://pritechvior.com").unwrap();
    config
  }

  fn url(path: &str) -> Url {
    Url::parse(&format!("https://pritechvior.com{}", path)).unwrap()
  }

  #[test]
  fn test_cross_origin_is_bypassed_even_for_api_paths() {
    let config = config();
    let request = Request::navigate(Url::parse("https://api.example.com/api/projects/").unwrap());
    assert_eq!(Route::classify(&request, &config), Route::Bypass);

    let other_port = Request::get(Url::parse("https://pritechvior.com:8443/app.js").unwrap());
    assert_eq!(Route::classify(&other_port, &config), Route::Bypass);
  }

  #[test]
  fn test_api_prefix_wins_over_navigation() {
    let config = config();
    let request = Request::navigate(url("/api/blog/api/posts/"));
    assert_eq!(Route::classify(&request, &config), Route::Api);
  }

  #[test]
  fn test_api_prefix_needs_trailing_segment() {
    let config = config();
    assert_eq!(
      Route::classify(&Request::get(url("/apiary.png")), &config),
      Route::Asset
    );
  }

  #[test]
  fn test_navigation_and_asset_routes() {
    let config = config();
    assert_eq!(
      Route::classify(&Request::navigate(url("/dashboard")), &config),
      Route::Navigation
    );
    assert_eq!(
      Route::classify(&Request::get(url("/assets/index.js")), &config),
      Route::Asset
    );
  }

  #[test]
  fn test_asset_partition_selection() {
    let config = config();
    let names = config.cache_names();

    let bundle = Request::get(url("/assets/vendor-abc.js"));
    assert_eq!(asset_partition(&bundle, &config, &names), names.static_assets);

    let image = Request::get(url("/images/team.jpg")).with_destination(Destination::Image);
    assert_eq!(asset_partition(&image, &config, &names), names.static_assets);

    let font = Request::get(url("/fonts/inter.woff2")).with_destination(Destination::Font);
    assert_eq!(asset_partition(&font, &config, &names), names.dynamic);

    let data = Request::get(url("/data/courses.json"));
    assert_eq!(asset_partition(&data, &config, &names), names.dynamic);
  }
}
