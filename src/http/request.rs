use reqwest::Method;
use url::Url;

/// How the browsing context issued the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// Full-page load triggered by navigation
  Navigate,
  SameOrigin,
  NoCors,
  Cors,
}

impl RequestMode {
  /// Parse a mode name as used by the fetch API (`"navigate"`, `"no-cors"`, ...).
  pub fn parse(name: &str) -> Option<Self> {
    match name.to_ascii_lowercase().as_str() {
      "navigate" => Some(Self::Navigate),
      "same-origin" => Some(Self::SameOrigin),
      "no-cors" => Some(Self::NoCors),
      "cors" => Some(Self::Cors),
      _ => None,
    }
  }
}

/// What the fetched resource will be used as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
  Document,
  Script,
  Style,
  Image,
  Font,
  Manifest,
  #[default]
  Empty,
  Other,
}

impl Destination {
  /// Parse a destination name as used by the fetch API (`"image"`, `"script"`, ...).
  pub fn parse(name: &str) -> Self {
    match name.to_ascii_lowercase().as_str() {
      "document" => Self::Document,
      "script" => Self::Script,
      "style" => Self::Style,
      "image" => Self::Image,
      "font" => Self::Font,
      "manifest" => Self::Manifest,
      "" => Self::Empty,
      _ => Self::Other,
    }
  }
}

/// An intercepted request
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub mode: RequestMode,
  pub destination: Destination,
}

impl Request {
  /// Sub-resource GET request with no particular destination.
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::Cors,
      destination: Destination::Empty,
    }
  }

  /// Navigation request for a full HTML document.
  pub fn navigate(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::Navigate,
      destination: Destination::Document,
    }
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  pub fn with_mode(mut self, mode: RequestMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }

  /// Whether the response to this request may be read from or written to a partition.
  pub fn is_cacheable(&self) -> bool {
    self.method == Method::GET
  }

  /// Key the response is stored under: the URL without its fragment.
  pub fn cache_key(&self) -> String {
    let mut url = self.url.clone();
    url.set_fragment(None);
    url.into()
  }
}
