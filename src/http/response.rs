use reqwest::StatusCode;

/// Response type as exposed by the fetch API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
  /// Same-origin response
  Basic,
  /// Cross-origin response received with CORS
  Cors,
  /// Cross-origin response whose contents are hidden
  Opaque,
  /// Response constructed locally rather than received from the network
  Default,
}

impl ResponseType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Basic => "basic",
      Self::Cors => "cors",
      Self::Opaque => "opaque",
      Self::Default => "default",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "basic" => Some(Self::Basic),
      "cors" => Some(Self::Cors),
      "opaque" => Some(Self::Opaque),
      "default" => Some(Self::Default),
      _ => None,
    }
  }
}

/// A complete, buffered HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
  pub status: u16,
  pub status_text: String,
  /// Header name/value pairs in arrival order; names are lowercase
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  pub kind: ResponseType,
  /// Final URL after redirects, empty for synthesized responses
  pub url: String,
}

impl Response {
  /// Locally constructed response.
  pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      status_text: status_text(status).to_string(),
      headers: vec![("content-type".to_string(), content_type.to_string())],
      body: body.into(),
      kind: ResponseType::Default,
      url: String::new(),
    }
  }

  pub fn html(body: &str) -> Self {
    Self::new(200, "text/html", body)
  }

  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn content_type(&self) -> Option<&str> {
    self.header("content-type")
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

fn status_text(status: u16) -> &'static str {
  StatusCode::from_u16(status)
    .ok()
    .and_then(|code| code.canonical_reason())
    .unwrap_or("")
}
