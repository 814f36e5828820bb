//! HTTP implementation of `Network` backed by reqwest.

use std::time::Duration;

use color_eyre::Result;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::NetworkConfig;
use crate::http::{Request, Response, ResponseType};

use super::{Network, NetworkError};

/// Fetches requests over HTTP.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpNetwork {
  client: Client,
}

impl HttpNetwork {
  pub fn new(config: &NetworkConfig) -> Result<Self> {
    let mut builder = Client::builder();
    if let Some(secs) = config.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }

    Ok(Self {
      client: builder.build()?,
    })
  }

  async fn send(&self, request: &Request) -> Result<Response, NetworkError> {
    let response = self
      .client
      .request(request.method.clone(), request.url.clone())
      .send()
      .await
      .map_err(NetworkError::from_reqwest)?;

    let status = response.status();
    let final_url = response.url().clone();
    let headers = response
      .headers()
      .iter()
      .map(|(name, value)| {
        (
          name.as_str().to_string(),
          String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(NetworkError::from_reqwest)?
      .to_vec();

    debug!(url = %request.url, status = status.as_u16(), bytes = body.len(), "Fetched");

    Ok(Response {
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or("").to_string(),
      headers,
      body,
      kind: response_type(&request.url, &final_url),
      url: final_url.into(),
    })
  }
}

impl Network for HttpNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
    self.send(request).await
  }
}

/// A response is `basic` when it ends up on the origin it was requested from.
fn response_type(requested: &Url, final_url: &Url) -> ResponseType {
  if requested.origin() == final_url.origin() {
    ResponseType::Basic
  } else {
    ResponseType::Cors
  }
}
