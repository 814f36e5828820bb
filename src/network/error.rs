use thiserror::Error;

/// Transport-level fetch failure. HTTP error statuses are not errors.
#[derive(Error, Debug)]
pub enum NetworkError {
  #[error("Request timed out: {0}")]
  Timeout(String),

  #[error("Connection failed: {0}")]
  Connect(String),

  #[error("Failed to read response body: {0}")]
  Body(String),

  #[error("Network error: {0}")]
  Other(#[from] reqwest::Error),

  #[error("Invalid request: {0}")]
  InvalidRequest(String),
}

impl NetworkError {
  /// Classify a reqwest error by what went wrong.
  pub fn from_reqwest(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      NetworkError::Timeout(err.to_string())
    } else if err.is_connect() {
      NetworkError::Connect(err.to_string())
    } else if err.is_body() || err.is_decode() {
      NetworkError::Body(err.to_string())
    } else if err.is_builder() {
      NetworkError::InvalidRequest(err.to_string())
    } else {
      NetworkError::Other(err)
    }
  }
}
