//! Network access for the worker.
//!
//! The worker never talks to `reqwest` directly; it goes through the
//! `Network` trait so fetch strategies can be exercised without a server.
//! A returned `Ok` means the transport succeeded, whatever the status code.

mod client;
mod error;

use std::future::Future;

use crate::http::{Request, Response};

pub use client::HttpNetwork;
pub use error::NetworkError;

/// Performs real fetches on behalf of the worker.
pub trait Network: Send + Sync {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response, NetworkError>> + Send;
}
