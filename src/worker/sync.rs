//! Background refresh of the API partition.

use color_eyre::Result;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::CacheStorage;
use crate::http::Request;
use crate::network::Network;

use super::host::{ClientMessage, Host};
use super::OfflineWorker;

const SYNC_COMPLETE_MESSAGE: &str = "Data synchronized successfully";

/// Per-key outcome of one sync sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  /// Keys overwritten with a fresh 200 response
  pub refreshed: Vec<String>,
  /// Keys whose refetch returned another status; the stored copy is kept
  pub skipped: Vec<(String, u16)>,
  /// Keys whose refetch failed at the transport level
  pub failed: Vec<(String, String)>,
  /// Clients that received the completion message
  pub notified_clients: usize,
}

impl<S: CacheStorage, N: Network, H: Host> OfflineWorker<S, N, H> {
  /// Refetch every stored API response once, then tell all clients.
  ///
  /// Each key is tried exactly once per sweep; there is no retry or backoff.
  /// Only failing to list the partition aborts the sweep.
  pub async fn sync_api_cache(&self) -> Result<SyncReport> {
    info!("Background sync triggered");
    let keys = self.caches.keys(&self.names.api)?;
    let mut report = SyncReport::default();

    for key in keys {
      let url = match Url::parse(&key) {
        Ok(url) => url,
        Err(e) => {
          warn!(key = %key, error = %e, "Sync failed for unparsable key");
          report.failed.push((key, e.to_string()));
          continue;
        }
      };

      let request = Request::get(url);
      match self.network.fetch(&request).await {
        Ok(response) if response.status == 200 => {
          match self.caches.put(&self.names.api, &key, &response) {
            Ok(()) => {
              debug!(key = %key, "Refreshed");
              report.refreshed.push(key);
            }
            Err(e) => {
              warn!(key = %key, error = %e, "Failed to store refreshed response");
              report.failed.push((key, e.to_string()));
            }
          }
        }
        Ok(response) => {
          debug!(key = %key, status = response.status, "Keeping stored copy");
          report.skipped.push((key, response.status));
        }
        Err(e) => {
          warn!(key = %key, error = %e, "Sync failed");
          report.failed.push((key, e.to_string()));
        }
      }
    }

    let message = ClientMessage::SyncComplete {
      message: SYNC_COMPLETE_MESSAGE.to_string(),
    };
    report.notified_clients = match self.host.post_message(&message) {
      Ok(count) => count,
      Err(e) => {
        warn!(error = %e, "Failed to notify clients of sync completion");
        0
      }
    };

    info!(
      refreshed = report.refreshed.len(),
      skipped = report.skipped.len(),
      failed = report.failed.len(),
      "Background sync complete"
    );
    Ok(report)
  }
}
