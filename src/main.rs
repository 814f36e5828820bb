mod cache;
mod config;
mod db;
mod http;
mod network;
mod worker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cache::{CacheStorage, SqliteStorage};
use http::{Destination, Request, RequestMode};
use network::HttpNetwork;
use worker::{
  ActivateReport, ConsoleHost, Event, EventOutcome, FetchOutcome, InstallReport, OfflineWorker,
  SyncReport,
};

type Worker = OfflineWorker<SqliteStorage, HttpNetwork, ConsoleHost>;

#[derive(Parser, Debug)]
#[command(name = "vior-sw")]
#[command(about = "Offline cache manager for the PritechVior web portal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/vior-sw/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Origin the worker is registered for
  #[arg(long)]
  origin: Option<String>,

  /// Path of the cache database
  #[arg(long)]
  db: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  /// Enable debug logging
  #[arg(short, long)]
  verbose: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Install and activate the current generation
  Start,
  /// Run the install phase
  Install,
  /// Run the activate phase of an installed generation
  Activate,
  /// Intercept a request the way a page of the origin would issue it
  Fetch {
    /// Path or absolute URL
    target: String,
    /// Shorthand for --mode navigate --destination document
    #[arg(long)]
    navigate: bool,
    /// Request mode (navigate, same-origin, no-cors, cors)
    #[arg(long, default_value = "cors")]
    mode: String,
    /// Request destination (document, script, style, image, font, manifest)
    #[arg(long, default_value = "")]
    destination: String,
    #[arg(long, default_value = "GET")]
    method: String,
    /// Print the response body
    #[arg(long)]
    body: bool,
  },
  /// Fire a background sync event
  Sync {
    /// Sync tag (default: the configured tag)
    #[arg(long)]
    tag: Option<String>,
  },
  /// Deliver a push message
  Push { text: Option<String> },
  /// Click the last shown notification
  Click {
    #[arg(long)]
    action: Option<String>,
  },
  /// Post a JSON message from a client page
  Message { json: String },
  /// List partitions and entry counts
  Caches,
  /// Remove a URL from every partition of the current generation
  Forget { target: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Keep the guard alive so buffered log lines are flushed on exit
  let _guard = init_tracing(args.verbose, args.log_file.as_deref())?;

  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(origin) = &args.origin {
    config.set_origin(origin)?;
  }
  if let Some(db) = args.db {
    config.database = Some(db);
  }

  let storage = Arc::new(SqliteStorage::open(&config.database_path()?)?);
  let network = HttpNetwork::new(&config.network)?;
  let worker = OfflineWorker::new(config, storage, network, ConsoleHost);

  run(&worker, args.command).await
}

fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let default_filter = if verbose { "warn,vior_sw=debug" } else { "warn" };
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

  let Some(path) = log_file else {
    tracing_subscriber::registry()
      .with(filter)
      .with(fmt::layer().with_writer(std::io::stderr))
      .init();
    return Ok(None);
  };

  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
  let dir = match path.parent() {
    Some(dir) if !dir.as_os_str().is_empty() => dir,
    _ => Path::new("."),
  };
  std::fs::create_dir_all(dir)?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .init();
  Ok(Some(guard))
}

async fn run(worker: &Worker, command: Command) -> Result<()> {
  match command {
    Command::Start => {
      worker.ensure_active().await?;
      println!("{} ({})", worker.cache_names().static_assets, worker.state());
    }
    Command::Install => {
      if let EventOutcome::Installed(report) = worker.dispatch(Event::Install).await? {
        print_install(&report);
      }
    }
    Command::Activate => {
      if !worker.resume()? {
        return Err(eyre!("Current generation is not installed, run `vior-sw install` first"));
      }
      if let EventOutcome::Activated(report) = worker.dispatch(Event::Activate).await? {
        print_activate(&report);
      }
    }
    Command::Fetch {
      target,
      navigate,
      mode,
      destination,
      method,
      body,
    } => {
      let request = build_request(worker, &target, navigate, &mode, &destination, &method)?;
      worker.ensure_active().await?;
      if let EventOutcome::Fetched(outcome) = worker.dispatch(Event::Fetch(request)).await? {
        print_fetch(&outcome, body);
      }
    }
    Command::Sync { tag } => {
      worker.ensure_active().await?;
      let tag = tag.unwrap_or_else(|| worker.config().sync.tag.clone());
      match worker.dispatch(Event::Sync { tag: tag.clone() }).await? {
        EventOutcome::Synced(report) => print_sync(&report),
        _ => println!("Ignored sync tag '{}'", tag),
      }
    }
    Command::Push { text } => {
      worker.ensure_active().await?;
      worker.dispatch(Event::Push { data: text }).await?;
    }
    Command::Click { action } => {
      worker.ensure_active().await?;
      worker.dispatch(Event::NotificationClick { action }).await?;
    }
    Command::Message { json } => {
      let message: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| eyre!("Invalid message JSON: {}", e))?;
      worker.resume()?;
      match worker.dispatch(Event::Message(message)).await? {
        EventOutcome::Activated(report) => print_activate(&report),
        EventOutcome::Ignored => println!("Ignored message"),
        _ => println!("Worker state: {}", worker.state()),
      }
    }
    Command::Caches => print_caches(worker)?,
    Command::Forget { target } => {
      let request = Request::get(worker.config().resolve(&target)?);
      let key = request.cache_key();
      let mut removed = 0;
      for name in worker.cache_names().whitelist() {
        if worker.caches().remove(name, &key)? {
          removed += 1;
        }
      }
      println!("Removed {} from {} partition(s)", request.url, removed);
    }
  }

  Ok(())
}

fn build_request(
  worker: &Worker,
  target: &str,
  navigate: bool,
  mode: &str,
  destination: &str,
  method: &str,
) -> Result<Request> {
  let url = worker.config().resolve(target)?;
  if navigate {
    return Ok(Request::navigate(url));
  }

  let mode = RequestMode::parse(mode).ok_or_else(|| eyre!("Unknown request mode '{}'", mode))?;
  let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
    .map_err(|e| eyre!("Invalid method '{}': {}", method, e))?;

  Ok(
    Request::get(url)
      .with_mode(mode)
      .with_destination(Destination::parse(destination))
      .with_method(method),
  )
}

fn print_install(report: &InstallReport) {
  println!("Cached {} asset(s)", report.cached.len());
  for (path, reason) in &report.failed {
    println!("  failed {}: {}", path, reason);
  }
}

fn print_activate(report: &ActivateReport) {
  if report.deleted.is_empty() {
    println!("No stale partitions");
  }
  for name in &report.deleted {
    println!("Deleted {}", name);
  }
}

fn print_fetch(outcome: &FetchOutcome, show_body: bool) {
  let (Some(response), Some(source)) = (outcome.response(), outcome.source()) else {
    println!("Passthrough (not intercepted)");
    return;
  };

  println!("{} {} ({:?})", response.status, response.status_text, source);
  println!(
    "{}, {} bytes",
    response.content_type().unwrap_or("no content type"),
    response.body.len()
  );
  if show_body {
    println!();
    println!("{}", response.text());
  }
}

fn print_sync(report: &SyncReport) {
  println!("Refreshed {} API response(s)", report.refreshed.len());
  for (url, status) in &report.skipped {
    println!("  skipped {} ({})", url, status);
  }
  for (url, reason) in &report.failed {
    println!("  failed {}: {}", url, reason);
  }
  println!("Notified {} client(s)", report.notified_clients);
}

fn print_caches(worker: &Worker) -> Result<()> {
  let names = worker.cache_names();
  let caches = worker.caches();
  for name in caches.names()? {
    let marker = if names.contains(&name) { "current" } else { "stale" };
    let keys = caches.keys(&name)?;
    let last_write = match keys.last() {
      Some(key) => caches
        .get(&name, key)?
        .map(|entry| entry.cached_at.format("%Y-%m-%d %H:%M:%S").to_string()),
      None => None,
    };
    println!(
      "{}\t{}\t{} entries\tlast write {}",
      name,
      marker,
      keys.len(),
      last_write.as_deref().unwrap_or("-")
    );
  }
  Ok(())
}
