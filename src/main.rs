use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use reqwest::Method;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use url::Url;

use weather_sw::worker::{handle_push, handle_sync};
use weather_sw::{
  CacheStorage, Config, FetchOutcome, Fetcher, HttpFetcher, Request, Response, ServiceWorker,
  SqliteStorage,
};

#[derive(Parser, Debug)]
#[command(name = "weather-sw")]
#[command(about = "Offline cache router for the Weather Now app")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/weather-sw/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Store database (default: $XDG_DATA_HOME/weather-sw/caches.db)
  #[arg(long)]
  db: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Cache the static assets for the configured version, then activate it
  Install,
  /// Delete stores left over from other versions (the configured version must be installed)
  Activate,
  /// Serve URLs through the worker, concurrently
  Fetch {
    #[arg(required = true)]
    urls: Vec<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,
  },
  /// List stores and their entry counts
  Stores,
  /// Deliver a background sync event
  Sync { tag: String },
  /// Deliver a push message and print the resulting notification
  Push { text: Option<String> },
}

fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weather_sw=info"));

  match log_file {
    Some(path) => {
      let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
      let name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      let appender = tracing_appender::rolling::never(dir.unwrap_or(Path::new(".")), name);
      let (writer, guard) = tracing_appender::non_blocking(appender);

      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
      Ok(None)
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = init_logging(args.log_file.as_deref())?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let db_path = args.db.or_else(|| config.database.clone());

  match args.command {
    Command::Install => {
      let (storage, fetcher) = connect(&config, db_path.as_deref())?;
      let mut worker = ServiceWorker::new(&config, storage, fetcher)?;
      let (assets, deleted) = worker.start().await?;
      println!(
        "installed {} ({} assets), removed {} old store(s)",
        worker.names().static_store,
        assets,
        deleted.len()
      );
    }
    Command::Activate => {
      let (storage, fetcher) = connect(&config, db_path.as_deref())?;
      // Refuses unless this version's install completed
      let mut worker = ServiceWorker::new(&config, storage, fetcher)?.resume()?;
      for name in worker.activate().await? {
        println!("deleted {}", name);
      }
    }
    Command::Fetch { urls, method } => {
      let (storage, fetcher) = connect(&config, db_path.as_deref())?;
      let worker = ServiceWorker::new(&config, storage, fetcher.clone())?.resume()?;
      if !worker.controls_clients() {
        info!("Worker not installed yet, requests go straight to the network");
      }

      let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|e| eyre!("Invalid method '{}': {}", method, e))?;
      let requests = urls
        .iter()
        .map(|u| {
          Url::parse(u)
            .or_else(|_| config.origin.join(u))
            .map(|url| Request::new(method.clone(), url))
            .map_err(|e| eyre!("Invalid URL '{}': {}", u, e))
        })
        .collect::<Result<Vec<_>>>()?;

      // Each request is an independent task
      let outcomes = join_all(requests.iter().map(|request| {
        let worker = &worker;
        let fetcher = &fetcher;
        async move {
          let outcome = worker.handle_fetch(request).await?;
          let line = match outcome {
            FetchOutcome::Passthrough => match fetcher.fetch(request).await {
              Ok(resp) => describe("network (not intercepted)", &resp),
              Err(e) => format!("failed (not intercepted): {}", e),
            },
            FetchOutcome::Respond { response, source } => {
              describe(&format!("{:?}", source).to_lowercase(), &response)
            }
            FetchOutcome::NoResponse => "failed: no network and nothing cached".to_string(),
          };
          Ok::<_, color_eyre::Report>(format!("{} {}  {}", request.method, request.url, line))
        }
      }))
      .await;

      for outcome in outcomes {
        println!("{}", outcome?);
      }
    }
    Command::Stores => {
      let (storage, _) = connect(&config, db_path.as_deref())?;
      let names = config.store_names();
      for store in storage.list()? {
        let marker = if names.is_current(&store.name) { "*" } else { " " };
        println!("{} {:<32} {:>6} entries", marker, store.name, store.entries);
      }
    }
    Command::Sync { tag } => {
      let handled = handle_sync(&tag);
      println!("sync {}: {}", tag, if handled { "handled" } else { "ignored" });
    }
    Command::Push { text } => {
      let notification = handle_push(text.as_deref());
      println!("{}", serde_json::to_string_pretty(&notification)?);
    }
  }

  Ok(())
}

/// Open the store database and the network client.
fn connect(config: &Config, db: Option<&Path>) -> Result<(Arc<SqliteStorage>, Arc<HttpFetcher>)> {
  let storage = match db {
    Some(path) => SqliteStorage::open_at(path)?,
    None => SqliteStorage::open()?,
  };
  let fetcher = HttpFetcher::new(config.origin.clone())?;
  Ok((Arc::new(storage), Arc::new(fetcher)))
}

fn describe(source: &str, response: &Response) -> String {
  format!(
    "{} {} [{}] {} bytes",
    response.status,
    source,
    response.response_type.as_str(),
    response.body.len()
  )
}
