//! The cache worker: lifecycle state plus handlers for each hook.
//!
//! A worker moves through `install` → `activate` and then serves `fetch`
//! events through the [`CacheRouter`]. Requests are only intercepted once
//! activation's cleanup has finished.

mod hooks;
mod lifecycle;
mod router;

pub use hooks::{
  handle_push, handle_sync, Hook, HookOutcome, Notification, NotificationData, WorkerEvent,
  SYNC_WEATHER_TAG,
};
pub use lifecycle::{populate_static, purge_stale};
pub use router::{CacheRouter, FetchOutcome, ResponseSource, Route};

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::cache::{CacheStorage, StoreNames};
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::http::Request;

/// Lifecycle state of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Parsed,
  Installing,
  Installed,
  Activating,
  Activated,
  /// Install failed; this version will never serve
  Redundant,
}

/// One version of the cache worker.
pub struct ServiceWorker<S: CacheStorage, F: Fetcher> {
  storage: Arc<S>,
  fetcher: Arc<F>,
  names: StoreNames,
  assets: Vec<Url>,
  router: CacheRouter<S, F>,
  state: WorkerState,
  /// Open pages are controlled without waiting for a navigation
  controls_clients: bool,
}

impl<S: CacheStorage, F: Fetcher> ServiceWorker<S, F> {
  pub fn new(config: &Config, storage: Arc<S>, fetcher: Arc<F>) -> Result<Self> {
    let names = config.store_names();
    let assets = config.static_asset_urls()?;
    let router = CacheRouter::new(
      Arc::clone(&storage),
      Arc::clone(&fetcher),
      config.origin.clone(),
      config.api_host.clone(),
      names.clone(),
      config.offline_body.clone(),
    );

    Ok(Self {
      storage,
      fetcher,
      names,
      assets,
      router,
      state: WorkerState::Parsed,
      controls_clients: false,
    })
  }

  /// Pick up a version that was installed and activated earlier.
  ///
  /// The static store is only written by a complete install, so its presence
  /// means this version made it through install.
  pub fn resume(mut self) -> Result<Self> {
    if self.storage.has(&self.names.static_store)? {
      self.state = WorkerState::Activated;
      self.controls_clients = true;
    }
    Ok(self)
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn names(&self) -> &StoreNames {
    &self.names
  }

  pub fn router(&self) -> &CacheRouter<S, F> {
    &self.router
  }

  /// Whether fetch events are intercepted.
  pub fn controls_clients(&self) -> bool {
    self.controls_clients && self.state == WorkerState::Activated
  }

  /// `install` hook: fill the static store. Any failure makes the version redundant.
  pub async fn install(&mut self) -> Result<usize> {
    info!(version = %self.names.static_store, "Installing");
    self.state = WorkerState::Installing;

    match populate_static(
      self.storage.as_ref(),
      self.fetcher.as_ref(),
      &self.names,
      &self.assets,
    )
    .await
    {
      Ok(count) => {
        // skip waiting: ready to activate straight away
        self.state = WorkerState::Installed;
        Ok(count)
      }
      Err(e) => {
        warn!(error = %e, "Install failed");
        self.state = WorkerState::Redundant;
        Err(e)
      }
    }
  }

  /// `activate` hook: drop stale stores, then claim open clients.
  ///
  /// Errors unless this version is installed (or already active), leaving the
  /// previous version's stores untouched.
  pub async fn activate(&mut self) -> Result<Vec<String>> {
    if !matches!(self.state, WorkerState::Installed | WorkerState::Activated) {
      return Err(eyre!(
        "Cannot activate {}: worker is {:?}, not installed",
        self.names.static_store,
        self.state
      ));
    }

    info!(version = %self.names.static_store, "Activating");
    self.state = WorkerState::Activating;

    let deleted = purge_stale(self.storage.as_ref(), &self.names)?;

    self.state = WorkerState::Activated;
    self.controls_clients = true;
    Ok(deleted)
  }

  /// Install and, since the worker skips waiting, activate right after.
  pub async fn start(&mut self) -> Result<(usize, Vec<String>)> {
    let assets = self.install().await?;
    let deleted = self.activate().await?;
    Ok((assets, deleted))
  }

  /// `fetch` hook.
  pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome> {
    if !self.controls_clients() {
      return Ok(FetchOutcome::Passthrough);
    }
    self.router.handle(request).await
  }

  /// Route an event to the handler registered for its hook.
  pub async fn dispatch(&mut self, event: WorkerEvent) -> Result<HookOutcome> {
    match event {
      WorkerEvent::Install => {
        let assets = self.install().await?;
        Ok(HookOutcome::Installed { assets })
      }
      WorkerEvent::Activate => {
        let deleted = self.activate().await?;
        Ok(HookOutcome::Activated { deleted })
      }
      WorkerEvent::Fetch(request) => Ok(HookOutcome::Fetch(self.handle_fetch(&request).await?)),
      WorkerEvent::Sync { tag } => Ok(HookOutcome::Synced {
        handled: handle_sync(&tag),
      }),
      WorkerEvent::Push { data } => Ok(HookOutcome::Notify(handle_push(data.as_deref()))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{RequestKey, SqliteStorage};
  use crate::fetch::testing::{ok, ScriptedFetcher};

  fn config(version: &str) -> Config {
    Config::from_yaml(&format!(
      "origin: http://localhost:8080/\ncache:\n  version: '{}'\nstatic_assets: ['./', './index.html']\n",
      version
    ))
    .unwrap()
  }

  fn fetcher() -> Arc<ScriptedFetcher> {
    let fetcher = ScriptedFetcher::new();
    fetcher.route("http://localhost:8080/", ok("root"));
    fetcher.route("http://localhost:8080/index.html", ok("index"));
    Arc::new(fetcher)
  }

  fn get(url: &str) -> Request {
    Request::get(Url::parse(url).unwrap())
  }

  #[tokio::test]
  async fn test_full_lifecycle() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let mut worker = ServiceWorker::new(&config("1"), storage.clone(), fetcher()).unwrap();
    assert_eq!(worker.state(), WorkerState::Parsed);

    let (assets, deleted) = worker.start().await.unwrap();
    assert_eq!(assets, 2);
    assert!(deleted.is_empty());
    assert_eq!(worker.state(), WorkerState::Activated);
    assert!(worker.controls_clients());

    let outcome = worker
      .handle_fetch(&get("http://localhost:8080/index.html"))
      .await
      .unwrap();
    assert_eq!(outcome.source(), Some(ResponseSource::Cache));
  }

  #[tokio::test]
  async fn test_fetch_passes_through_before_activation() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let fetcher = fetcher();
    let mut worker = ServiceWorker::new(&config("1"), storage, fetcher.clone()).unwrap();

    worker.install().await.unwrap();
    assert_eq!(worker.state(), WorkerState::Installed);

    let outcome = worker
      .handle_fetch(&get("http://localhost:8080/index.html"))
      .await
      .unwrap();
    assert_eq!(outcome, FetchOutcome::Passthrough);
  }

  #[tokio::test]
  async fn test_failed_install_is_redundant() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let fetcher = fetcher();
    fetcher.fail("http://localhost:8080/index.html");
    let mut worker = ServiceWorker::new(&config("1"), storage.clone(), fetcher).unwrap();

    assert!(worker.start().await.is_err());
    assert_eq!(worker.state(), WorkerState::Redundant);
    assert!(!worker.controls_clients());

    let key = RequestKey::from(&get("http://localhost:8080/"));
    assert!(storage
      .match_in(&worker.names().static_store, &key)
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn test_activate_after_failed_install_keeps_previous_version() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let fetcher = fetcher();

    let mut v1 = ServiceWorker::new(&config("1"), storage.clone(), fetcher.clone()).unwrap();
    v1.start().await.unwrap();

    fetcher.fail("http://localhost:8080/index.html");
    let mut v2 = ServiceWorker::new(&config("2"), storage.clone(), fetcher).unwrap();
    assert!(v2.install().await.is_err());
    assert_eq!(v2.state(), WorkerState::Redundant);

    assert!(v2.dispatch(WorkerEvent::Activate).await.is_err());
    assert_eq!(v2.state(), WorkerState::Redundant);
    assert!(!v2.controls_clients());
    assert_eq!(storage.keys().unwrap(), vec!["weather-app-v1"]);

    let key = RequestKey::from(&get("http://localhost:8080/index.html"));
    assert!(storage.match_in("weather-app-v1", &key).unwrap().is_some());
  }

  #[tokio::test]
  async fn test_activate_requires_install() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    storage.open("weather-app-v0").unwrap();
    let mut worker = ServiceWorker::new(&config("1"), storage.clone(), fetcher()).unwrap();

    let err = worker.activate().await.unwrap_err();
    assert!(err.to_string().contains("not installed"));
    assert_eq!(worker.state(), WorkerState::Parsed);
    assert_eq!(storage.keys().unwrap(), vec!["weather-app-v0"]);
  }

  #[tokio::test]
  async fn test_resume_after_failed_install_stays_inactive() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let fetcher = fetcher();
    fetcher.fail("http://localhost:8080/");

    let mut failed = ServiceWorker::new(&config("1"), storage.clone(), fetcher.clone()).unwrap();
    assert!(failed.start().await.is_err());

    let resumed = ServiceWorker::new(&config("1"), storage, fetcher)
      .unwrap()
      .resume()
      .unwrap();
    assert_eq!(resumed.state(), WorkerState::Parsed);
    assert!(!resumed.controls_clients());

    let outcome = resumed
      .handle_fetch(&get("http://localhost:8080/index.html"))
      .await
      .unwrap();
    assert_eq!(outcome, FetchOutcome::Passthrough);
  }

  #[tokio::test]
  async fn test_resumed_worker_can_reactivate() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let fetcher = fetcher();
    storage.open("weather-app-runtime-v0").unwrap();

    ServiceWorker::new(&config("1"), storage.clone(), fetcher.clone())
      .unwrap()
      .install()
      .await
      .unwrap();

    let mut resumed = ServiceWorker::new(&config("1"), storage.clone(), fetcher)
      .unwrap()
      .resume()
      .unwrap();
    assert_eq!(resumed.activate().await.unwrap(), vec!["weather-app-runtime-v0"]);
    assert_eq!(storage.keys().unwrap(), vec!["weather-app-v1"]);
  }

  #[tokio::test]
  async fn test_version_bump_purges_previous_stores() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let fetcher = fetcher();

    let mut v1 = ServiceWorker::new(&config("1"), storage.clone(), fetcher.clone()).unwrap();
    v1.start().await.unwrap();
    storage
      .put(
        &v1.names().runtime_store,
        &RequestKey::from(&get("http://localhost:8080/api.openweathermap.org/x")),
        &ok("{}"),
      )
      .unwrap();

    let mut v2 = ServiceWorker::new(&config("2"), storage.clone(), fetcher).unwrap();
    let (_, deleted) = v2.start().await.unwrap();

    assert_eq!(deleted, vec!["weather-app-v1", "weather-app-runtime-v1"]);
    assert_eq!(storage.keys().unwrap(), vec!["weather-app-v2"]);
  }

  #[tokio::test]
  async fn test_resume_detects_installed_version() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let fetcher = fetcher();

    let fresh = ServiceWorker::new(&config("1"), storage.clone(), fetcher.clone())
      .unwrap()
      .resume()
      .unwrap();
    assert_eq!(fresh.state(), WorkerState::Parsed);

    ServiceWorker::new(&config("1"), storage.clone(), fetcher.clone())
      .unwrap()
      .start()
      .await
      .unwrap();

    let resumed = ServiceWorker::new(&config("1"), storage, fetcher)
      .unwrap()
      .resume()
      .unwrap();
    assert_eq!(resumed.state(), WorkerState::Activated);
    assert!(resumed.controls_clients());
  }

  #[tokio::test]
  async fn test_dispatch_routes_each_hook() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let mut worker = ServiceWorker::new(&config("1"), storage, fetcher()).unwrap();

    assert_eq!(
      worker.dispatch(WorkerEvent::Install).await.unwrap(),
      HookOutcome::Installed { assets: 2 }
    );
    assert_eq!(
      worker.dispatch(WorkerEvent::Activate).await.unwrap(),
      HookOutcome::Activated { deleted: vec![] }
    );
    assert_eq!(
      worker
        .dispatch(WorkerEvent::Fetch(get("https://example.org/")))
        .await
        .unwrap(),
      HookOutcome::Fetch(FetchOutcome::Passthrough)
    );
    assert_eq!(
      worker
        .dispatch(WorkerEvent::Sync {
          tag: SYNC_WEATHER_TAG.to_string()
        })
        .await
        .unwrap(),
      HookOutcome::Synced { handled: true }
    );

    match worker
      .dispatch(WorkerEvent::Push {
        data: Some("Rain at 5".to_string()),
      })
      .await
      .unwrap()
    {
      HookOutcome::Notify(n) => assert_eq!(n.body, "Rain at 5"),
      other => panic!("unexpected outcome: {:?}", other),
    }
  }
}
