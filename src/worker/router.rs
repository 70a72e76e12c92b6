//! Per-request routing between the stores and the network.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{CacheStorage, RequestKey, StoreNames};
use crate::fetch::Fetcher;
use crate::http::{Request, Response};

/// Strategy picked for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Cross-origin: leave it to the platform
  Passthrough,
  /// Weather API: network, then runtime store on failure
  NetworkFirst,
  /// Everything else: any store, then network
  CacheFirst,
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Live network response
  Network,
  /// Stored snapshot
  Cache,
  /// Synthetic 503
  Offline,
}

/// Result of handling one fetch event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
  /// Not intercepted; the platform's default handling applies
  Passthrough,
  /// The worker answered the request
  Respond {
    response: Response,
    source: ResponseSource,
  },
  /// Intercepted but nothing to answer with; the request fails
  NoResponse,
}

impl FetchOutcome {
  pub fn response(&self) -> Option<&Response> {
    match self {
      FetchOutcome::Respond { response, .. } => Some(response),
      _ => None,
    }
  }

  pub fn source(&self) -> Option<ResponseSource> {
    match self {
      FetchOutcome::Respond { source, .. } => Some(*source),
      _ => None,
    }
  }
}

/// Decides, per request, whether to serve from a store or the network.
pub struct CacheRouter<S: CacheStorage, F: Fetcher> {
  storage: Arc<S>,
  fetcher: Arc<F>,
  origin: Url,
  api_host: String,
  names: StoreNames,
  offline_body: String,
}

impl<S: CacheStorage, F: Fetcher> CacheRouter<S, F> {
  pub fn new(
    storage: Arc<S>,
    fetcher: Arc<F>,
    origin: Url,
    api_host: impl Into<String>,
    names: StoreNames,
    offline_body: impl Into<String>,
  ) -> Self {
    Self {
      storage,
      fetcher,
      origin,
      api_host: api_host.into(),
      names,
      offline_body: offline_body.into(),
    }
  }

  /// Classify a request.
  ///
  /// The origin check comes first, so an API request is only routed
  /// network-first when it is addressed to the app's own origin (e.g. through a
  /// same-origin proxy path that names the API host).
  pub fn route(&self, request: &Request) -> Route {
    if !request.is_same_origin(&self.origin) {
      return Route::Passthrough;
    }

    if self.targets_api(&request.url) {
      Route::NetworkFirst
    } else {
      Route::CacheFirst
    }
  }

  fn targets_api(&self, url: &Url) -> bool {
    url.host_str() == Some(self.api_host.as_str()) || url.as_str().contains(&self.api_host)
  }

  /// Handle one intercepted request.
  ///
  /// Network failures are recovered per strategy. Store lookup failures are
  /// returned as errors.
  pub async fn handle(&self, request: &Request) -> Result<FetchOutcome> {
    let route = self.route(request);
    debug!(url = %request.url, method = %request.method, ?route, "Routing request");

    match route {
      Route::Passthrough => Ok(FetchOutcome::Passthrough),
      Route::NetworkFirst => self.network_first(request).await,
      Route::CacheFirst => self.cache_first(request).await,
    }
  }

  async fn network_first(&self, request: &Request) -> Result<FetchOutcome> {
    let key = RequestKey::from(request);

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        self.store(&self.names.runtime_store, &key, &response);
        Ok(FetchOutcome::Respond {
          response,
          source: ResponseSource::Network,
        })
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "API fetch failed, trying stores");
        Ok(match self.storage.match_any(&key)? {
          Some(cached) => FetchOutcome::Respond {
            response: cached.response,
            source: ResponseSource::Cache,
          },
          None => FetchOutcome::NoResponse,
        })
      }
    }
  }

  async fn cache_first(&self, request: &Request) -> Result<FetchOutcome> {
    let key = RequestKey::from(request);

    if let Some(cached) = self.storage.match_any(&key)? {
      return Ok(FetchOutcome::Respond {
        response: cached.response,
        source: ResponseSource::Cache,
      });
    }

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if response.is_cacheable() {
          self.store(&self.names.static_store, &key, &response);
        }
        Ok(FetchOutcome::Respond {
          response,
          source: ResponseSource::Network,
        })
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "Fetch failed, serving offline response");
        Ok(FetchOutcome::Respond {
          response: Response::offline(&self.offline_body),
          source: ResponseSource::Offline,
        })
      }
    }
  }

  /// Write a snapshot of `response` into `store`.
  ///
  /// The write does not gate the reply. Failures are logged and the live
  /// response is still returned.
  fn store(&self, store: &str, key: &RequestKey, response: &Response) {
    if !key.is_storable() {
      debug!(request = %key.description(), "Skipping cache write for non-GET request");
      return;
    }

    if let Err(e) = self.storage.put(store, key, response) {
      warn!(store, request = %key.description(), error = %e, "Failed to update cache");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;
  use crate::config::DEFAULT_OFFLINE_BODY;
  use crate::fetch::testing::{ok, with_status, ScriptedFetcher};
  use crate::http::ResponseType;
  use reqwest::Method;

  const ORIGIN: &str = "http://localhost:8080/";
  const API_URL: &str = "http://localhost:8080/proxy/api.openweathermap.org/data/2.5/weather?q=Oslo";

  struct Harness {
    storage: Arc<SqliteStorage>,
    fetcher: Arc<ScriptedFetcher>,
    router: CacheRouter<SqliteStorage, ScriptedFetcher>,
    names: StoreNames,
  }

  fn harness() -> Harness {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let fetcher = Arc::new(ScriptedFetcher::new());
    let names = StoreNames::new("weather-app", "1");
    let router = CacheRouter::new(
      Arc::clone(&storage),
      Arc::clone(&fetcher),
      Url::parse(ORIGIN).unwrap(),
      "api.openweathermap.org",
      names.clone(),
      DEFAULT_OFFLINE_BODY,
    );
    Harness {
      storage,
      fetcher,
      router,
      names,
    }
  }

  fn get(url: &str) -> Request {
    Request::get(Url::parse(url).unwrap())
  }

  #[test]
  fn test_route_classification() {
    let h = harness();
    assert_eq!(
      h.router.route(&get("https://api.openweathermap.org/data/2.5/weather")),
      Route::Passthrough
    );
    assert_eq!(h.router.route(&get("https://cdn.example.com/x.js")), Route::Passthrough);
    assert_eq!(h.router.route(&get(API_URL)), Route::NetworkFirst);
    assert_eq!(
      h.router.route(&get("http://localhost:8080/index.html")),
      Route::CacheFirst
    );
  }

  #[tokio::test]
  async fn test_cross_origin_is_not_intercepted() {
    let h = harness();
    let outcome = h
      .router
      .handle(&get("https://api.openweathermap.org/data/2.5/weather?q=Oslo"))
      .await
      .unwrap();

    assert_eq!(outcome, FetchOutcome::Passthrough);
    assert_eq!(h.fetcher.calls(), 0);
    assert!(h.storage.keys().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_network_first_stores_live_response() {
    let h = harness();
    h.fetcher.route(API_URL, ok("{\"temp\": 4}"));

    let request = get(API_URL);
    let outcome = h.router.handle(&request).await.unwrap();

    assert_eq!(outcome.source(), Some(ResponseSource::Network));
    assert_eq!(outcome.response(), Some(&ok("{\"temp\": 4}")));

    let stored = h
      .storage
      .match_in(&h.names.runtime_store, &RequestKey::from(&request))
      .unwrap()
      .unwrap();
    assert_eq!(stored.response, ok("{\"temp\": 4}"));
  }

  #[tokio::test]
  async fn test_network_first_stores_error_statuses_too() {
    let h = harness();
    h.fetcher.route(API_URL, with_status(401, "bad key"));

    let request = get(API_URL);
    let outcome = h.router.handle(&request).await.unwrap();
    assert_eq!(outcome.response().map(|r| r.status), Some(401));
    assert!(h
      .storage
      .match_in(&h.names.runtime_store, &RequestKey::from(&request))
      .unwrap()
      .is_some());
  }

  #[tokio::test]
  async fn test_network_first_falls_back_to_stored_snapshot() {
    let h = harness();
    h.fetcher.route(API_URL, ok("first"));
    h.router.handle(&get(API_URL)).await.unwrap();

    h.fetcher.set_offline(true);
    let outcome = h.router.handle(&get(API_URL)).await.unwrap();

    assert_eq!(outcome.source(), Some(ResponseSource::Cache));
    assert_eq!(outcome.response().unwrap().body_text(), "first");
  }

  #[tokio::test]
  async fn test_network_first_without_snapshot_yields_no_response() {
    let h = harness();
    h.fetcher.set_offline(true);

    let outcome = h.router.handle(&get(API_URL)).await.unwrap();
    assert_eq!(outcome, FetchOutcome::NoResponse);
  }

  #[tokio::test]
  async fn test_cache_first_hit_skips_network() {
    let h = harness();
    let request = get("http://localhost:8080/index.html");
    h.storage
      .put(&h.names.static_store, &RequestKey::from(&request), &ok("cached"))
      .unwrap();
    h.fetcher.route("http://localhost:8080/index.html", ok("fresh"));

    let outcome = h.router.handle(&request).await.unwrap();

    assert_eq!(outcome.source(), Some(ResponseSource::Cache));
    assert_eq!(outcome.response().unwrap().body_text(), "cached");
    assert_eq!(h.fetcher.calls(), 0);
  }

  #[tokio::test]
  async fn test_cache_first_hit_in_runtime_store() {
    let h = harness();
    let request = get("http://localhost:8080/icon-192.png");
    h.storage
      .put(&h.names.runtime_store, &RequestKey::from(&request), &ok("png"))
      .unwrap();

    let outcome = h.router.handle(&request).await.unwrap();
    assert_eq!(outcome.source(), Some(ResponseSource::Cache));
    assert_eq!(h.fetcher.calls(), 0);
  }

  #[tokio::test]
  async fn test_cache_first_miss_stores_basic_200() {
    let h = harness();
    let request = get("http://localhost:8080/styles.css");
    h.fetcher.route("http://localhost:8080/styles.css", ok("body{}"));

    let outcome = h.router.handle(&request).await.unwrap();
    assert_eq!(outcome.source(), Some(ResponseSource::Network));
    assert_eq!(outcome.response().unwrap().body_text(), "body{}");

    let stored = h
      .storage
      .match_in(&h.names.static_store, &RequestKey::from(&request))
      .unwrap()
      .unwrap();
    assert_eq!(stored.response, ok("body{}"));

    // Second request is served from the store
    h.router.handle(&request).await.unwrap();
    assert_eq!(h.fetcher.calls(), 1);
  }

  #[tokio::test]
  async fn test_cache_first_does_not_store_non_200_or_non_basic() {
    let h = harness();
    h.fetcher
      .route("http://localhost:8080/missing.js", with_status(404, "nope"));
    let mut redirected = ok("elsewhere");
    redirected.response_type = ResponseType::Cors;
    h.fetcher.route("http://localhost:8080/moved.js", redirected);

    let missing = h
      .router
      .handle(&get("http://localhost:8080/missing.js"))
      .await
      .unwrap();
    assert_eq!(missing.response().unwrap().status, 404);

    let moved = h
      .router
      .handle(&get("http://localhost:8080/moved.js"))
      .await
      .unwrap();
    assert_eq!(moved.response().unwrap().response_type, ResponseType::Cors);

    assert!(h.storage.keys().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_cache_first_offline_miss_is_503() {
    let h = harness();
    h.fetcher.set_offline(true);

    let outcome = h
      .router
      .handle(&get("http://localhost:8080/app.js"))
      .await
      .unwrap();

    assert_eq!(outcome.source(), Some(ResponseSource::Offline));
    let response = outcome.response().unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(response.header("Content-Type"), Some("text/plain"));
    assert_eq!(response.body_text(), DEFAULT_OFFLINE_BODY);
  }

  #[tokio::test]
  async fn test_non_get_responses_are_not_stored() {
    let h = harness();
    h.fetcher.route(API_URL, ok("posted"));

    let request = Request::new(Method::POST, Url::parse(API_URL).unwrap());
    let outcome = h.router.handle(&request).await.unwrap();

    assert_eq!(outcome.source(), Some(ResponseSource::Network));
    assert!(h.storage.keys().unwrap().is_empty());
  }
}
