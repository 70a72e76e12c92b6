//! Network access for the worker.

use color_eyre::{eyre::eyre, Result};
use std::future::Future;
use url::Url;

use crate::http::{Request, Response, ResponseType};

/// Something that can perform a network fetch.
///
/// An `Err` means the fetch failed at the network level. HTTP error statuses are
/// still `Ok` responses.
pub trait Fetcher: Send + Sync {
  fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

/// `reqwest`-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
  /// App origin, used to classify responses as basic or cors
  origin: Url,
}

impl HttpFetcher {
  pub fn new(origin: Url) -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("weather-sw/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, origin })
  }
}

impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let resp = self
      .client
      .request(request.method.clone(), request.url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", request.url, e))?;

    // Redirects may end up on another origin
    let response_type = if resp.url().origin() == self.origin.origin() {
      ResponseType::Basic
    } else {
      ResponseType::Cors
    };

    let status = resp.status();
    let headers = resp
      .headers()
      .iter()
      .map(|(name, value)| {
        (
          name.as_str().to_string(),
          String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
      })
      .collect();

    let body = resp
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", request.url, e))?;

    Ok(Response {
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or_default().to_string(),
      response_type,
      headers,
      body: body.to_vec(),
    })
  }
}
