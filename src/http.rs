//! Request and response snapshots passed between the router, the network and the stores.

use reqwest::Method;
use url::Url;

/// An intercepted resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: Method,
  pub url: Url,
}

impl Request {
  /// A plain GET for the given URL.
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
    }
  }

  pub fn new(method: Method, url: Url) -> Self {
    Self { method, url }
  }

  /// Whether this request targets the same origin (scheme, host, port) as `origin`.
  pub fn is_same_origin(&self, origin: &Url) -> bool {
    self.url.origin() == origin.origin()
  }
}

/// How the response relates to the requesting page, mirroring the fetch `Response.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
  /// Same-origin response
  Basic,
  /// Cross-origin response with readable body
  Cors,
  /// Cross-origin response without CORS access
  Opaque,
  /// Network error placeholder
  Error,
}

impl ResponseType {
  pub fn as_str(self) -> &'static str {
    match self {
      ResponseType::Basic => "basic",
      ResponseType::Cors => "cors",
      ResponseType::Opaque => "opaque",
      ResponseType::Error => "error",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "basic" => Some(ResponseType::Basic),
      "cors" => Some(ResponseType::Cors),
      "opaque" => Some(ResponseType::Opaque),
      "error" => Some(ResponseType::Error),
      _ => None,
    }
  }
}

/// A fully buffered response.
///
/// Responses are plain values: cloning one before handing it to a store is the
/// equivalent of `Response.clone()` on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub status_text: String,
  pub response_type: ResponseType,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  /// Status 200-299.
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Responses the cache-first path writes back to the static store.
  pub fn is_cacheable(&self) -> bool {
    self.status == 200 && self.response_type == ResponseType::Basic
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// The synthetic reply served when a static asset is neither cached nor reachable.
  pub fn offline(body: &str) -> Self {
    Self {
      status: 503,
      status_text: "Service Unavailable".to_string(),
      response_type: ResponseType::Basic,
      headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
      body: body.as_bytes().to_vec(),
    }
  }

  pub fn body_text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}
