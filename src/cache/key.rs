//! Request identity used as the lookup key in every store.

use sha2::{Digest, Sha256};

use crate::http::Request;

/// Identity of a request inside a store: method plus URL without fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestKey {
  method: String,
  url: String,
}

impl RequestKey {
  pub fn from_request(request: &Request) -> Self {
    let mut url = request.url.clone();
    url.set_fragment(None);

    Self {
      method: request.method.as_str().to_uppercase(),
      url: url.to_string(),
    }
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  /// Only GET requests may be written to a store.
  pub fn is_storable(&self) -> bool {
    self.method == "GET"
  }

  /// Stable, fixed-length hash used as the primary key in storage.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }

  pub fn description(&self) -> String {
    format!("{} {}", self.method, self.url)
  }
}

impl From<&Request> for RequestKey {
  fn from(request: &Request) -> Self {
    Self::from_request(request)
  }
}
