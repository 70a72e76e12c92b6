//! Install-time population and activate-time cleanup of the versioned stores.

use color_eyre::{eyre::eyre, Report, Result};
use futures::future::try_join_all;
use tracing::info;
use url::Url;

use crate::cache::{CacheStorage, RequestKey, StoreNames};
use crate::fetch::Fetcher;
use crate::http::Request;

/// Fetch every static asset and write them all into the static store.
///
/// The first failed fetch or non-ok status aborts the whole population. The
/// store is only created by the final write, so a failed install leaves no
/// static store behind. Returns the number of stored assets.
pub async fn populate_static<S, F>(
  storage: &S,
  fetcher: &F,
  names: &StoreNames,
  assets: &[Url],
) -> Result<usize>
where
  S: CacheStorage,
  F: Fetcher,
{
  info!(store = %names.static_store, assets = assets.len(), "Caching static files");

  let fetches = assets.iter().map(|url| async move {
    let request = Request::get(url.clone());
    let response = fetcher
      .fetch(&request)
      .await
      .map_err(|e| eyre!("Failed to cache {}: {}", url, e))?;

    if !response.ok() {
      return Err(eyre!(
        "Failed to cache {}: server responded {}",
        url,
        response.status
      ));
    }

    Ok::<_, Report>((RequestKey::from(&request), response))
  });

  let entries = try_join_all(fetches).await?;
  storage.put_all(&names.static_store, &entries)?;

  Ok(entries.len())
}

/// Delete every store that does not belong to the current version.
///
/// Returns the names that were deleted.
pub fn purge_stale<S: CacheStorage>(storage: &S, names: &StoreNames) -> Result<Vec<String>> {
  let mut deleted = Vec::new();

  for name in storage.keys()? {
    if names.is_current(&name) {
      continue;
    }

    info!(store = %name, "Deleting old cache");
    if storage.delete(&name)? {
      deleted.push(name);
    }
  }

  Ok(deleted)
}
