//! weather-sw - offline cache router for the Weather Now app.
//!
//! The worker keeps two versioned stores: a static store filled at install
//! time and a runtime store filled from weather API responses. Same-origin
//! requests are served cache-first, API requests network-first, and
//! cross-origin requests are left alone.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use weather_sw::{Config, HttpFetcher, Request, ServiceWorker, SqliteStorage};
//!
//! # async fn example() -> color_eyre::Result<()> {
//! let config = Config::default();
//! let storage = Arc::new(SqliteStorage::open()?);
//! let fetcher = Arc::new(HttpFetcher::new(config.origin.clone())?);
//!
//! let mut worker = ServiceWorker::new(&config, storage, fetcher)?;
//! worker.start().await?;
//!
//! let url = config.origin.join("index.html")?;
//! let outcome = worker.handle_fetch(&Request::get(url)).await?;
//! println!("{:?}", outcome.source());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod fetch;
pub mod http;
pub mod install_prompt;
pub mod worker;

pub use cache::{CacheStorage, RequestKey, SqliteStorage, StoreNames};
pub use config::Config;
pub use fetch::{Fetcher, HttpFetcher};
pub use http::{Request, Response, ResponseType};
pub use install_prompt::{DisplayMode, InstallPrompt, InstallPromptState, UserChoice};
pub use worker::{FetchOutcome, Hook, HookOutcome, ResponseSource, ServiceWorker, WorkerEvent};
