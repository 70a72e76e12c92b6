//! Lifecycle hook names and the placeholder sync/push handlers.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

use super::router::FetchOutcome;
use crate::http::Request;

/// Hook names a worker registers handlers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
  Install,
  Activate,
  Fetch,
  Sync,
  Push,
}

impl Hook {
  pub const ALL: [Hook; 5] = [
    Hook::Install,
    Hook::Activate,
    Hook::Fetch,
    Hook::Sync,
    Hook::Push,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Hook::Install => "install",
      Hook::Activate => "activate",
      Hook::Fetch => "fetch",
      Hook::Sync => "sync",
      Hook::Push => "push",
    }
  }
}

impl fmt::Display for Hook {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An event delivered to the worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
  Install,
  Activate,
  Fetch(Request),
  Sync { tag: String },
  Push { data: Option<String> },
}

impl WorkerEvent {
  pub fn hook(&self) -> Hook {
    match self {
      WorkerEvent::Install => Hook::Install,
      WorkerEvent::Activate => Hook::Activate,
      WorkerEvent::Fetch(_) => Hook::Fetch,
      WorkerEvent::Sync { .. } => Hook::Sync,
      WorkerEvent::Push { .. } => Hook::Push,
    }
  }
}

/// What a dispatched event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
  Installed { assets: usize },
  Activated { deleted: Vec<String> },
  Fetch(FetchOutcome),
  Synced { handled: bool },
  Notify(Notification),
}

/// Background sync tag the app registers.
pub const SYNC_WEATHER_TAG: &str = "sync-weather";

/// Acknowledge a background sync. Nothing is synced yet.
///
/// Returns whether the tag is one the worker knows.
pub fn handle_sync(tag: &str) -> bool {
  if tag == SYNC_WEATHER_TAG {
    info!(tag, "Background sync requested");
    true
  } else {
    debug!(tag, "Ignoring unknown sync tag");
    false
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
  /// Milliseconds since the Unix epoch
  pub date_of_arrival: i64,
  pub primary_key: u32,
}

/// Notification shown for a push message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub data: NotificationData,
}

pub const NOTIFICATION_TITLE: &str = "Weather Now";
pub const DEFAULT_PUSH_BODY: &str = "Weather update available";
const NOTIFICATION_ICON: &str = "./icon-192.png";

/// Build the notification for a push message.
pub fn handle_push(data: Option<&str>) -> Notification {
  let body = data.unwrap_or(DEFAULT_PUSH_BODY).to_string();
  info!(%body, "Push message received");

  Notification {
    title: NOTIFICATION_TITLE.to_string(),
    body,
    icon: NOTIFICATION_ICON.to_string(),
    badge: NOTIFICATION_ICON.to_string(),
    vibrate: vec![100, 50, 100],
    data: NotificationData {
      date_of_arrival: Utc::now().timestamp_millis(),
      primary_key: 1,
    },
  }
}
