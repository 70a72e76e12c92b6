//! Page-side install prompt state.
//!
//! The page defers the platform's install prompt and shows its own banner
//! instead. All of that state lives in one [`InstallPromptState`] owned by the
//! page's event loop and handed to each UI event handler.

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::info;

/// How long the install banner stays up before hiding itself.
pub const AUTO_HIDE_AFTER: Duration = Duration::from_secs(10);

/// How often the page asks the registration to look for a new worker.
pub const UPDATE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

pub const STATUS_INSTALLED: &str = "App installed successfully! ✓";
pub const STATUS_OFFLINE: &str = "📵 Offline mode - using cached data";
pub const STATUS_INSTALLABLE: &str = "Install as app for offline access";
pub const TOAST_INSTALLED: &str = "App installed successfully! 🎉";
pub const UPDATE_AVAILABLE: &str = "A new version of Weather Now is available! Reload to update?";

/// The user's answer to the platform install dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserChoice {
  Accepted,
  Dismissed,
}

/// A deferred platform install prompt.
pub trait InstallPrompt {
  /// Show the platform dialog and wait for the user's choice.
  fn prompt(&mut self) -> impl Future<Output = UserChoice> + Send;
}

/// Display mode the page is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
  Standalone,
  Fullscreen,
  MinimalUi,
  Browser,
}

impl DisplayMode {
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "standalone" => Some(DisplayMode::Standalone),
      "fullscreen" => Some(DisplayMode::Fullscreen),
      "minimal-ui" => Some(DisplayMode::MinimalUi),
      "browser" => Some(DisplayMode::Browser),
      _ => None,
    }
  }

  /// Standalone and fullscreen only happen when launched as an installed app.
  pub fn is_installed(self) -> bool {
    matches!(self, DisplayMode::Standalone | DisplayMode::Fullscreen)
  }
}

/// Install prompt state with a single owner.
#[derive(Debug)]
pub struct InstallPromptState<P> {
  deferred: Option<P>,
  installed: bool,
  banner_visible: bool,
  trigger_visible: bool,
  banner_shown_at: Option<Instant>,
  pending_toast: Option<&'static str>,
  last_update_check: Option<Instant>,
  pending_update_notice: Option<&'static str>,
}

impl<P> Default for InstallPromptState<P> {
  fn default() -> Self {
    Self {
      deferred: None,
      installed: false,
      banner_visible: false,
      trigger_visible: false,
      banner_shown_at: None,
      pending_toast: None,
      last_update_check: None,
      pending_update_notice: None,
    }
  }
}

impl<P: InstallPrompt> InstallPromptState<P> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_installed(&self) -> bool {
    self.installed
  }

  pub fn has_deferred_prompt(&self) -> bool {
    self.deferred.is_some()
  }

  pub fn banner_visible(&self) -> bool {
    self.banner_visible
  }

  pub fn trigger_visible(&self) -> bool {
    self.trigger_visible
  }

  /// Record the display mode detected at startup.
  pub fn apply_display_mode(&mut self, mode: DisplayMode) {
    info!(?mode, "Display mode");
    if mode.is_installed() {
      self.installed = true;
    }
  }

  /// The platform offered an install prompt. Keep it for later and show our own UI.
  pub fn on_before_install_prompt(&mut self, prompt: P, now: Instant) {
    info!("Install prompt deferred");
    self.deferred = Some(prompt);
    self.show_prompt(now);
  }

  /// Show the banner and the manual trigger, unless already installed.
  pub fn show_prompt(&mut self, now: Instant) {
    if self.installed {
      return;
    }
    self.banner_visible = true;
    self.trigger_visible = true;
    self.banner_shown_at = Some(now);
  }

  pub fn hide_prompt(&mut self) {
    self.banner_visible = false;
    self.banner_shown_at = None;
  }

  /// Hide the banner once it has been up for [`AUTO_HIDE_AFTER`].
  ///
  /// Returns true when this call hid it.
  pub fn tick(&mut self, now: Instant) -> bool {
    match self.banner_shown_at {
      Some(shown) if self.banner_visible && now.duration_since(shown) >= AUTO_HIDE_AFTER => {
        self.hide_prompt();
        true
      }
      _ => false,
    }
  }

  /// The install button was clicked.
  ///
  /// Returns `None` when no prompt is available.
  pub async fn on_install_clicked(&mut self) -> Option<UserChoice> {
    let Some(mut prompt) = self.deferred.take() else {
      info!("Install prompt not available");
      return None;
    };

    let choice = prompt.prompt().await;
    info!(?choice, "User responded to install prompt");

    if choice == UserChoice::Accepted {
      self.installed = true;
    }

    self.hide_prompt();
    self.trigger_visible = false;
    Some(choice)
  }

  pub fn on_trigger_clicked(&mut self, now: Instant) {
    self.show_prompt(now);
  }

  pub fn on_close_clicked(&mut self) {
    self.hide_prompt();
  }

  /// The platform reports the app as installed.
  pub fn on_app_installed(&mut self) {
    info!("App was installed");
    self.installed = true;
    self.hide_prompt();
    self.trigger_visible = false;
    self.pending_toast = Some(TOAST_INSTALLED);
  }

  /// Toast the UI should show, if any. Cleared once taken.
  pub fn take_toast(&mut self) -> Option<&'static str> {
    self.pending_toast.take()
  }

  /// Whether the periodic worker update check should run now.
  pub fn due_for_update_check(&self, now: Instant) -> bool {
    match self.last_update_check {
      Some(last) => now.duration_since(last) >= UPDATE_CHECK_INTERVAL,
      None => true,
    }
  }

  pub fn mark_update_checked(&mut self, now: Instant) {
    self.last_update_check = Some(now);
  }

  /// A new worker took control of the page.
  pub fn on_controller_change(&mut self) {
    info!("New worker version is controlling the page");
    self.pending_update_notice = Some(UPDATE_AVAILABLE);
  }

  /// Reload confirmation the UI should ask for, if any. Cleared once taken.
  pub fn take_update_notice(&mut self) -> Option<&'static str> {
    self.pending_update_notice.take()
  }

  /// Status line under the install controls. Being offline wins over everything.
  pub fn status_text(&self, online: bool) -> &'static str {
    if !online {
      STATUS_OFFLINE
    } else if self.installed {
      STATUS_INSTALLED
    } else {
      STATUS_INSTALLABLE
    }
  }
}
