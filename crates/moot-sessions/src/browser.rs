//! Launching the platform browser at a session URL.
//!
//! The store talks to a [`BrowserOpener`] trait so tests can substitute a
//! recording fake; production uses [`PlatformOpener`], which defers to the
//! `webbrowser` crate's cross-platform launcher.

use tracing::debug;

/// Opens URLs in the user's browser.
pub trait BrowserOpener: Send + Sync {
    /// Open `url`. Errors describe why the launch failed.
    fn open(&self, url: &str) -> Result<(), String>;
}

/// The default opener: the platform browser via `webbrowser`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlatformOpener;

impl BrowserOpener for PlatformOpener {
    fn open(&self, url: &str) -> Result<(), String> {
        debug!(url, "opening platform browser");
        webbrowser::open(url).map_err(|e| e.to_string())
    }
}
