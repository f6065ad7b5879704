//! Lock library compatibility
//!
//! Setup needs a library release that can register activity callbacks.
//! Releases that cannot may have a patched build published for them.

use tracing::warn;

use crate::consts::YALEXSBLE_PATCH_URL;

pub trait LibraryCompat: Send + Sync {
    /// Installed library release
    fn version(&self) -> String;

    fn supports_activity_callback(&self) -> bool;

    /// Install a patched build from `url`, returning whether it installed
    ///
    /// May block; callers run it on a blocking worker.
    fn install_patch(&self, url: &str) -> bool;
}

/// Patch location for a library release
pub fn patch_url(version: &str) -> String {
    YALEXSBLE_PATCH_URL.replace("{version}", version)
}

/// The library compiled into this build
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledLibrary;

impl LibraryCompat for BundledLibrary {
    fn version(&self) -> String {
        yalexs_ble::LIBRARY_VERSION.to_string()
    }

    fn supports_activity_callback(&self) -> bool {
        yalexs_ble::SUPPORTS_ACTIVITY_CALLBACK
    }

    fn install_patch(&self, url: &str) -> bool {
        // a bundled build cannot be replaced at runtime
        warn!(url, "Cannot install a patched library into a bundled build");
        false
    }
}
