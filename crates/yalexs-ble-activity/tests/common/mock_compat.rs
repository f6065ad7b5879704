//! Controllable lock library compatibility

use std::sync::Mutex;

use yalexs_ble_activity::LibraryCompat;

pub struct MockCompat {
    pub version: String,
    pub supports_activity_callback: bool,
    pub install_result: bool,
    installs: Mutex<Vec<String>>,
}

impl MockCompat {
    pub fn compatible() -> Self {
        Self {
            version: "3.0.0".to_string(),
            supports_activity_callback: true,
            install_result: false,
            installs: Mutex::new(Vec::new()),
        }
    }

    /// A release without activity callbacks; `install_result` decides
    /// whether a patch installs
    pub fn incompatible(version: &str, install_result: bool) -> Self {
        Self {
            version: version.to_string(),
            supports_activity_callback: false,
            install_result,
            installs: Mutex::new(Vec::new()),
        }
    }

    /// URLs patches were installed from
    pub fn installs(&self) -> Vec<String> {
        self.installs.lock().unwrap().clone()
    }
}

impl LibraryCompat for MockCompat {
    fn version(&self) -> String {
        self.version.clone()
    }

    fn supports_activity_callback(&self) -> bool {
        self.supports_activity_callback
    }

    fn install_patch(&self, url: &str) -> bool {
        self.installs.lock().unwrap().push(url.to_string());
        self.install_result
    }
}
