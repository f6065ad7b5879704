//! Shared harness for the integration tests
//!
//! Builds an isolated host with mock Yale Access Bluetooth locks and the
//! activity integration registered.

#![allow(dead_code)]

mod fixtures;
mod mock_compat;
mod mock_lock;
mod test_hass;

pub use fixtures::*;
pub use mock_compat::*;
pub use mock_lock::*;
pub use test_hass::*;
