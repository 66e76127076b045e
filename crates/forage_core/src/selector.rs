//! Driver selection.

use crate::driver::Driver;
use crate::error::{ForageError, ForageResult};
use crate::registry::DriverRegistry;
use forage_host::HostEnvironment;
use std::sync::Arc;

/// An ordered list of candidate driver names, most preferred first.
///
/// Built from a single name or any list of names, so `set_driver` accepts
/// either.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriverOrder(Vec<String>);

impl DriverOrder {
    /// The candidate names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Consumes the order, returning the names.
    #[must_use]
    pub fn into_names(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for DriverOrder {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for DriverOrder {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for DriverOrder {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for DriverOrder {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for DriverOrder {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for DriverOrder {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|s| s.to_string()).collect())
    }
}

/// Picks the first candidate that is registered and supported by `env`.
///
/// Unregistered names are skipped. Support probes run in candidate order
/// and never suspend.
///
/// # Errors
///
/// Returns [`ForageError::NoAvailableDriver`] if no candidate qualifies.
pub fn select_driver(
    registry: &DriverRegistry,
    env: &HostEnvironment,
    candidates: &[String],
) -> ForageResult<Arc<dyn Driver>> {
    for name in candidates {
        match registry.get_driver(name) {
            Ok(driver) if driver.is_supported(env) => {
                tracing::debug!(driver = %name, "selected driver");
                return Ok(driver);
            }
            Ok(_) => tracing::debug!(driver = %name, "driver not supported by host"),
            Err(_) => tracing::debug!(driver = %name, "driver not registered"),
        }
    }
    Err(ForageError::NoAvailableDriver)
}
