//! Driver registry.

use crate::driver::Driver;
use crate::drivers::{self, DEFAULT_DRIVER_ORDER};
use crate::error::{ForageError, ForageResult};
use crate::table::DriverTable;
use forage_host::HostEnvironment;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

static GLOBAL: Lazy<Arc<DriverRegistry>> = Lazy::new(|| Arc::new(DriverRegistry::new()));

/// Maps driver names to drivers.
///
/// A registry starts with the built-in drivers. Custom drivers are added
/// with [`DriverRegistry::define_driver`]; nothing is ever removed.
/// Instances created without an explicit registry share the process-wide
/// one returned by [`DriverRegistry::global`].
pub struct DriverRegistry {
    drivers: RwLock<HashMap<String, Arc<dyn Driver>>>,
    default_order: Vec<String>,
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.names())
            .field("default_order", &self.default_order)
            .finish()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    /// Creates a registry holding only the built-in drivers.
    #[must_use]
    pub fn new() -> Self {
        let drivers = drivers::builtin()
            .into_iter()
            .map(|driver| (driver.name().to_string(), driver))
            .collect();
        Self {
            drivers: RwLock::new(drivers),
            default_order: DEFAULT_DRIVER_ORDER.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> Arc<DriverRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Registers a custom driver.
    ///
    /// Registering a name that is already taken by a custom driver replaces
    /// that driver.
    ///
    /// # Errors
    ///
    /// - [`ForageError::DriverConfiguration`] if the name is empty or the
    ///   driver is missing a primitive.
    /// - [`ForageError::DriverNameConflict`] if the name belongs to a
    ///   built-in driver.
    pub fn define_driver(&self, driver: Arc<dyn Driver>) -> ForageResult<()> {
        let name = driver.name().to_string();
        if name.is_empty() {
            return Err(ForageError::DriverConfiguration {
                name,
                reason: "driver name must not be empty".into(),
            });
        }
        if drivers::is_builtin(&name) {
            return Err(ForageError::DriverNameConflict { name });
        }

        let missing = driver.missing_primitives();
        if !missing.is_empty() {
            let list: Vec<&str> = missing.iter().map(|p| p.as_str()).collect();
            return Err(ForageError::DriverConfiguration {
                name,
                reason: format!("missing primitives: {}", list.join(", ")),
            });
        }

        let mut drivers = self.drivers.write();
        if drivers.contains_key(&name) {
            tracing::warn!(driver = %name, "redefining custom driver");
        } else {
            tracing::debug!(driver = %name, "defined custom driver");
        }
        drivers.insert(name, driver);
        Ok(())
    }

    /// Registers a custom driver built from handlers.
    ///
    /// # Errors
    ///
    /// Same as [`DriverRegistry::define_driver`].
    pub fn define_table(&self, table: DriverTable) -> ForageResult<()> {
        self.define_driver(Arc::new(table))
    }

    /// Looks up a driver by name.
    ///
    /// # Errors
    ///
    /// Returns [`ForageError::DriverNotFound`] for an unregistered name.
    pub fn get_driver(&self, name: &str) -> ForageResult<Arc<dyn Driver>> {
        self.drivers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ForageError::DriverNotFound {
                name: name.to_string(),
            })
    }

    /// Returns true if `name` is registered and supported by `env`.
    ///
    /// Unknown names are simply unsupported.
    #[must_use]
    pub fn supports(&self, name: &str, env: &HostEnvironment) -> bool {
        self.get_driver(name)
            .map(|driver| driver.is_supported(env))
            .unwrap_or(false)
    }

    /// Names of every registered driver, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of the registered drivers supported by `env`, sorted.
    #[must_use]
    pub fn supported(&self, env: &HostEnvironment) -> Vec<String> {
        self.names()
            .into_iter()
            .filter(|name| self.supports(name, env))
            .collect()
    }

    /// The order tried when a configuration names no drivers.
    #[must_use]
    pub fn default_order(&self) -> &[String] {
        &self.default_order
    }
}
