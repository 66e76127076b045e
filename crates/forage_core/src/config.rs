//! Instance configuration.

use crate::error::{ForageError, ForageResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default database name.
pub const DEFAULT_NAME: &str = "localforage";

/// Default store name.
pub const DEFAULT_STORE_NAME: &str = "keyvaluepairs";

/// Default size hint in bytes.
pub const DEFAULT_SIZE: u64 = 4_980_736;

/// Default database version.
pub const DEFAULT_VERSION: f64 = 1.0;

static NON_WORD: Lazy<Option<Regex>> = Lazy::new(|| Regex::new("[^A-Za-z0-9_]").ok());

/// Replaces every non-word character in a store name with `_`.
///
/// Store names end up as table names and key prefixes, so they are
/// restricted to `[A-Za-z0-9_]`.
#[must_use]
pub fn sanitize_store_name(store_name: &str) -> String {
    match NON_WORD.as_ref() {
        Some(re) => re.replace_all(store_name, "_").into_owned(),
        None => store_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect(),
    }
}

/// Configuration record of a storage instance.
///
/// Field names serialize in camelCase, so a JSON file such as
/// `{"name": "app", "storeName": "cache", "driver": ["localStorageWrapper"]}`
/// loads directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Free-form description, passed to backends that keep one.
    pub description: String,

    /// Database name.
    pub name: String,

    /// Size hint in bytes.
    pub size: u64,

    /// Store (table, object store or key namespace) within the database.
    pub store_name: String,

    /// Database schema version.
    pub version: f64,

    /// Preferred driver names, most preferred first. `None` uses the
    /// registry's default order.
    #[serde(alias = "driver", skip_serializing_if = "Option::is_none")]
    pub driver_order: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            description: String::new(),
            name: DEFAULT_NAME.to_string(),
            size: DEFAULT_SIZE,
            store_name: DEFAULT_STORE_NAME.to_string(),
            version: DEFAULT_VERSION,
            driver_order: None,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the size hint.
    #[must_use]
    pub const fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Sets the store name, replacing non-word characters with `_`.
    #[must_use]
    pub fn store_name(mut self, store_name: &str) -> Self {
        self.store_name = sanitize_store_name(store_name);
        self
    }

    /// Sets the version.
    #[must_use]
    pub const fn version(mut self, version: f64) -> Self {
        self.version = version;
        self
    }

    /// Sets the preferred driver order.
    #[must_use]
    pub fn driver_order<I, S>(mut self, drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.driver_order = Some(drivers.into_iter().map(Into::into).collect());
        self
    }

    /// Merges the fields present in `patch` into this record.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(store_name) = &patch.store_name {
            self.store_name = sanitize_store_name(store_name);
        }
        if let Some(version) = patch.version {
            self.version = version;
        }
        if let Some(order) = &patch.driver_order {
            self.driver_order = Some(order.clone());
        }
    }

    /// Checks that the record can be used to open a backend.
    ///
    /// # Errors
    ///
    /// Returns [`ForageError::InvalidConfig`] for an empty name or store
    /// name, or a version that is not a positive finite number.
    pub fn validate(&self) -> ForageResult<()> {
        if self.name.is_empty() {
            return Err(ForageError::invalid_config("name must not be empty"));
        }
        if self.store_name.is_empty() {
            return Err(ForageError::invalid_config("storeName must not be empty"));
        }
        if !self.version.is_finite() || self.version <= 0.0 {
            return Err(ForageError::invalid_config(format!(
                "Database version must be a positive number, got {}",
                self.version
            )));
        }
        Ok(())
    }

    /// Sanitizes the store name and validates the record.
    pub(crate) fn normalized(mut self) -> ForageResult<Self> {
        self.store_name = sanitize_store_name(&self.store_name);
        self.validate()?;
        Ok(self)
    }

    /// Reads one field.
    #[must_use]
    pub fn get(&self, key: ConfigKey) -> ConfigValue {
        match key {
            ConfigKey::Description => ConfigValue::Text(self.description.clone()),
            ConfigKey::Name => ConfigValue::Text(self.name.clone()),
            ConfigKey::Size => ConfigValue::Size(self.size),
            ConfigKey::StoreName => ConfigValue::Text(self.store_name.clone()),
            ConfigKey::Version => ConfigValue::Version(self.version),
            ConfigKey::DriverOrder => ConfigValue::DriverOrder(self.driver_order.clone()),
        }
    }
}

/// A partial configuration record.
///
/// Used by `configure` and `create_instance`: every field that is `Some`
/// replaces the corresponding field of the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigPatch {
    /// New description.
    pub description: Option<String>,
    /// New database name.
    pub name: Option<String>,
    /// New size hint.
    pub size: Option<u64>,
    /// New store name.
    pub store_name: Option<String>,
    /// New version.
    pub version: Option<f64>,
    /// New preferred driver order.
    #[serde(alias = "driver")]
    pub driver_order: Option<Vec<String>>,
}

impl ConfigPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the size hint.
    #[must_use]
    pub const fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Sets the store name.
    #[must_use]
    pub fn store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = Some(store_name.into());
        self
    }

    /// Sets the version.
    #[must_use]
    pub const fn version(mut self, version: f64) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the preferred driver order.
    #[must_use]
    pub fn driver_order<I, S>(mut self, drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.driver_order = Some(drivers.into_iter().map(Into::into).collect());
        self
    }
}

/// Names a single configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// `description`
    Description,
    /// `name`
    Name,
    /// `size`
    Size,
    /// `storeName`
    StoreName,
    /// `version`
    Version,
    /// `driver` (the preferred driver order)
    DriverOrder,
}

impl ConfigKey {
    /// The field's name as it appears in serialized configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ConfigKey::Description => "description",
            ConfigKey::Name => "name",
            ConfigKey::Size => "size",
            ConfigKey::StoreName => "storeName",
            ConfigKey::Version => "version",
            ConfigKey::DriverOrder => "driver",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ForageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "description" => Ok(ConfigKey::Description),
            "name" => Ok(ConfigKey::Name),
            "size" => Ok(ConfigKey::Size),
            "storeName" | "store_name" => Ok(ConfigKey::StoreName),
            "version" => Ok(ConfigKey::Version),
            "driver" | "driverOrder" | "driver_order" => Ok(ConfigKey::DriverOrder),
            other => Err(ForageError::invalid_arguments(format!(
                "unknown configuration key {other:?}"
            ))),
        }
    }
}

/// The value of a single configuration field.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// A string field.
    Text(String),
    /// The size hint.
    Size(u64),
    /// The version.
    Version(f64),
    /// The preferred driver order.
    DriverOrder(Option<Vec<String>>),
}
