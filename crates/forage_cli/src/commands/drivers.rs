//! Drivers command implementation.

use crate::error::CliResult;
use forage_core::{DriverRegistry, LocalForage};
use serde::Serialize;

/// One row of the driver support table.
#[derive(Debug, Serialize)]
pub struct DriverSupport {
    /// Driver name.
    pub name: String,
    /// Whether the host supports the driver.
    pub supported: bool,
    /// Position in the configured order, if listed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference: Option<usize>,
}

/// Builds the support table for every registered driver.
pub fn support_table(forage: &LocalForage, registry: &DriverRegistry) -> Vec<DriverSupport> {
    let order = forage
        .config()
        .driver_order
        .unwrap_or_else(|| registry.default_order().to_vec());
    registry
        .names()
        .into_iter()
        .map(|name| DriverSupport {
            supported: forage.supports(&name),
            preference: order.iter().position(|n| *n == name).map(|i| i + 1),
            name,
        })
        .collect()
}

/// Runs the drivers command.
pub fn run(forage: &LocalForage, format: &str) -> CliResult<()> {
    let table = support_table(forage, &DriverRegistry::global());

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        println!("{:<24} {:<10} Order", "Driver", "Supported");
        println!("{}", "-".repeat(42));
        for row in &table {
            let order = row
                .preference
                .map_or_else(|| "-".to_string(), |p| p.to_string());
            let supported = if row.supported { "yes" } else { "no" };
            println!("{:<24} {:<10} {}", row.name, supported, order);
        }
    }

    Ok(())
}
