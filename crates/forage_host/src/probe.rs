//! Capability probes.
//!
//! Each probe answers whether a storage API is usable in a host. Probes
//! never fail: any error while probing means "unsupported".

use crate::env::HostEnvironment;
use once_cell::sync::Lazy;
use regex::Regex;

static SAFARI_UA: Lazy<Option<Regex>> = Lazy::new(|| Regex::new("Safari|iPhone|iPad|iPod").ok());
static CHROME_UA: Lazy<Option<Regex>> = Lazy::new(|| Regex::new("Chrome").ok());
static BLACKBERRY: Lazy<Option<Regex>> = Lazy::new(|| Regex::new("BlackBerry").ok());
static SAFARI_VERSION: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"Version/([0-9._]+)").ok());

fn matches(pattern: &Lazy<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

/// Returns true if the host has a working IndexedDB.
///
/// Requires both the IndexedDB API and `IDBKeyRange`. Safari before 10.1
/// shipped an IndexedDB that loses data, so it is treated as absent.
#[must_use]
pub fn is_indexed_db_valid(env: &HostEnvironment) -> bool {
    if env.indexed_db.is_none() || !env.has_idb_key_range {
        return false;
    }
    !(is_safari(env) && is_buggy_safari_version(&env.user_agent))
}

/// Returns true if the host exposes WebSQL.
#[must_use]
pub fn is_web_sql_valid(env: &HostEnvironment) -> bool {
    env.web_sql.is_some()
}

/// Returns true if the host's localStorage can be read.
#[must_use]
pub fn is_local_storage_valid(env: &HostEnvironment) -> bool {
    env.local_storage
        .as_ref()
        .is_some_and(|area| area.length().is_ok())
}

/// Returns true if the host looks like Safari (WebSQL present, Safari or iOS
/// user agent, not Chrome, not BlackBerry).
#[must_use]
pub fn is_safari(env: &HostEnvironment) -> bool {
    env.web_sql.is_some()
        && matches(&SAFARI_UA, &env.user_agent)
        && !matches(&CHROME_UA, &env.user_agent)
        && !matches(&BLACKBERRY, &env.platform)
}

/// Returns true if `user_agent` reports a Safari version below 10.1.
///
/// A user agent without a `Version/` token is not considered buggy.
#[must_use]
pub fn is_buggy_safari_version(user_agent: &str) -> bool {
    let Some(captures) = SAFARI_VERSION
        .as_ref()
        .and_then(|re| re.captures(user_agent))
    else {
        return false;
    };

    let mut parts = captures[1]
        .split(['.', '_'])
        .map(|part| part.parse::<u32>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    major < 10 || (major == 10 && minor < 1)
}
