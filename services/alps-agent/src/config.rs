//! Configuration for the reservation agent.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Reservation agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interval between reconciliation passes in seconds.
    pub reconcile_interval_secs: u64,

    /// Release attempts per orphan before it is skipped for the window.
    pub release_max_retries: u32,

    /// Release retry window in seconds.
    pub release_retry_window_secs: u64,

    /// Seconds an id stays orphaned before it is released.
    pub orphan_grace_secs: u64,

    /// Optional JSON inventory seeding the in-memory job source and allocator.
    pub inventory_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reconcile_interval_secs = parse_var(&lookup, "ALPS_RECONCILE_INTERVAL", 30)?;
        let release_max_retries = parse_var(&lookup, "ALPS_RELEASE_MAX_RETRIES", 3)?;
        let release_retry_window_secs = parse_var(&lookup, "ALPS_RELEASE_RETRY_WINDOW", 600)?;
        let orphan_grace_secs = parse_var(&lookup, "ALPS_ORPHAN_GRACE", 60)?;

        let inventory_file = lookup("ALPS_INVENTORY_FILE")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let log_level = lookup("ALPS_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            reconcile_interval_secs,
            release_max_retries,
            release_retry_window_secs,
            orphan_grace_secs,
            inventory_file,
            log_level,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {name}: '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.reconcile_interval_secs, 30);
        assert_eq!(config.release_max_retries, 3);
        assert_eq!(config.release_retry_window_secs, 600);
        assert_eq!(config.orphan_grace_secs, 60);
        assert_eq!(config.inventory_file, None);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("ALPS_RECONCILE_INTERVAL", "5"),
            ("ALPS_RELEASE_MAX_RETRIES", " 7 "),
            ("ALPS_ORPHAN_GRACE", "0"),
            ("ALPS_INVENTORY_FILE", "/etc/alps/inventory.json"),
            ("ALPS_LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.reconcile_interval_secs, 5);
        assert_eq!(config.release_max_retries, 7);
        assert_eq!(config.orphan_grace_secs, 0);
        assert_eq!(
            config.inventory_file,
            Some(PathBuf::from("/etc/alps/inventory.json"))
        );
        assert_eq!(config.log_level, "debug");
    }

    #[rstest]
    #[case("ALPS_RECONCILE_INTERVAL", "soon")]
    #[case("ALPS_RELEASE_MAX_RETRIES", "-1")]
    #[case("ALPS_RELEASE_RETRY_WINDOW", "10m")]
    #[case("ALPS_ORPHAN_GRACE", "")]
    fn test_malformed_number_names_variable(#[case] name: &str, #[case] value: &str) {
        let err = Config::from_lookup(lookup(&[(name, value)])).unwrap_err();
        assert!(err.to_string().contains(name), "{err}");
    }
}
