//! Application configuration.
//!
//! Values come from the environment (a `.env` file is loaded first by the
//! binary) and fall back to the defaults below. Command-line flags are passed
//! as overrides keyed by the variable they replace and are validated the
//! same way.
//!
//! | Variable                   | Default |
//! |----------------------------|---------|
//! | `SHOPSIGHT_DATA_DIR`       | `data`  |
//! | `SHOPSIGHT_TOP_N`          | `10`    |
//! | `SHOPSIGHT_MAP_SAMPLE`     | `2000`  |
//! | `SHOPSIGHT_HISTOGRAM_BINS` | `30`    |

use serde::Serialize;
use std::path::PathBuf;

use crate::cache::DEFAULT_DATA_DIR;
use crate::error::ConfigError;

pub const DATA_DIR_VAR: &str = "SHOPSIGHT_DATA_DIR";
pub const TOP_N_VAR: &str = "SHOPSIGHT_TOP_N";
pub const MAP_SAMPLE_VAR: &str = "SHOPSIGHT_MAP_SAMPLE";
pub const HISTOGRAM_BINS_VAR: &str = "SHOPSIGHT_HISTOGRAM_BINS";

/// Length of every top-N ranking.
pub const DEFAULT_TOP_N: usize = 10;

/// Most customers plotted on the geography map.
pub const DEFAULT_MAP_SAMPLE: usize = 2000;

/// Seed for the map sample, so the same export always plots the same points.
pub const MAP_SAMPLE_SEED: u64 = 42;

/// Bins of the payment-value histogram.
pub const DEFAULT_HISTOGRAM_BINS: usize = 30;

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub data_dir: PathBuf,
    pub top_n: usize,
    pub map_sample: usize,
    pub histogram_bins: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            top_n: DEFAULT_TOP_N,
            map_sample: DEFAULT_MAP_SAMPLE,
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
        }
    }
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`], with `overrides` (variable name, raw value)
    /// taking precedence over the environment.
    pub fn from_env_with(overrides: &[(&str, String)]) -> Result<Self, ConfigError> {
        Self::from_lookup(layered(overrides, |key| std::env::var(key).ok()))
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let data_dir = lookup(DATA_DIR_VAR)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        Ok(Self {
            data_dir,
            top_n: positive(&lookup, TOP_N_VAR, defaults.top_n)?,
            map_sample: positive(&lookup, MAP_SAMPLE_VAR, defaults.map_sample)?,
            histogram_bins: positive(&lookup, HISTOGRAM_BINS_VAR, defaults.histogram_bins)?,
        })
    }
}

/// Lookup answering from `overrides` first, then from `fallback`.
fn layered<'a, F>(
    overrides: &'a [(&'a str, String)],
    fallback: F,
) -> impl Fn(&str) -> Option<String> + 'a
where
    F: Fn(&str) -> Option<String> + 'a,
{
    move |key| {
        overrides
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.clone())
            .or_else(|| fallback(key))
    }
}

fn positive<F>(lookup: &F, key: &str, default: usize) -> Result<usize, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    let invalid = |message: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.clone(),
        message: message.to_string(),
    };

    match raw.trim().parse::<usize>() {
        Ok(0) => Err(invalid("must be greater than zero")),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid("not a whole number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.top_n, 10);
        assert_eq!(config.map_sample, 2000);
        assert_eq!(config.histogram_bins, 30);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("SHOPSIGHT_DATA_DIR", "/srv/exports"),
            ("SHOPSIGHT_TOP_N", " 5 "),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/exports"));
        assert_eq!(config.top_n, 5);
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[("SHOPSIGHT_TOP_N", "ten")])).unwrap_err();
        assert!(err.to_string().contains("SHOPSIGHT_TOP_N"));

        assert!(Config::from_lookup(lookup(&[("SHOPSIGHT_HISTOGRAM_BINS", "0")])).is_err());
    }

    #[test]
    fn test_command_line_overrides_are_validated() {
        let env = lookup(&[("SHOPSIGHT_TOP_N", "7"), ("SHOPSIGHT_MAP_SAMPLE", "500")]);

        let overrides = [(TOP_N_VAR, "3".to_string())];
        let config = Config::from_lookup(layered(&overrides, &env)).unwrap();
        assert_eq!(config.top_n, 3);
        assert_eq!(config.map_sample, 500);

        let overrides = [(TOP_N_VAR, "0".to_string())];
        let err = Config::from_lookup(layered(&overrides, &env)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "SHOPSIGHT_TOP_N".into(),
                value: "0".into(),
                message: "must be greater than zero".into(),
            }
        );
    }
}
