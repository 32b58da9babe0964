//! Runtime configuration.
//!
//! Controlled by environment variables:
//! - `MUDA_PLATFORM`: platform index (default 0)
//! - `MUDA_DEVICE`: device index within the platform (default 0)
//! - `MUDA_VERBOSE=1`: log device enumeration at `info` level
//! - `MUDA_CLOPT`: options passed verbatim to the kernel compiler

use log::warn;

pub const ENV_PLATFORM: &str = "MUDA_PLATFORM";
pub const ENV_DEVICE: &str = "MUDA_DEVICE";
pub const ENV_VERBOSE: &str = "MUDA_VERBOSE";
pub const ENV_CLOPT: &str = "MUDA_CLOPT";

/// Device selection and compiler settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub platform: usize,
    pub device: usize,
    pub verbose: bool,
    pub compile_options: String,
}

impl RuntimeConfig {
    /// Defaults overridden by the `MUDA_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(index) = lookup(ENV_PLATFORM).and_then(|v| parse_index(ENV_PLATFORM, &v)) {
            config.platform = index;
        }
        if let Some(index) = lookup(ENV_DEVICE).and_then(|v| parse_index(ENV_DEVICE, &v)) {
            config.device = index;
        }
        if let Some(value) = lookup(ENV_VERBOSE) {
            config.verbose = matches!(value.trim(), "1" | "true" | "TRUE" | "True");
        }
        if let Some(options) = lookup(ENV_CLOPT) {
            config.compile_options = options;
        }
        config
    }

    pub fn with_platform(mut self, platform: usize) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_device(mut self, device: usize) -> Self {
        self.device = device;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_compile_options(mut self, options: impl Into<String>) -> Self {
        self.compile_options = options.into();
        self
    }
}

fn parse_index(key: &str, value: &str) -> Option<usize> {
    match value.trim().parse() {
        Ok(index) => Some(index),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a non-negative integer", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = RuntimeConfig::from_lookup(|_| None);
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.platform, 0);
        assert_eq!(config.device, 0);
        assert!(!config.verbose);
        assert!(config.compile_options.is_empty());
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            (ENV_PLATFORM, "1"),
            (ENV_DEVICE, " 2 "),
            (ENV_VERBOSE, "true"),
            (ENV_CLOPT, "-cl-fast-relaxed-math -DN=4"),
        ]));
        assert_eq!(config.platform, 1);
        assert_eq!(config.device, 2);
        assert!(config.verbose);
        assert_eq!(config.compile_options, "-cl-fast-relaxed-math -DN=4");
    }

    #[test]
    fn test_malformed_index_is_ignored() {
        let config = RuntimeConfig::from_lookup(lookup_from(&[
            (ENV_PLATFORM, "gpu"),
            (ENV_DEVICE, "-1"),
            (ENV_VERBOSE, "0"),
        ]));
        assert_eq!(config.platform, 0);
        assert_eq!(config.device, 0);
        assert!(!config.verbose);
    }

    #[test]
    fn test_builders() {
        let config = RuntimeConfig::default()
            .with_platform(1)
            .with_device(3)
            .with_verbose(true)
            .with_compile_options("-w");
        assert_eq!(
            config,
            RuntimeConfig {
                platform: 1,
                device: 3,
                verbose: true,
                compile_options: "-w".into(),
            }
        );
    }
}
