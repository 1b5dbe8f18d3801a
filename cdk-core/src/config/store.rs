//! KV store configuration.

use super::ConfigError;
use super::connector::FromSettings;
use super::resolver::ConfigResolver;
use std::path::PathBuf;
use std::str::FromStr;

pub const KEY_STORE_TYPE: &str = "store_type";
pub const KEY_STORE_FILE: &str = "store_file";
pub const DEFAULT_STORE_FILE: &str = "./store.json";

/// Which KV store backend connectors get.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            other => Err(format!("unsupported store backend: {other}")),
        }
    }
}

/// Settings for the shared KV store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Backing file, used by [`StoreBackend::File`] only.
    pub file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            file: PathBuf::from(DEFAULT_STORE_FILE),
        }
    }
}

impl FromSettings for StoreConfig {
    fn from_settings(settings: &ConfigResolver) -> Result<Self, ConfigError> {
        let backend = settings.parse(KEY_STORE_TYPE)?.unwrap_or_default();
        let file = settings.resolve_string(KEY_STORE_FILE);
        Ok(Self {
            backend,
            file: if file.is_empty() {
                PathBuf::from(DEFAULT_STORE_FILE)
            } else {
                PathBuf::from(file)
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolver(file: &[(&str, &str)]) -> ConfigResolver {
        let file = file
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigResolver::from_maps(file, HashMap::new()).with_env(Vec::<(String, String)>::new())
    }

    #[test]
    fn test_defaults_to_memory() {
        let config = StoreConfig::from_settings(&resolver(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_file_backend() {
        let settings = resolver(&[("store_type", "FILE"), ("store_file", "/data/kv.json")]);
        let config = StoreConfig::from_settings(&settings).unwrap();
        assert_eq!(config.backend, StoreBackend::File);
        assert_eq!(config.file, PathBuf::from("/data/kv.json"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = StoreConfig::from_settings(&resolver(&[("store_type", "etcd")])).unwrap_err();
        assert!(err.to_string().contains("etcd"));
    }
}
