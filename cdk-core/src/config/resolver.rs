//! Layered settings lookup.
//!
//! A setting resolves through the following chain, first hit wins:
//!
//! 1. the environment variable named after the upper-cased key
//! 2. the user config file (the secret file for [`ConfigResolver::resolve_secret`])
//! 3. a compiled-in default, for the few keys that have one (plain settings only)
//!
//! Anything else resolves to the empty string. Both files are read once, when
//! the resolver is built, and never again.

use super::ConfigError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

pub const VANCE_CONFIG_PATH: &str = "/vance/config/config.json";
pub const VANCE_SECRET_PATH: &str = "/vance/secret/secret.json";
pub const LOCAL_CONFIG_PATH: &str = "./config.json";
pub const LOCAL_SECRET_PATH: &str = "./secret.json";

/// Environment variable overriding the primary config file path.
pub const ENV_CONFIG_PATH: &str = "V_CONFIG_PATH";
/// Environment variable overriding the primary secret file path.
pub const ENV_SECRET_PATH: &str = "V_SECRET_PATH";

/// URL a source delivers its events to.
pub const KEY_TARGET: &str = "v_target";
pub const DEFAULT_TARGET: &str = "http://localhost:8080";
/// Port a sink listens on.
pub const KEY_PORT: &str = "v_port";
pub const DEFAULT_PORT: u16 = 8080;

/// Where the config and secret files are looked up.
///
/// Each file has a primary path and a local fallback that is only tried when
/// the primary one cannot be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub config: PathBuf,
    pub config_fallback: PathBuf,
    pub secret: PathBuf,
    pub secret_fallback: PathBuf,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            config: PathBuf::from(VANCE_CONFIG_PATH),
            config_fallback: PathBuf::from(LOCAL_CONFIG_PATH),
            secret: PathBuf::from(VANCE_SECRET_PATH),
            secret_fallback: PathBuf::from(LOCAL_SECRET_PATH),
        }
    }
}

impl ConfigPaths {
    /// Well-known paths, with the primary ones overridable through
    /// `V_CONFIG_PATH` and `V_SECRET_PATH`.
    pub fn from_env() -> Self {
        let mut paths = Self::default();
        if let Some(path) = std::env::var_os(ENV_CONFIG_PATH) {
            paths.config = path.into();
        }
        if let Some(path) = std::env::var_os(ENV_SECRET_PATH) {
            paths.secret = path.into();
        }
        paths
    }

    pub fn with_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = path.into();
        self
    }

    pub fn with_secret(mut self, path: impl Into<PathBuf>) -> Self {
        self.secret = path.into();
        self
    }
}

#[derive(Debug, Clone)]
enum Environment {
    Process,
    Fixed(HashMap<String, String>),
}

impl Environment {
    fn lookup(&self, name: &str) -> Option<String> {
        match self {
            Environment::Process => std::env::var(name).ok(),
            Environment::Fixed(vars) => vars.get(name).cloned(),
        }
    }
}

/// Resolves settings from the environment, the config/secret files and
/// compiled defaults.
///
/// Built once at startup and shared read-only afterwards. Lookups never fail
/// and never block.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    env: Environment,
    user_config: HashMap<String, String>,
    user_secret: HashMap<String, String>,
    defaults: HashMap<&'static str, String>,
}

impl ConfigResolver {
    /// Eagerly load the config and secret files.
    ///
    /// Missing, unreadable or malformed files are logged and treated as empty.
    pub fn load(paths: &ConfigPaths) -> Self {
        let user_config = load_settings_file(&paths.config, &paths.config_fallback, "config");
        let user_secret = load_settings_file(&paths.secret, &paths.secret_fallback, "secret");
        Self::from_maps(user_config, user_secret)
    }

    /// Build a resolver from already-loaded file contents.
    pub fn from_maps(
        user_config: HashMap<String, String>,
        user_secret: HashMap<String, String>,
    ) -> Self {
        Self {
            env: Environment::Process,
            user_config,
            user_secret,
            defaults: HashMap::from([
                (KEY_TARGET, DEFAULT_TARGET.to_string()),
                (KEY_PORT, DEFAULT_PORT.to_string()),
            ]),
        }
    }

    /// Replace the process environment with a fixed set of variables.
    ///
    /// Names are matched exactly, so they should already be upper-cased.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Environment::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Resolve a plain setting: environment, config file, default, `""`.
    ///
    /// A variable that is set but empty still shadows the config file; the
    /// empty result then falls back to the default only.
    pub fn resolve_string(&self, key: &str) -> String {
        let value = self
            .env
            .lookup(&key.to_uppercase())
            .or_else(|| lookup_file(&self.user_config, key))
            .unwrap_or_default();
        if !value.is_empty() {
            return value;
        }
        self.defaults
            .get(key.to_lowercase().as_str())
            .cloned()
            .unwrap_or_default()
    }

    /// Resolve a secret: environment, secret file, `""`. Defaults never apply.
    pub fn resolve_secret(&self, key: &str) -> String {
        self.env
            .lookup(&key.to_uppercase())
            .or_else(|| lookup_file(&self.user_secret, key))
            .unwrap_or_default()
    }

    /// Resolve and parse a plain setting. Empty values yield `None`.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.resolve_string(key);
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
                value,
            })
    }

    /// The URL a source sends its events to.
    pub fn sink_target(&self) -> String {
        self.resolve_string(KEY_TARGET)
    }

    /// The port a sink listens on, unparsed.
    pub fn port(&self) -> String {
        self.resolve_string(KEY_PORT)
    }
}

fn lookup_file(map: &HashMap<String, String>, key: &str) -> Option<String> {
    map.get(key)
        .or_else(|| map.get(&key.to_lowercase()))
        .cloned()
}

/// Read the primary file, falling back to the local one when the primary
/// cannot be read at all.
fn load_settings_file(primary: &Path, fallback: &Path, kind: &str) -> HashMap<String, String> {
    let content = match std::fs::read(primary) {
        Ok(content) => content,
        Err(e) => {
            info!(kind, path = %primary.display(), error = %e, "READ user {kind} failed");
            match std::fs::read(fallback) {
                Ok(content) => content,
                Err(e) => {
                    info!(kind, path = %fallback.display(), error = %e, "READ local {kind} failed");
                    return HashMap::new();
                }
            }
        }
    };

    match parse_settings(&content) {
        Ok(settings) => {
            debug!(kind, len = settings.len(), "{kind} loaded");
            settings
        }
        Err(e) => {
            warn!(kind, error = %e, "ignoring malformed {kind} file");
            HashMap::new()
        }
    }
}

/// Flatten a JSON object into string settings.
///
/// Strings are taken verbatim, numbers and booleans by their JSON text, nested
/// objects and arrays as compact JSON. Nulls are dropped.
pub fn parse_settings(content: &[u8]) -> Result<HashMap<String, String>, ConfigError> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashMap::new());
    }
    let serde_json::Value::Object(object) = serde_json::from_slice(content)? else {
        return Err(ConfigError::NotAnObject);
    };
    Ok(object
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, value))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn no_env(resolver: ConfigResolver) -> ConfigResolver {
        resolver.with_env(Vec::<(String, String)>::new())
    }

    #[test]
    fn test_environment_wins() {
        let resolver = ConfigResolver::from_maps(
            settings(&[("v_port", "9000"), ("name", "from-file")]),
            settings(&[("token", "from-secret")]),
        )
        .with_env([("V_PORT", "9100"), ("NAME", "from-env"), ("TOKEN", "env-token")]);

        assert_eq!(resolver.port(), "9100");
        assert_eq!(resolver.resolve_string("name"), "from-env");
        assert_eq!(resolver.resolve_secret("token"), "env-token");
    }

    #[test]
    fn test_empty_env_value_shadows_file() {
        let resolver = ConfigResolver::from_maps(
            settings(&[("v_port", "9000"), ("name", "from-file")]),
            settings(&[("token", "from-secret")]),
        )
        .with_env([("V_PORT", ""), ("NAME", ""), ("TOKEN", "")]);

        // An empty variable still wins over the file; only the default applies after it.
        assert_eq!(resolver.port(), "8080");
        assert_eq!(resolver.resolve_string("name"), "");
        assert_eq!(resolver.resolve_secret("token"), "");
    }

    #[test]
    fn test_file_beats_default() {
        let resolver = no_env(ConfigResolver::from_maps(
            settings(&[("v_port", "9000")]),
            HashMap::new(),
        ));
        assert_eq!(resolver.port(), "9000");
        assert_eq!(resolver.parse::<u16>(KEY_PORT).unwrap(), Some(9000));
    }

    #[test]
    fn test_defaults_and_missing_keys() {
        let resolver = no_env(ConfigResolver::from_maps(HashMap::new(), HashMap::new()));
        assert_eq!(resolver.port(), "8080");
        assert_eq!(resolver.sink_target(), DEFAULT_TARGET);
        assert_eq!(resolver.resolve_string("nothing_here"), "");
        assert_eq!(resolver.parse::<u32>("nothing_here").unwrap(), None);
    }

    #[test]
    fn test_secret_never_uses_defaults() {
        let resolver = no_env(ConfigResolver::from_maps(
            settings(&[("api_key", "not-a-secret")]),
            HashMap::new(),
        ));
        assert_eq!(resolver.resolve_secret(KEY_PORT), "");
        assert_eq!(resolver.resolve_secret(KEY_TARGET), "");
        assert_eq!(resolver.resolve_secret("api_key"), "");
    }

    #[test]
    fn test_invalid_value_reported() {
        let resolver = no_env(ConfigResolver::from_maps(
            settings(&[("v_port", "eighty")]),
            HashMap::new(),
        ));
        let err = resolver.parse::<u16>(KEY_PORT).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == KEY_PORT));
    }

    #[test]
    fn test_settings_flattening() {
        let parsed = parse_settings(
            br#"{"a": "x", "b": 3, "c": true, "d": null, "e": {"k": [1, 2]}}"#,
        )
        .unwrap();
        assert_eq!(parsed["a"], "x");
        assert_eq!(parsed["b"], "3");
        assert_eq!(parsed["c"], "true");
        assert!(!parsed.contains_key("d"));
        assert_eq!(parsed["e"], r#"{"k":[1,2]}"#);

        assert!(parse_settings(b"  \n").unwrap().is_empty());
        assert!(matches!(parse_settings(b"[1]"), Err(ConfigError::NotAnObject)));
        assert!(parse_settings(b"{oops").is_err());
    }

    #[test]
    fn test_load_with_fallback() {
        let dir = std::env::temp_dir().join(format!("cdk-resolver-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let local_config = dir.join("config.json");
        let local_secret = dir.join("secret.json");
        std::fs::write(&local_config, r#"{"v_port": "9000"}"#).unwrap();
        std::fs::write(&local_secret, "not json").unwrap();

        let paths = ConfigPaths {
            config: dir.join("missing/config.json"),
            config_fallback: local_config,
            secret: dir.join("missing/secret.json"),
            secret_fallback: local_secret,
        };
        let resolver = no_env(ConfigResolver::load(&paths));
        assert_eq!(resolver.port(), "9000");
        assert_eq!(resolver.resolve_secret("anything"), "");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_paths_builders() {
        let paths = ConfigPaths::default()
            .with_config("/etc/cdk/config.json")
            .with_secret("/etc/cdk/secret.json");
        assert_eq!(paths.config, PathBuf::from("/etc/cdk/config.json"));
        assert_eq!(paths.config_fallback, PathBuf::from(LOCAL_CONFIG_PATH));
        assert_eq!(paths.secret, PathBuf::from("/etc/cdk/secret.json"));
    }
}
