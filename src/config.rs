//! Configuration loading
//!
//! The memory namespace comes from a small JSON file (`{"memory_id": "..."}`)
//! and is cached per path. Everything else is read from the environment.

use crate::error::MemoryError;
use crate::models::{MemoryNamespaceId, DEFAULT_ACTOR_ID, DEFAULT_SESSION_ID};
use crate::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tracing::{debug, error, warn};

pub const DEFAULT_CONFIG_PATH: &str = "memory-config.json";
pub const DEFAULT_MAX_TURNS: usize = 100;
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct MemoryConfigFile {
    memory_id: Option<serde_json::Value>,
}

/// Loads namespace ids from disk, reading each path at most once.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    cache: Mutex<HashMap<PathBuf, MemoryNamespaceId>>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, path: impl AsRef<Path>) -> Result<MemoryNamespaceId> {
        let path = path.as_ref();

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = cache.get(path) {
            return Ok(id.clone());
        }

        let id = read_namespace(path).map_err(|e| {
            error!("Failed to load memory configuration: {}", e);
            e
        })?;

        debug!(path = %path.display(), memory_id = %id, "Loaded memory configuration");
        cache.insert(path.to_path_buf(), id.clone());
        Ok(id)
    }

    /// Number of distinct config files read so far.
    pub fn cached_paths(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn read_namespace(path: &Path) -> Result<MemoryNamespaceId> {
    if !path.exists() {
        return Err(MemoryError::ConfigNotFound(path.to_path_buf()));
    }

    let raw = std::fs::read_to_string(path)?;
    let parsed: MemoryConfigFile = serde_json::from_str(&raw)
        .map_err(|e| MemoryError::ConfigMalformed(format!("{}: {}", path.display(), e)))?;

    match parsed.memory_id {
        Some(serde_json::Value::String(id)) if !id.trim().is_empty() => {
            Ok(MemoryNamespaceId::new(id.trim()))
        }
        Some(_) => Err(MemoryError::ConfigMalformed(format!(
            "{}: memory_id must be a non-empty string",
            path.display()
        ))),
        None => Err(MemoryError::ConfigMalformed(format!(
            "{}: missing memory_id",
            path.display()
        ))),
    }
}

static CONFIG_LOADER: OnceLock<ConfigLoader> = OnceLock::new();

/// Load a namespace id through the process-wide loader.
pub fn load(path: impl AsRef<Path>) -> Result<MemoryNamespaceId> {
    CONFIG_LOADER.get_or_init(ConfigLoader::new).load(path)
}

/// Runtime settings for a memory context manager.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub config_path: PathBuf,
    pub default_actor_id: String,
    pub default_session_id: String,
    /// Upper bound on turns fetched when priming a session
    pub max_conversation_turns: usize,
    /// Remote store endpoint; the in-process store is used when unset
    pub store_url: Option<String>,
    pub store_timeout: Duration,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            default_actor_id: DEFAULT_ACTOR_ID.to_string(),
            default_session_id: DEFAULT_SESSION_ID.to_string(),
            max_conversation_turns: DEFAULT_MAX_TURNS,
            store_url: None,
            store_timeout: Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS),
        }
    }
}

impl ManagerSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key/value source. Blank values are treated
    /// as unset; unparsable numbers fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_turns: Option<usize> =
            parse_value("MEMORY_MAX_TURNS", non_empty("MEMORY_MAX_TURNS"));
        let timeout_secs: Option<u64> = parse_value(
            "MEMORY_STORE_TIMEOUT_SECS",
            non_empty("MEMORY_STORE_TIMEOUT_SECS"),
        );

        Self {
            config_path: non_empty("MEMORY_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            default_actor_id: non_empty("MEMORY_DEFAULT_ACTOR_ID")
                .unwrap_or(defaults.default_actor_id),
            default_session_id: non_empty("MEMORY_DEFAULT_SESSION_ID")
                .unwrap_or(defaults.default_session_id),
            max_conversation_turns: max_turns.unwrap_or(defaults.max_conversation_turns),
            store_url: non_empty("MEMORY_STORE_URL"),
            store_timeout: timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.store_timeout),
        }
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value for {}: {}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_memory_id() {
        let file = config_file(r#"{"memory_id": "mem-1"}"#);
        let loader = ConfigLoader::new();

        let id = loader.load(file.path()).unwrap();
        assert_eq!(id.as_str(), "mem-1");
    }

    #[test]
    fn test_load_is_cached_per_path() {
        let file = config_file(r#"{"memory_id": "mem-1"}"#);
        let loader = ConfigLoader::new();
        loader.load(file.path()).unwrap();

        // Rewriting the file must not change the cached id
        std::fs::write(file.path(), r#"{"memory_id": "mem-2"}"#).unwrap();
        let id = loader.load(file.path()).unwrap();

        assert_eq!(id.as_str(), "mem-1");
        assert_eq!(loader.cached_paths(), 1);
    }

    #[test]
    fn test_missing_file() {
        let loader = ConfigLoader::new();
        let err = loader.load("/nonexistent/memory-config.json").unwrap_err();
        assert!(matches!(err, MemoryError::ConfigNotFound(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_memory_id() {
        let file = config_file(r#"{"region": "us-east-1"}"#);
        let err = ConfigLoader::new().load(file.path()).unwrap_err();
        assert!(matches!(err, MemoryError::ConfigMalformed(_)));
    }

    #[test]
    fn test_invalid_json_and_blank_id() {
        let garbage = config_file("memory_id = mem-1");
        assert!(matches!(
            ConfigLoader::new().load(garbage.path()),
            Err(MemoryError::ConfigMalformed(_))
        ));

        let blank = config_file(r#"{"memory_id": "  "}"#);
        assert!(matches!(
            ConfigLoader::new().load(blank.path()),
            Err(MemoryError::ConfigMalformed(_))
        ));
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let loader = ConfigLoader::new();
        let file = config_file(r#"{}"#);
        assert!(loader.load(file.path()).is_err());

        std::fs::write(file.path(), r#"{"memory_id": "mem-3"}"#).unwrap();
        assert_eq!(loader.load(file.path()).unwrap().as_str(), "mem-3");
    }

    #[test]
    fn test_default_settings() {
        let settings = ManagerSettings::default();
        assert_eq!(settings.default_actor_id, "my-user-id");
        assert_eq!(settings.default_session_id, "DEFAULT");
        assert_eq!(settings.max_conversation_turns, 100);
        assert!(settings.store_url.is_none());
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_settings_from_lookup() {
        let settings = ManagerSettings::from_lookup(lookup(&[
            ("MEMORY_CONFIG_PATH", "/etc/memory.json"),
            ("MEMORY_DEFAULT_ACTOR_ID", "alice"),
            ("MEMORY_MAX_TURNS", "25"),
            ("MEMORY_STORE_URL", "http://memory.internal:9000"),
            ("MEMORY_STORE_TIMEOUT_SECS", "5"),
        ]));

        assert_eq!(settings.config_path, PathBuf::from("/etc/memory.json"));
        assert_eq!(settings.default_actor_id, "alice");
        assert_eq!(settings.default_session_id, "DEFAULT");
        assert_eq!(settings.max_conversation_turns, 25);
        assert_eq!(settings.store_url.as_deref(), Some("http://memory.internal:9000"));
        assert_eq!(settings.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let settings = ManagerSettings::from_lookup(lookup(&[
            ("MEMORY_DEFAULT_SESSION_ID", "   "),
            ("MEMORY_STORE_URL", ""),
            ("MEMORY_MAX_TURNS", " "),
        ]));

        assert_eq!(settings.default_session_id, "DEFAULT");
        assert!(settings.store_url.is_none());
        assert_eq!(settings.max_conversation_turns, DEFAULT_MAX_TURNS);
    }

    #[test]
    fn test_unparsable_numbers_fall_back() {
        let settings = ManagerSettings::from_lookup(lookup(&[
            ("MEMORY_MAX_TURNS", "lots"),
            ("MEMORY_STORE_TIMEOUT_SECS", "-3"),
        ]));

        assert_eq!(settings.max_conversation_turns, DEFAULT_MAX_TURNS);
        assert_eq!(
            settings.store_timeout,
            Duration::from_secs(DEFAULT_STORE_TIMEOUT_SECS)
        );
    }
}
