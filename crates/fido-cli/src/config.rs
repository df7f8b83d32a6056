use fido_core::Priority;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_RELATIVE: &str = ".fido/config.json";
pub const DEFAULT_STORE_RELATIVE: &str = ".fido/projects.json";
pub const DEFAULT_LOG_LEVEL: &str = "warn";

pub const STORE_ENV: &str = "FIDO_STORE_PATH";
pub const LOG_ENV: &str = "FIDO_LOG";

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FidoConfig {
    pub store_path: Option<String>,
    pub default_priority: Option<String>,
    pub log_level: Option<String>,
}

/// Reads the project config, or the one under the home directory when the
/// project has none. A config that fails to parse is reported and ignored.
pub fn load_config(root: &Path) -> Option<FidoConfig> {
    let local = root.join(CONFIG_RELATIVE);
    let path = if local.exists() {
        local
    } else {
        dirs::home_dir()?.join(CONFIG_RELATIVE)
    };

    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<FidoConfig>(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            eprintln!("Warning: failed to parse {}: {}", path.display(), err);
            None
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

pub struct Settings {
    pub root: PathBuf,
    pub config: Option<FidoConfig>,
}

impl Settings {
    pub fn new(root: PathBuf) -> Self {
        let config = load_config(&root);
        Self { root, config }
    }

    /// `--store` beats `FIDO_STORE_PATH`, which beats `storePath`.
    pub fn store_path(&self, flag: Option<&Path>) -> PathBuf {
        self.store_path_with(flag, std::env::var(STORE_ENV).ok())
    }

    fn store_path_with(&self, flag: Option<&Path>, env: Option<String>) -> PathBuf {
        let chosen = flag
            .map(Path::to_path_buf)
            .or_else(|| non_blank(env).map(PathBuf::from))
            .or_else(|| {
                self.config
                    .as_ref()
                    .and_then(|config| non_blank(config.store_path.clone()))
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_RELATIVE));
        if chosen.is_absolute() {
            chosen
        } else {
            self.root.join(chosen)
        }
    }

    pub fn resolve_priority(&self, override_priority: Option<Priority>) -> Priority {
        if let Some(priority) = override_priority {
            return priority;
        }
        if let Some(config) = &self.config {
            if let Some(priority) = config.default_priority.as_ref() {
                if let Ok(parsed) = priority.parse::<Priority>() {
                    return parsed;
                }
            }
        }
        Priority::default()
    }

    pub fn log_level(&self) -> String {
        self.log_level_with(std::env::var(LOG_ENV).ok())
    }

    fn log_level_with(&self, env: Option<String>) -> String {
        non_blank(env)
            .or_else(|| {
                self.config
                    .as_ref()
                    .and_then(|config| non_blank(config.log_level.clone()))
            })
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings_with(config: &str) -> (tempfile::TempDir, Settings) {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_RELATIVE);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, config).expect("write config");
        let settings = Settings::new(dir.path().to_path_buf());
        (dir, settings)
    }

    #[test]
    fn local_config_is_read_in_camel_case() {
        let (_dir, settings) = settings_with(
            r#"{"storePath": "data/store.json", "defaultPriority": "HIGH", "logLevel": "debug"}"#,
        );
        assert_eq!(settings.resolve_priority(None), Priority::High);
        assert_eq!(settings.resolve_priority(Some(Priority::Low)), Priority::Low);
        assert_eq!(settings.log_level_with(None), "debug");
        assert_eq!(
            settings.store_path_with(None, None),
            settings.root.join("data/store.json")
        );
    }

    #[test]
    fn flag_beats_env_beats_config() {
        let (_dir, settings) = settings_with(r#"{"storePath": "from-config.json"}"#);
        let flag = Path::new("/tmp/flag.json");
        assert_eq!(
            settings.store_path_with(Some(flag), Some("env.json".to_string())),
            PathBuf::from("/tmp/flag.json")
        );
        assert_eq!(
            settings.store_path_with(None, Some("env.json".to_string())),
            settings.root.join("env.json")
        );
        assert_eq!(
            settings.store_path_with(None, Some("  ".to_string())),
            settings.root.join("from-config.json")
        );
        assert_eq!(settings.log_level_with(Some("trace".to_string())), "trace");
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        let (_dir, settings) = settings_with("{ not json");
        assert!(settings.config.is_none());
        assert_eq!(settings.resolve_priority(None), Priority::Medium);
        assert_eq!(settings.log_level_with(None), DEFAULT_LOG_LEVEL);
        assert_eq!(
            settings.store_path_with(None, None),
            settings.root.join(DEFAULT_STORE_RELATIVE)
        );
    }
}
