//! The per-machine `config.yaml` record.
//!
//! The record is a flat, single-writer document. It tracks the user
//! identity, the analytics opt-in flag, the active stack and workspace, and
//! a descriptor of the SQL store that holds everything else.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::paths;

pub const SQLITE_URL_PREFIX: &str = "sqlite:///";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    Sql,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(rename = "type")]
    pub store_type: StoreType,
    pub url: String,
}

impl StoreConfig {
    pub fn sqlite(path: &Path) -> Self {
        Self {
            store_type: StoreType::Sql,
            url: format!("{SQLITE_URL_PREFIX}{}", path.display()),
        }
    }

    /// Filesystem location of the SQLite file named by the URL.
    ///
    /// `sqlite:////abs/path` yields `/abs/path`; anything after the
    /// three-slash prefix is taken verbatim.
    pub fn database_path(&self) -> Result<PathBuf> {
        let rest = self.url.strip_prefix(SQLITE_URL_PREFIX).ok_or_else(|| {
            StoreError::invalid_config(format!(
                "Unsupported store URL '{}': expected '{SQLITE_URL_PREFIX}<path>'",
                self.url
            ))
        })?;
        if rest.trim().is_empty() {
            return Err(StoreError::invalid_config(format!(
                "Store URL '{}' does not name a database file",
                self.url
            )));
        }
        Ok(PathBuf::from(rest))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfiguration {
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    #[serde(default = "default_analytics")]
    pub analytics_opt_in: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub active_stack_name: Option<String>,
    #[serde(default, alias = "active_project_name")]
    pub active_workspace_name: Option<String>,
    pub store: StoreConfig,
}

fn default_analytics() -> bool {
    true
}

impl GlobalConfiguration {
    /// Defaults for a freshly initialized config directory.
    pub fn new_default(root: &Path) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            user_email: None,
            analytics_opt_in: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            active_stack_name: None,
            active_workspace_name: None,
            store: StoreConfig::sqlite(&paths::default_database(root)),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: GlobalConfiguration = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Read `config.yaml` under `root`, writing defaults when it is missing.
    pub fn load_or_init(root: &Path) -> Result<Self> {
        let path = paths::config_file(root);
        if path.is_file() {
            let config = Self::load(&path)?;
            if config.version != env!("CARGO_PKG_VERSION") {
                debug!(
                    found = %config.version,
                    running = env!("CARGO_PKG_VERSION"),
                    "Global configuration written by a different version"
                );
            }
            return Ok(config);
        }

        fs::create_dir_all(root)?;
        let config = Self::new_default(root);
        config.save(root)?;
        info!(path = %path.display(), "Initialized global configuration");
        Ok(config)
    }

    /// Write the record to `<root>/config.yaml` via a temp file and rename.
    pub fn save(&self, root: &Path) -> Result<()> {
        fs::create_dir_all(root)?;
        let mut stamped = self.clone();
        stamped.version = env!("CARGO_PKG_VERSION").to_string();
        let rendered = serde_yaml::to_string(&stamped)?;

        let path = paths::config_file(root);
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, rendered)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        self.store.database_path()
    }

    pub fn set_active_stack(&mut self, name: impl Into<String>) {
        self.active_stack_name = Some(name.into());
    }

    pub fn set_active_workspace(&mut self, name: impl Into<String>) {
        self.active_workspace_name = Some(name.into());
    }

    pub fn set_analytics(&mut self, opt_in: bool) {
        self.analytics_opt_in = opt_in;
    }

    pub fn set_store(&mut self, url: &str) -> Result<()> {
        let candidate = StoreConfig {
            store_type: StoreType::Sql,
            url: url.trim().to_string(),
        };
        candidate.database_path()?;
        self.store = candidate;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn written_config_reads_back_identically() {
        let temp = tempdir().unwrap();
        let mut config = GlobalConfiguration::new_default(temp.path());
        config.set_active_stack("default");
        config.set_active_workspace("default");
        config.set_analytics(false);
        config.user_email = Some("aria@example.com".into());
        config.save(temp.path()).unwrap();

        let loaded = GlobalConfiguration::load(&paths::config_file(temp.path())).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn load_or_init_creates_defaults_once() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("nested");
        let first = GlobalConfiguration::load_or_init(&root).unwrap();
        assert!(paths::config_file(&root).is_file());
        assert!(first.analytics_opt_in);
        assert_eq!(
            first.database_path().unwrap(),
            paths::default_database(&root)
        );

        let second = GlobalConfiguration::load_or_init(&root).unwrap();
        assert_eq!(first.user_id, second.user_id);
    }

    #[test]
    fn legacy_project_key_is_accepted() {
        let yaml = r#"
user_id: 5b2a3f4e-1111-4c3d-9a7b-0a1b2c3d4e5f
version: 0.0.9
analytics_opt_in: false
active_stack_name: default
active_project_name: legacy
store:
  type: sql
  url: sqlite:////tmp/zenml.db
"#;
        let config: GlobalConfiguration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.active_workspace_name.as_deref(), Some("legacy"));
        assert!(!config.analytics_opt_in);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/zenml.db")
        );
    }

    #[test]
    fn store_url_must_be_sqlite() {
        let temp = tempdir().unwrap();
        let mut config = GlobalConfiguration::new_default(temp.path());
        assert!(config.set_store("mysql://localhost/zenml").is_err());
        assert!(config.set_store("sqlite:///").is_err());
        config.set_store("sqlite:////var/lib/zenml.db").unwrap();
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/var/lib/zenml.db")
        );
    }
}
