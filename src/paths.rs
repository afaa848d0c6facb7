use std::env;
use std::path::{Path, PathBuf};

use uuid::Uuid;

pub const APP_NAME: &str = "zenml";
pub const ENV_CONFIG_PATH: &str = "ZENML_CONFIG_PATH";
pub const CONFIG_FILE_NAME: &str = "config.yaml";
pub const DATABASE_FILE_NAME: &str = "zenml.db";
pub const LOCAL_STORES_DIR: &str = "local_stores";

/// Resolve the global configuration directory.
///
/// `ZENML_CONFIG_PATH` wins when set and non-empty. Relative values are
/// resolved against the current working directory.
pub fn config_directory() -> PathBuf {
    if let Some(value) = env::var_os(ENV_CONFIG_PATH)
        && !value.is_empty()
    {
        return absolutize(Path::new(&value));
    }

    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn config_file(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

pub fn default_database(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE_NAME)
}

pub fn local_stores_root(root: &Path) -> PathBuf {
    root.join(LOCAL_STORES_DIR)
}

pub fn local_store_path(root: &Path, component_id: Uuid) -> PathBuf {
    local_stores_root(root).join(component_id.to_string())
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_at_the_config_directory() {
        let root = Path::new("/tmp/zen");
        assert_eq!(config_file(root), Path::new("/tmp/zen/config.yaml"));
        assert_eq!(default_database(root), Path::new("/tmp/zen/zenml.db"));

        let id = Uuid::nil();
        assert_eq!(
            local_store_path(root, id),
            Path::new("/tmp/zen/local_stores/00000000-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn relative_paths_are_made_absolute() {
        let resolved = absolutize(Path::new("relative/dir"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("relative/dir"));
    }
}
