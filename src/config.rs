//! Where profile stores live.
//!
//! Resolution order: an explicit data directory (CLI flag or
//! `VAULTKEEP_DATA_DIR`), then `<config dir>/config.json`, then the platform
//! data directory. The resolved [`Config`] is passed to whatever needs a
//! path; nothing is kept in global state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::storage::Storage;

pub const DEFAULT_PROFILE: &str = "default";
const CONFIG_FILE: &str = "config.json";
const STORE_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub data_directory: PathBuf,
}

impl Config {
    pub fn new(data_directory: PathBuf) -> Self {
        Self { data_directory }
    }

    /// Reads `config.json` from `config_dir`, writing one that points at
    /// `default_data_dir` when it does not exist yet.
    pub fn load_or_init(config_dir: &Path, default_data_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);

        if path.exists() {
            let data = fs::read(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            return serde_json::from_slice(&data)
                .with_context(|| format!("invalid config file {}", path.display()));
        }

        let config = Self::new(default_data_dir.to_path_buf());
        fs::create_dir_all(config_dir)
            .with_context(|| format!("failed to create {}", config_dir.display()))?;
        fs::write(&path, serde_json::to_vec_pretty(&config)?)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        tracing::info!(path = %path.display(), data_directory = %config.data_directory.display(), "config created");

        Ok(config)
    }

    /// Platform config file, falling back to the platform data directory.
    pub fn from_platform_dirs() -> Result<Self> {
        let dirs = project_dirs()?;
        Self::load_or_init(dirs.config_dir(), dirs.data_dir())
    }

    pub fn store_path(&self, profile: &str) -> PathBuf {
        self.data_directory
            .join(format!("{profile}.{STORE_EXTENSION}"))
    }

    pub fn storage(&self, profile: &str) -> Storage {
        Storage::new(self.store_path(profile))
    }

    /// Profile names with a store file in the data directory, sorted.
    pub fn list_profiles(&self) -> Result<Vec<String>> {
        if !self.data_directory.exists() {
            return Ok(Vec::new());
        }

        let mut profiles = Vec::new();
        for entry in fs::read_dir(&self.data_directory).with_context(|| {
            format!("failed to read data directory {}", self.data_directory.display())
        })? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != STORE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                profiles.push(stem.to_string_lossy().into_owned());
            }
        }
        profiles.sort();

        Ok(profiles)
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "vaultkeep").context("could not determine platform directories")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_or_init_writes_default_then_reads_it_back() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join("config");
        let data_dir = dir.path().join("data");

        let first = Config::load_or_init(&config_dir, &data_dir).unwrap();
        assert_eq!(first.data_directory, data_dir);
        assert!(config_dir.join("config.json").exists());

        let second = Config::load_or_init(&config_dir, Path::new("/ignored")).unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn existing_config_wins() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{"data_directory": "/srv/vaults"}"#,
        )
        .unwrap();

        let config = Config::load_or_init(dir.path(), Path::new("/other")).unwrap();
        assert_eq!(config.data_directory, PathBuf::from("/srv/vaults"));
    }

    #[test]
    fn store_path_uses_profile_name() {
        let config = Config::new(PathBuf::from("/srv/vaults"));
        assert_eq!(
            config.store_path("work"),
            PathBuf::from("/srv/vaults/work.json")
        );
    }

    #[test]
    fn list_profiles_only_reports_store_files() {
        let dir = tempdir().unwrap();
        for name in ["work.json", "default.json", "default.json.lock", "notes.txt", "my.team.json"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        fs::create_dir(dir.path().join("sub.json")).unwrap();

        let config = Config::new(dir.path().to_path_buf());
        assert_eq!(
            config.list_profiles().unwrap(),
            ["default", "my.team", "work"]
        );
    }

    #[test]
    fn list_profiles_on_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().join("nope"));
        assert!(config.list_profiles().unwrap().is_empty());
    }
}
