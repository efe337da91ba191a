use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::downloader::ResolveMode;
use crate::core::error::{IoResultExt, WorkspaceResult};
use crate::core::version::DEFAULT_MANIFEST_URL;

pub const SETTINGS_FILE: &str = "workspace_settings.json";

const TOOL_DIR_NAME: &str = "minecraft-workspace";
const LOCAL_CACHE_DIR: &str = ".mcws";
const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;

/// Per-project settings, read from `workspace_settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// Cache shared by every project on this machine.
    pub shared_cache: PathBuf,
    /// Cache for artifacts built from project-specific inputs.
    /// Relative paths are resolved against the project directory.
    pub local_cache: PathBuf,
    pub resolve_mode: ResolveMode,
    pub force_refresh: bool,
    pub manifest_url: String,
    pub download_concurrency: usize,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            shared_cache: default_shared_cache(),
            local_cache: PathBuf::from(LOCAL_CACHE_DIR),
            resolve_mode: ResolveMode::default(),
            force_refresh: false,
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
        }
    }
}

impl WorkspaceSettings {
    /// Settings of `project_dir`, or the defaults when it has none.
    ///
    /// A file that cannot be parsed is reported and ignored.
    pub fn load(project_dir: &Path) -> Self {
        let path = project_dir.join(SETTINGS_FILE);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            debug!("No settings at {:?}, using defaults", path);
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn save(&self, project_dir: &Path) -> WorkspaceResult<()> {
        let path = project_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).at(&path)
    }

    pub fn local_cache_dir(&self, project_dir: &Path) -> PathBuf {
        if self.local_cache.is_absolute() {
            self.local_cache.clone()
        } else {
            project_dir.join(&self.local_cache)
        }
    }
}

fn default_shared_cache() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(TOOL_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_broken_files_give_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(WorkspaceSettings::load(dir.path()), WorkspaceSettings::default());

        std::fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        assert_eq!(WorkspaceSettings::load(dir.path()), WorkspaceSettings::default());
    }

    #[test]
    fn partial_files_keep_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"resolve_mode": "local_only", "force_refresh": true}"#,
        )
        .unwrap();
        let settings = WorkspaceSettings::load(dir.path());
        assert_eq!(settings.resolve_mode, ResolveMode::LocalOnly);
        assert!(settings.force_refresh);
        assert_eq!(settings.download_concurrency, DEFAULT_DOWNLOAD_CONCURRENCY);
        assert_eq!(settings.local_cache_dir(dir.path()), dir.path().join(".mcws"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let settings = WorkspaceSettings {
            manifest_url: "https://meta.example/manifest.json".into(),
            ..WorkspaceSettings::default()
        };
        settings.save(dir.path()).unwrap();
        assert_eq!(WorkspaceSettings::load(dir.path()), settings);
    }
}
