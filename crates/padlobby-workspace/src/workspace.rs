use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::watcher::{ConfigEventReceiver, ConfigWatcher};
use crate::{parse_config, WorkspaceConfig, WorkspaceError};

const APP_DIR_NAME: &str = "padlobby";
const CONFIG_FILE_NAME: &str = "padlobby.yaml";
const SOCKET_FILE_NAME: &str = "api.sock";

/// Directory holding the workspace file and the command socket.
#[derive(Debug, Clone)]
pub struct Workspace {
    path: PathBuf,
}

impl Workspace {
    pub fn new(path: Option<&Path>) -> Result<Self, WorkspaceError> {
        let path = match path {
            Some(path) => path.to_owned(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            fs::create_dir_all(&path)?;
        } else if !path.is_dir() {
            return Err(WorkspaceError::PathIsNotDirectory(
                path.display().to_string(),
            ));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join(CONFIG_FILE_NAME)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.path.join(SOCKET_FILE_NAME)
    }

    /// Reads the workspace file. A missing file yields the defaults.
    pub fn load_config(&self) -> Result<WorkspaceConfig, WorkspaceError> {
        match fs::read_to_string(self.config_path()) {
            Ok(content) => Ok(parse_config(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(WorkspaceConfig::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Watches the workspace file for edits.
    pub fn start_config_watcher(
        &self,
    ) -> Result<(ConfigWatcher, ConfigEventReceiver), WorkspaceError> {
        Ok(ConfigWatcher::new(&self.path, &self.config_path())?)
    }

    /// `$XDG_CONFIG_HOME/padlobby`, else `$HOME/.config/padlobby`.
    pub fn default_path() -> Result<PathBuf, WorkspaceError> {
        Self::default_path_from(
            std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            std::env::var_os("HOME").map(PathBuf::from),
        )
    }

    fn default_path_from(
        xdg_config_home: Option<PathBuf>,
        home: Option<PathBuf>,
    ) -> Result<PathBuf, WorkspaceError> {
        if let Some(config_home) = xdg_config_home.filter(|p| p.is_absolute()) {
            return Ok(config_home.join(APP_DIR_NAME));
        }
        home.map(|home| home.join(".config").join(APP_DIR_NAME))
            .ok_or_else(|| WorkspaceError::EnvVarNotSet("HOME".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("padlobby-workspace-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn default_path_prefers_xdg_config_home() {
        let path = Workspace::default_path_from(
            Some(PathBuf::from("/xdg")),
            Some(PathBuf::from("/home/me")),
        )
        .expect("path");
        assert_eq!(path, PathBuf::from("/xdg/padlobby"));
    }

    #[test]
    fn default_path_falls_back_to_home() {
        let path = Workspace::default_path_from(
            Some(PathBuf::from("relative")),
            Some(PathBuf::from("/home/me")),
        )
        .expect("path");
        assert_eq!(path, PathBuf::from("/home/me/.config/padlobby"));
        assert!(matches!(
            Workspace::default_path_from(None, None),
            Err(WorkspaceError::EnvVarNotSet(_))
        ));
    }

    #[test]
    fn new_creates_directory_and_missing_config_means_defaults() {
        let dir = scratch_dir("create");
        let workspace = Workspace::new(Some(&dir)).expect("workspace");
        assert!(dir.is_dir());
        assert_eq!(workspace.socket_path(), dir.join("api.sock"));
        assert_eq!(workspace.load_config().expect("config"), WorkspaceConfig::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn new_rejects_regular_file() {
        let dir = scratch_dir("file");
        fs::write(&dir, "x").expect("write");
        assert!(matches!(
            Workspace::new(Some(&dir)),
            Err(WorkspaceError::PathIsNotDirectory(_))
        ));
        let _ = fs::remove_file(&dir);
    }

    #[test]
    fn load_config_reports_parse_errors() {
        let dir = scratch_dir("invalid");
        let workspace = Workspace::new(Some(&dir)).expect("workspace");
        fs::write(workspace.config_path(), "version: 9\n").expect("write");
        assert!(matches!(
            workspace.load_config(),
            Err(WorkspaceError::Config(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
