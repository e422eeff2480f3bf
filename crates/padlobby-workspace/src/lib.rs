//! Workspace directory, yaml configuration and the controller profile store.

mod config;
mod parse;
mod profile;
mod seed;
mod store;
mod v1;
mod watcher;
mod workspace;

use thiserror::Error;

pub use config::{Timing, WorkspaceConfig};
pub use parse::parse_config;
pub use profile::{is_valid_guid, Profile, ProfileUpdate, TypeDefault, DEFAULT_IMAGE, DEFAULT_SOUND};
pub use seed::seed_type_defaults;
pub use store::{MemoryProfileStore, ProfileStore, StartButtonLookup, StoreError};
pub use v1::{parse_button_name, ChordErrorKind, Error as ConfigV1Error};
pub use watcher::{ConfigEvent, ConfigEventReceiver, ConfigWatcher, WatcherError};
pub use workspace::Workspace;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("yaml deserialize error: {0}")]
    YamlDeserializeError(#[from] serde_yaml::Error),
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),
    #[error("v1 config error: {0}")]
    V1(#[from] v1::Error),
}

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("environment variable not set: {0}")]
    EnvVarNotSet(String),
    #[error("path is not a directory: {0}")]
    PathIsNotDirectory(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] ProfileError),
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),
}
