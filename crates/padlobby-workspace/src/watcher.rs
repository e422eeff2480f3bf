use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{Config, Error as NotifyError, RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{
    new_debouncer_opt, DebounceEventResult, DebouncedEventKind, Debouncer,
};
use thiserror::Error;

use crate::{parse_config, ProfileError, WorkspaceConfig};

const DEBOUNCE_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] ProfileError),
}

/// Keeps the file system watch alive while held.
pub struct ConfigWatcher {
    #[allow(dead_code)]
    watcher: Debouncer<RecommendedWatcher>,
}

#[derive(Debug)]
pub enum ConfigEvent {
    Changed(WorkspaceConfig),
    Removed,
    Error(WatcherError),
}

type ConfigEventSender = mpsc::Sender<ConfigEvent>;
pub type ConfigEventReceiver = mpsc::Receiver<ConfigEvent>;

fn send_config_event(path: &Path, tx: &ConfigEventSender) {
    let event = match fs::read_to_string(path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => ConfigEvent::Changed(config),
            Err(e) => ConfigEvent::Error(WatcherError::Parse(e)),
        },
        Err(e) => ConfigEvent::Error(WatcherError::Io(e)),
    };
    let _ = tx.send(event);
}

impl ConfigWatcher {
    /// Watches `dir` and reports debounced changes of `file` inside it. The
    /// directory is watched rather than the file so that atomic saves and a
    /// file created after startup are both seen.
    pub fn new_with_sender(
        dir: &Path,
        file: &Path,
        tx: ConfigEventSender,
    ) -> Result<Self, WatcherError> {
        let file_c: PathBuf = file.to_owned();

        let debouncer_config = notify_debouncer_mini::Config::default()
            .with_timeout(DEBOUNCE_TIMEOUT)
            .with_notify_config(Config::default());
        let mut debouncer = new_debouncer_opt::<_, RecommendedWatcher>(
            debouncer_config,
            move |events: DebounceEventResult| match events {
                Ok(events) => {
                    let touched = events.iter().any(|event| {
                        event.path == file_c
                            && matches!(
                                event.kind,
                                DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                            )
                    });
                    if !touched {
                        return;
                    }
                    if file_c.exists() {
                        send_config_event(&file_c, &tx);
                    } else {
                        let _ = tx.send(ConfigEvent::Removed);
                    }
                }
                Err(error) => {
                    let _ = tx.send(ConfigEvent::Error(WatcherError::Notify(error)));
                }
            },
        )?;

        debouncer.watcher().watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self { watcher: debouncer })
    }

    pub fn new(dir: &Path, file: &Path) -> Result<(Self, ConfigEventReceiver), WatcherError> {
        let (tx, rx) = mpsc::channel();

        Ok((Self::new_with_sender(dir, file, tx)?, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_file_reports_io_error() {
        let (tx, rx) = mpsc::channel();
        send_config_event(Path::new("/nonexistent/padlobby.yaml"), &tx);
        assert!(matches!(
            rx.try_recv(),
            Ok(ConfigEvent::Error(WatcherError::Io(_)))
        ));
    }

    #[test]
    fn valid_file_reports_parsed_config() {
        let path = std::env::temp_dir()
            .join(format!("padlobby-watch-{}.yaml", std::process::id()));
        fs::write(&path, "version: 1\ntriggers: false\n").expect("write");
        let (tx, rx) = mpsc::channel();
        send_config_event(&path, &tx);
        match rx.try_recv() {
            Ok(ConfigEvent::Changed(config)) => assert!(!config.triggers),
            other => panic!("unexpected event: {other:?}"),
        }
        let _ = fs::remove_file(&path);
    }
}
