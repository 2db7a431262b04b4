//! Configuration file change notifications

use chrono::{DateTime, Utc};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::expand_home;
use crate::error::ConfigFileError;

const CHANGE_CAPACITY: usize = 100;

/// A modification of the watched file
#[derive(Debug, Clone)]
pub struct ConfigChange {
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
    /// Starts at 1 and increases with every notification
    pub version: u32,
}

/// Watches one configuration file; dropping it stops the notifications
pub struct FileConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl FileConfigWatcher {
    /// Start watching `path` and return the receiving end of its changes
    pub fn watch(
        path: impl Into<PathBuf>,
    ) -> Result<(Self, mpsc::Receiver<ConfigChange>), ConfigFileError> {
        let path = expand_home(path)?;
        if !path.exists() {
            return Err(ConfigFileError::NotFound(path));
        }

        let (tx, rx) = mpsc::channel(CHANGE_CAPACITY);
        let version = Arc::new(AtomicU32::new(0));
        let event_path = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                        return;
                    }
                    let change = ConfigChange {
                        path: event_path.clone(),
                        timestamp: Utc::now(),
                        version: version.fetch_add(1, Ordering::SeqCst) + 1,
                    };
                    if tx.blocking_send(change).is_err() {
                        debug!("Config change receiver closed");
                    }
                }
                Err(e) => warn!(error = %e, "File watch error"),
            },
            notify::Config::default(),
        )
        .inspect_err(|e| error!(error = %e, "Failed to create file watcher"))?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        info!(path = %path.display(), "Watching config file for changes");

        Ok((
            Self {
                path,
                _watcher: watcher,
            },
            rx,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
