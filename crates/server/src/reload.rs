//! Rebuild the field registry when the settings file changes.
//!
//! Only `[[scopes]]` are re-applied. Cache, scheduler, provider and notify
//! sections are read once at startup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use almanac_compute::{AlmanacEngine, BuildReport, ComputeError};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::settings::{Settings, SettingsError};

/// Quiet period after a change before the file is read.
const DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum ReloadError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Compute(#[from] ComputeError),
}

pub struct SettingsReloader {
    path: PathBuf,
    engine: Arc<AlmanacEngine>,
}

impl SettingsReloader {
    pub fn new(path: impl Into<PathBuf>, engine: Arc<AlmanacEngine>) -> Self {
        Self {
            path: path.into(),
            engine,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the settings file and rebuild the registry from its scopes.
    /// A file that cannot be read or parsed leaves the current fields alone.
    pub async fn reload(&self) -> Result<BuildReport, ReloadError> {
        let settings = Settings::read(&self.path)?;
        let report = self.engine.reload(settings.scopes).await?;
        for dropped in &report.dropped {
            warn!(scope = %dropped.scope, entry = %dropped.entry, reason = %dropped.reason, "Entry left out");
        }
        info!(
            path = %self.path.display(),
            generation = report.generation,
            added = report.added,
            replaced = report.replaced,
            removed = report.removed,
            "Settings reloaded"
        );
        Ok(report)
    }

    /// Watch the settings file and reload on every change, debounced.
    ///
    /// The parent directory is watched so editors that replace the file
    /// on save are still seen. Dropping the returned guard stops watching.
    pub fn watch(self: Arc<Self>) -> Result<SettingsWatch, notify::Error> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let file_name = self.path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                let relevant = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
                    && event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if relevant {
                    let _ = tx.send(());
                }
            }
            Err(e) => warn!(error = %e, "settings watcher error"),
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        info!(path = %self.path.display(), "watching settings file for changes");

        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(DEBOUNCE).await;
                while rx.try_recv().is_ok() {}
                if let Err(e) = self.reload().await {
                    warn!(path = %self.path.display(), error = %e, "Settings reload failed, keeping current fields");
                }
            }
        });

        Ok(SettingsWatch {
            _watcher: watcher,
            task,
        })
    }
}

/// Keeps a settings watch alive.
pub struct SettingsWatch {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for SettingsWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
