use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::VibeflowError;

/// Editors tend to emit several events per save.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Watches one document on disk and reports when it changes.
pub struct DocumentWatcher {
    // Dropping the watcher stops the notifications.
    _watcher: RecommendedWatcher,
    changes: mpsc::UnboundedReceiver<()>,
}

impl DocumentWatcher {
    pub fn new(path: &Path) -> Result<Self, VibeflowError> {
        let target = canonical(path);
        let (tx, changes) = mpsc::unbounded_channel();

        let watched = target.clone();
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    if should_reload(&event) && targets(&event, &watched) {
                        let _ = tx.send(());
                    }
                }
                Err(error) => warn!(%error, "document watcher error"),
            })?;

        // Watch the directory so rename-on-save editors are still seen.
        let root = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        watcher.watch(&root, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            changes,
        })
    }

    /// Resolves once per burst of edits. `None` if the watcher died.
    pub async fn changed(&mut self) -> Option<()> {
        self.changes.recv().await?;
        tokio::time::sleep(DEBOUNCE).await;
        while self.changes.try_recv().is_ok() {}
        Some(())
    }
}

fn should_reload(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Any
    )
}

fn targets(event: &Event, document: &Path) -> bool {
    if event.paths.is_empty() {
        return true;
    }
    event
        .paths
        .iter()
        .any(|path| path == document || canonical(path) == document)
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
