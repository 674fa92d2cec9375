//! File-change notifications for the commit log.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::MonitorError;

/// Yields once per batch of changes to the watched log.
#[async_trait]
pub trait LogWatcher: Send {
    async fn changed(&mut self) -> Result<(), MonitorError>;
}

/// `notify` watcher bridged onto a tokio channel.
pub struct NotifyLogWatcher {
    path: PathBuf,
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    // Dropping the watcher stops event delivery.
    _watcher: RecommendedWatcher,
}

impl NotifyLogWatcher {
    pub fn watch(path: &Path) -> Result<Self, MonitorError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let _ = tx.send(event);
        })
        .map_err(MonitorError::Watch)?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(MonitorError::Watch)?;

        Ok(Self {
            path: path.to_path_buf(),
            rx,
            _watcher: watcher,
        })
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any)
    )
}

#[async_trait]
impl LogWatcher for NotifyLogWatcher {
    async fn changed(&mut self) -> Result<(), MonitorError> {
        loop {
            match self.rx.recv().await {
                Some(Ok(event)) if is_content_change(&event.kind) => break,
                Some(Ok(event)) => trace!("Ignoring {:?} on {}", event.kind, self.path.display()),
                Some(Err(e)) => return Err(MonitorError::Watch(e)),
                None => return Err(MonitorError::WatcherClosed),
            }
        }

        // One drain reads the whole file, so collapse events already queued.
        while let Ok(event) = self.rx.try_recv() {
            if let Err(e) = event {
                return Err(MonitorError::Watch(e));
            }
        }
        Ok(())
    }
}
