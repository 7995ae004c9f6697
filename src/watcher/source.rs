//! Notification sources - OS-backed and channel-backed.
//!
//! Watcher callbacks fan events out over crossbeam channels instead of
//! mutating shared state; each consumer owns its receiver and applies the
//! changes on its own thread.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::event::{ModifyKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::events::{ChangeEvent, ChangeKind};
use crate::error::{AssetError, Result};

/// A source of filesystem change notifications scoped to a directory subtree.
pub trait NotificationSource: Send + Sync {
    /// Returns a new receiver observing every subsequent change event.
    fn subscribe(&self) -> Receiver<ChangeEvent>;
}

type SubscriberList = Arc<Mutex<Vec<Sender<ChangeEvent>>>>;

/// Delivers one event to every live subscriber, pruning closed ones.
fn broadcast(subscribers: &SubscriberList, event: ChangeEvent) {
    let Ok(mut subscribers) = subscribers.lock() else {
        return;
    };
    subscribers.retain(|sender| sender.send(event.clone()).is_ok());
}

/// Notification source backed by the OS watch facility.
pub struct FsNotificationSource {
    root: PathBuf,
    subscribers: SubscriberList,
    _watcher: Mutex<RecommendedWatcher>,
}

impl std::fmt::Debug for FsNotificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsNotificationSource")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FsNotificationSource {
    /// Starts watching `root` recursively.
    pub fn watch(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(AssetError::InvalidInput(format!(
                "watch root is not a directory: {}",
                root.display()
            )));
        }

        let subscribers: SubscriberList = Arc::new(Mutex::new(Vec::new()));
        let callback_subscribers = subscribers.clone();
        let mut watcher =
            recommended_watcher(move |event_result: notify::Result<Event>| match event_result {
                Ok(event) => {
                    for change in map_notify_event(event) {
                        broadcast(&callback_subscribers, change);
                    }
                }
                Err(error) => {
                    log::warn!("filesystem watcher error: {error}");
                }
            })
            .map_err(|error| {
                AssetError::Internal(format!(
                    "failed to create filesystem watcher for {}: {error}",
                    root.display()
                ))
            })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|error| {
                AssetError::Internal(format!("failed to watch {}: {error}", root.display()))
            })?;

        Ok(Self {
            root: root.to_path_buf(),
            subscribers,
            _watcher: Mutex::new(watcher),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl NotificationSource for FsNotificationSource {
    fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }
}

/// Maps a raw notify event onto zero or more change events.
///
/// Access events carry no index-relevant information and are dropped. Name
/// modifications become renames; the prior path is attached only when the
/// platform pairs both legs in one event.
fn map_notify_event(event: Event) -> Vec<ChangeEvent> {
    match event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .map(|path| ChangeEvent::new(ChangeKind::Created, path))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .into_iter()
            .map(|path| ChangeEvent::new(ChangeKind::Deleted, path))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            let mut paths = event.paths.into_iter();
            let old_path = paths.next();
            match paths.next() {
                Some(new_path) => vec![ChangeEvent::renamed(new_path, old_path)],
                None => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .into_iter()
            .map(|path| ChangeEvent::renamed(path, None))
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .map(|path| ChangeEvent::new(ChangeKind::Changed, path))
            .collect(),
        EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// In-process notification source.
///
/// Hosts that already marshal OS notifications onto their own thread can
/// re-emit them here; tests use it to drive reconciliation deterministically.
#[derive(Default)]
pub struct ChannelNotificationSource {
    subscribers: SubscriberList,
}

impl ChannelNotificationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers one event to every subscriber.
    pub fn emit(&self, event: ChangeEvent) {
        broadcast(&self.subscribers, event);
    }
}

impl NotificationSource for ChannelNotificationSource {
    fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }
}
