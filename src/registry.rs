//! Whole-content-tree asset index.
//!
//! One [`AssetRegistry`] serves one open project. `reset` performs the full
//! recursive registration scan and then subscribes to the injected
//! notification source; subsequent filesystem events are debounced and
//! reconciled in batches. Watcher-driven mutation funnels through the
//! instance's pump thread, so event application is single-threaded from the
//! registry's perspective; readers take snapshots through the lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::debounce::{BatchControl, DelayBatcher, DEFAULT_DEBOUNCE_DELAY};
use crate::error::{canonicalize_existing_path, lock_poisoned_error, AssetError, Result};
use crate::header::AssetHeader;
use crate::types::{is_asset_path, AssetInfo};
use crate::watcher::{ChangeEvent, ChangeKind, EventPump, NotificationSource};

/// A change applied to the registry, delivered to subscribers.
///
/// `clear` and `reset` establish a new baseline instead of emitting one
/// event per dropped entry; consumers re-snapshot via [`AssetRegistry::assets`].
#[derive(Debug, Clone)]
pub enum RegistryChange {
    Registered(Arc<AssetInfo>),
    Unregistered(PathBuf),
}

#[derive(Default)]
struct RegistryInner {
    assets: RwLock<HashMap<PathBuf, Arc<AssetInfo>>>,
    subscribers: Mutex<Vec<Sender<RegistryChange>>>,
}

impl RegistryInner {
    fn notify(&self, change: RegistryChange) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        subscribers.retain(|sender| sender.send(change.clone()).is_ok());
    }

    /// Registers the asset file at `path` unless the index already holds a
    /// fresh entry for it. Returns whether the index changed.
    fn register(&self, path: &Path) -> Result<bool> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Ok(false);
        }
        let modified = metadata.modified()?;

        {
            let assets = self
                .assets
                .read()
                .map_err(|_| lock_poisoned_error("asset index"))?;
            if let Some(existing) = assets.get(path) {
                // entry is fresh while its stamp is not older than the file
                if existing.register_time >= modified {
                    return Ok(false);
                }
            }
        }

        let header = AssetHeader::read_from_file(path)?;
        let info = Arc::new(header.into_info(path.to_path_buf()));
        self.assets
            .write()
            .map_err(|_| lock_poisoned_error("asset index"))?
            .insert(path.to_path_buf(), info.clone());
        self.notify(RegistryChange::Registered(info));
        Ok(true)
    }

    /// Removes the entry for `path` if present. Returns whether it existed.
    fn unregister(&self, path: &Path) -> bool {
        let removed = match self.assets.write() {
            Ok(mut assets) => assets.remove(path).is_some(),
            Err(_) => false,
        };
        if removed {
            self.notify(RegistryChange::Unregistered(path.to_path_buf()));
        }
        removed
    }

    /// Drops every entry whose backing file no longer exists on disk.
    ///
    /// This compensates for platforms whose rename notifications do not
    /// reliably pair the old path with the new one.
    fn sweep_missing(&self) {
        let missing: Vec<PathBuf> = {
            let Ok(assets) = self.assets.read() else {
                return;
            };
            assets
                .keys()
                .filter(|path| !path.exists())
                .cloned()
                .collect()
        };
        for path in missing {
            self.unregister(&path);
        }
    }

    /// Applies one debounced batch of asset-file events in arrival order.
    fn apply_batch(&self, batch: Vec<ChangeEvent>) {
        for event in batch {
            match event.kind {
                ChangeKind::Deleted => {
                    self.unregister(&event.path);
                }
                ChangeKind::Created | ChangeKind::Changed => {
                    if !event.path.exists() {
                        // gone again already; a delete event is on its way
                        continue;
                    }
                    if let Err(error) = self.register(&event.path) {
                        log::warn!(
                            "failed to register asset {}: {error}",
                            event.path.display()
                        );
                    }
                }
                ChangeKind::Renamed => {
                    if event.path.exists() {
                        if let Err(error) = self.register(&event.path) {
                            log::warn!(
                                "failed to register renamed asset {}: {error}",
                                event.path.display()
                            );
                        }
                    }
                    self.sweep_missing();
                }
            }
        }
    }
}

/// Process-wide index of every asset file under a project's content root.
pub struct AssetRegistry {
    inner: Arc<RegistryInner>,
    source: Arc<dyn NotificationSource>,
    debounce_delay: Duration,
    pump: Mutex<Option<EventPump>>,
}

impl AssetRegistry {
    /// Creates an empty registry bound to a notification source. Call
    /// [`reset`](Self::reset) to populate it and start watching.
    pub fn new(source: Arc<dyn NotificationSource>) -> Self {
        Self::with_debounce_delay(source, DEFAULT_DEBOUNCE_DELAY)
    }

    pub fn with_debounce_delay(source: Arc<dyn NotificationSource>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(RegistryInner::default()),
            source,
            debounce_delay: delay,
            pump: Mutex::new(None),
        }
    }

    /// Clears all state, registers every asset file under `root`, then
    /// subscribes to filesystem notifications.
    ///
    /// Errors only when `root` does not exist; individual unreadable files
    /// are logged and skipped.
    pub fn reset(&self, root: &Path) -> Result<()> {
        self.clear()?;

        if !root.is_dir() {
            return Err(AssetError::InvalidInput(format!(
                "content root does not exist: {}",
                root.display()
            )));
        }
        let root = canonicalize_existing_path(root.to_path_buf());

        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    log::warn!("content scan error under {}: {error}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_asset_path(entry.path()) {
                continue;
            }
            if let Err(error) = self.inner.register(entry.path()) {
                log::warn!("skipping unreadable asset {}: {error}", entry.path().display());
            }
        }

        let inner = self.inner.clone();
        let batcher = DelayBatcher::new(self.debounce_delay, move |batch| {
            inner.apply_batch(batch);
            BatchControl::Disarm
        });
        let pump = EventPump::start(self.source.subscribe(), move |event| {
            if is_asset_path(&event.path) {
                batcher.trigger(event);
            }
        });
        *self
            .pump
            .lock()
            .map_err(|_| lock_poisoned_error("registry pump"))? = Some(pump);

        log::info!(
            "asset registry reset root={} entries={}",
            root.display(),
            self.len()
        );
        Ok(())
    }

    /// Detaches the notification subscription and empties the index.
    pub fn clear(&self) -> Result<()> {
        let pump = self
            .pump
            .lock()
            .map_err(|_| lock_poisoned_error("registry pump"))?
            .take();
        drop(pump);
        self.inner
            .assets
            .write()
            .map_err(|_| lock_poisoned_error("asset index"))?
            .clear();
        Ok(())
    }

    /// Registers or refreshes the asset file at `path`.
    ///
    /// No-op when the indexed entry is at least as new as the file on disk.
    pub fn register_asset(&self, path: &Path) -> Result<()> {
        self.inner.register(path).map(|_| ())
    }

    /// Removes the entry for `path`; no-op when absent.
    pub fn unregister_asset(&self, path: &Path) {
        self.inner.unregister(path);
    }

    /// Point lookup by path. `None` when unknown.
    pub fn asset_info(&self, path: &Path) -> Option<Arc<AssetInfo>> {
        self.inner.assets.read().ok()?.get(path).cloned()
    }

    /// Linear lookup by GUID. `None` when unknown.
    pub fn asset_info_by_guid(&self, guid: Uuid) -> Option<Arc<AssetInfo>> {
        self.inner
            .assets
            .read()
            .ok()?
            .values()
            .find(|info| info.guid == guid)
            .cloned()
    }

    /// Snapshot of every indexed asset.
    pub fn assets(&self) -> Vec<Arc<AssetInfo>> {
        match self.inner.assets.read() {
            Ok(assets) => assets.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.assets.read().map(|assets| assets.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a receiver observing every subsequent index change.
    pub fn subscribe(&self) -> Receiver<RegistryChange> {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.inner.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }
}

impl Drop for AssetRegistry {
    fn drop(&mut self) {
        // stop the pump before the index goes away
        if let Ok(mut pump) = self.pump.lock() {
            pump.take();
        }
    }
}
