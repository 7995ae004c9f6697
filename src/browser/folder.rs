//! Per-view folder browsing with background listing scans.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::thumbs::ThumbnailCache;
use crate::debounce::{BatchControl, DelayBatcher, DEFAULT_DEBOUNCE_DELAY};
use crate::error::{canonicalize_existing_path, AssetError, Result};
use crate::header::AssetHeader;
use crate::registry::AssetRegistry;
use crate::types::{is_asset_path, ContentInfo};
use crate::watcher::{parent_is, ChangeEvent, EventPump, NotificationSource};

/// Notification delivered to browser subscribers.
#[derive(Debug, Clone)]
pub enum BrowserEvent {
    /// A fresh listing for the given folder was applied.
    ListingReady(PathBuf),
}

struct BrowserShared {
    content_root: PathBuf,
    selected: RwLock<PathBuf>,
    listing: RwLock<Vec<Arc<ContentInfo>>>,
    /// Monotonically increasing per-scan stamp; a completed scan is applied
    /// only while its stamp is still the latest one issued.
    scan_seq: AtomicU64,
    registry: Arc<AssetRegistry>,
    thumbs: Arc<ThumbnailCache>,
    subscribers: Mutex<Vec<Sender<BrowserEvent>>>,
}

impl BrowserShared {
    fn notify(&self, event: BrowserEvent) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }

    fn selected(&self) -> Option<PathBuf> {
        self.selected.read().ok().map(|selected| selected.clone())
    }
}

/// Folder listing service for one open content view.
///
/// The browser keeps the previous listing visible until a newer scan
/// completes, runs every scan on a worker thread, and reacts to debounced
/// filesystem changes scoped to the currently selected folder. Multiple
/// browsers share one [`ThumbnailCache`].
pub struct ContentBrowser {
    shared: Arc<BrowserShared>,
    _pump: EventPump,
}

impl std::fmt::Debug for ContentBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentBrowser").finish_non_exhaustive()
    }
}

impl ContentBrowser {
    /// Creates a browser over `content_root` and starts listing it.
    pub fn new(
        content_root: &Path,
        registry: Arc<AssetRegistry>,
        thumbs: Arc<ThumbnailCache>,
        source: Arc<dyn NotificationSource>,
    ) -> Result<Self> {
        Self::with_debounce_delay(content_root, registry, thumbs, source, DEFAULT_DEBOUNCE_DELAY)
    }

    pub fn with_debounce_delay(
        content_root: &Path,
        registry: Arc<AssetRegistry>,
        thumbs: Arc<ThumbnailCache>,
        source: Arc<dyn NotificationSource>,
        delay: Duration,
    ) -> Result<Self> {
        if !content_root.is_dir() {
            return Err(AssetError::InvalidInput(format!(
                "content root does not exist: {}",
                content_root.display()
            )));
        }
        let content_root = canonicalize_existing_path(content_root.to_path_buf());

        let shared = Arc::new(BrowserShared {
            selected: RwLock::new(content_root.clone()),
            content_root,
            listing: RwLock::new(Vec::new()),
            scan_seq: AtomicU64::new(0),
            registry,
            thumbs,
            subscribers: Mutex::new(Vec::new()),
        });

        let refresh_shared = shared.clone();
        let refresh = DelayBatcher::new(delay, move |_batch: Vec<()>| {
            spawn_scan(refresh_shared.clone());
            BatchControl::Disarm
        });

        let pump_shared = shared.clone();
        let pump = EventPump::start(source.subscribe(), move |event| {
            if event_touches_selected(&pump_shared, &event) {
                refresh.trigger(());
            }
        });

        spawn_scan(shared.clone());
        Ok(Self {
            shared,
            _pump: pump,
        })
    }

    /// Switches the view to `path` and starts an asynchronous re-listing.
    ///
    /// The previous listing stays visible until the new one completes; a
    /// repeated selection of the current folder is a no-op.
    pub fn set_selected_folder(&self, path: &Path) {
        {
            let Ok(mut selected) = self.shared.selected.write() else {
                return;
            };
            if selected.as_path() == path {
                return;
            }
            *selected = path.to_path_buf();
        }
        spawn_scan(self.shared.clone());
    }

    pub fn selected_folder(&self) -> PathBuf {
        self.shared.selected().unwrap_or_default()
    }

    pub fn content_root(&self) -> &Path {
        &self.shared.content_root
    }

    /// Snapshot of the most recently applied listing.
    pub fn folder_content(&self) -> Vec<Arc<ContentInfo>> {
        match self.shared.listing.read() {
            Ok(listing) => listing.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Returns a receiver observing listing completions.
    pub fn subscribe(&self) -> Receiver<BrowserEvent> {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.shared.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }
}

/// Checks whether a change event lands directly in the selected folder.
fn event_touches_selected(shared: &BrowserShared, event: &ChangeEvent) -> bool {
    let Some(selected) = shared.selected() else {
        return false;
    };
    parent_is(&event.path, &selected)
        || event
            .old_path
            .as_deref()
            .map(|old| parent_is(old, &selected))
            .unwrap_or(false)
}

/// Starts a listing worker for the currently selected folder.
fn spawn_scan(shared: Arc<BrowserShared>) {
    let seq = shared.scan_seq.fetch_add(1, Ordering::SeqCst) + 1;
    let Some(folder) = shared.selected() else {
        return;
    };
    thread::spawn(move || {
        let listing = match list_folder(&shared, &folder) {
            Ok(listing) => listing,
            Err(error) => {
                // keep the latest-known-good listing on enumeration failure
                log::warn!("folder listing failed for {}: {error}", folder.display());
                return;
            }
        };

        let Ok(mut current) = shared.listing.write() else {
            return;
        };
        if shared.scan_seq.load(Ordering::SeqCst) != seq {
            log::debug!("discarding stale folder scan for {}", folder.display());
            return;
        }
        *current = listing;
        drop(current);
        shared.notify(BrowserEvent::ListingReady(folder));
    });
}

/// Enumerates one folder: sub-directories first, then asset files with their
/// icons resolved through the shared thumbnail cache.
fn list_folder(shared: &BrowserShared, folder: &Path) -> Result<Vec<Arc<ContentInfo>>> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in std::fs::read_dir(folder)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                log::debug!("unreadable entry under {}: {error}", folder.display());
                continue;
            }
        };
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_dir() {
            dirs.push((path, metadata));
        } else if metadata.is_file() && is_asset_path(&path) {
            files.push((path, metadata));
        }
    }

    // deterministic presentation order
    dirs.sort_by(|(a, _), (b, _)| a.cmp(b));
    files.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut listing = Vec::with_capacity(dirs.len() + files.len());
    for (path, metadata) in dirs {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        listing.push(Arc::new(ContentInfo::directory(path, modified)));
    }
    for (path, metadata) in files {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let icon = match resolve_icon(shared, &path, modified) {
            Ok(icon) => icon,
            Err(error) => {
                // undecodable assets are absent from listings, not broken tiles
                log::warn!("skipping undecodable asset {}: {error}", path.display());
                continue;
            }
        };
        listing.push(Arc::new(ContentInfo::file(
            path,
            modified,
            metadata.len(),
            icon,
            None,
        )));
    }
    Ok(listing)
}

/// Resolves an asset's icon: cache hit first, then the registry's already
/// decoded record, then the header on disk; refreshes the cache on miss.
fn resolve_icon(shared: &BrowserShared, path: &Path, modified: SystemTime) -> Result<Arc<Vec<u8>>> {
    if let Some(icon) = shared.thumbs.lookup(path, modified) {
        return Ok(icon);
    }

    let icon = match shared.registry.asset_info(path) {
        Some(info) => info.icon.clone(),
        None => AssetHeader::read_from_file(path)?.icon,
    };
    let icon = Arc::new(icon);
    shared.thumbs.insert(path, modified, icon.clone());
    Ok(icon)
}
