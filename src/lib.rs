//! Asset content indexing for a project's content tree.
//!
//! This crate provides the editor-side indexing core:
//! - A binary header codec shared by every asset file
//! - Debounced coalescing of filesystem change notifications
//! - A whole-tree asset registry with path and GUID lookups
//! - Per-folder content listings with a persisted thumbnail cache

pub mod browser;
pub mod debounce;
pub mod error;
pub mod header;
pub mod registry;
pub mod types;
pub mod watcher;

mod binio;

// Re-export main types
pub use browser::{BrowserEvent, ContentBrowser, ThumbnailCache};
pub use debounce::{BatchControl, DelayBatcher, DEFAULT_DEBOUNCE_DELAY};
pub use error::{AssetError, Result};
pub use header::AssetHeader;
pub use registry::{AssetRegistry, RegistryChange};
pub use types::{
    is_asset_path, AssetInfo, AssetType, ContentInfo, ASSET_EXTENSION, CONTENT_CACHE_FILE,
    ICON_WIDTH,
};
pub use watcher::{
    ChangeEvent, ChangeKind, ChannelNotificationSource, FsNotificationSource, NotificationSource,
};
