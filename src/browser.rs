//! Content folder browsing.
//!
//! This module supplies the UI with the current contents of one selected
//! folder inside a project's content root:
//! - `ThumbnailCache` - the shared path-keyed icon cache, persisted to one
//!   binary file per project across sessions
//! - `ContentBrowser` - the per-view listing service with sequence-stamped
//!   background scans and debounced change reaction

mod folder;
mod thumbs;

pub use folder::{BrowserEvent, ContentBrowser};
pub use thumbs::ThumbnailCache;
