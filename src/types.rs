//! Core data types for the asset index.
//!
//! These are the records the registry and the content browser trade in. The
//! consuming UI layer converts them to its own view models; nothing in here
//! depends on how results are presented.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// File extension identifying asset files (without the leading dot).
pub const ASSET_EXTENSION: &str = "asset";

/// File name of the persisted thumbnail cache inside the project's hidden
/// metadata folder.
pub const CONTENT_CACHE_FILE: &str = "ContentInfoCache.bin";

/// Display width of content browser icons in pixels.
pub const ICON_WIDTH: u32 = 90;

/// Asset type enumeration.
///
/// The wire value `0` is reserved for "unknown" and is rejected when a header
/// is decoded; an asset is never persisted as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Animation = 1,
    Audio = 2,
    Material = 3,
    Mesh = 4,
    Skeleton = 5,
    Texture = 6,
}

impl AssetType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Animation => "animation",
            Self::Audio => "audio",
            Self::Material => "material",
            Self::Mesh => "mesh",
            Self::Skeleton => "skeleton",
            Self::Texture => "texture",
        }
    }

    /// Decodes a raw wire value, rejecting the reserved unknown value and
    /// anything out of range.
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Animation),
            2 => Some(Self::Audio),
            3 => Some(Self::Material),
            4 => Some(Self::Mesh),
            5 => Some(Self::Skeleton),
            6 => Some(Self::Texture),
            _ => None,
        }
    }

    /// Returns the numeric value written into asset headers.
    pub fn wire_value(self) -> i32 {
        self as i32
    }
}

/// Identity record for one asset file.
///
/// Entries are replaced, never mutated in place: whenever the backing file's
/// modification time advances past `register_time`, the registry builds a
/// fresh record from the on-disk header.
#[derive(Debug, Clone)]
pub struct AssetInfo {
    pub asset_type: AssetType,
    /// Assigned once at asset creation, stable regardless of path.
    pub guid: Uuid,
    /// Opaque thumbnail bytes, possibly empty.
    pub icon: Vec<u8>,
    /// Absolute path; doubles as the registry key while the file exists.
    pub full_path: PathBuf,
    /// Path to the original imported source file, empty when none.
    pub source_path: String,
    /// When this in-memory record was (re)built. Never persisted.
    pub register_time: SystemTime,
    /// When the asset was authored or imported. Persisted in the header.
    pub import_date: DateTime<Utc>,
    /// Content hash over the encoded payload, `None` when not computed.
    pub hash: Option<Vec<u8>>,
}

/// A content browser listing entry - either a sub-folder or an asset file.
#[derive(Debug, Clone)]
pub struct ContentInfo {
    pub full_path: PathBuf,
    pub is_directory: bool,
    pub date_modified: SystemTime,
    /// File size in bytes; `None` marks a directory.
    pub size: Option<u64>,
    /// Full-size icon (empty for directories).
    pub icon: Arc<Vec<u8>>,
    /// Reduced icon; falls back to the full icon when none was produced.
    pub icon_small: Arc<Vec<u8>>,
}

impl ContentInfo {
    /// Builds a directory entry. Directories carry no thumbnail.
    pub fn directory(full_path: PathBuf, date_modified: SystemTime) -> Self {
        let empty = Arc::new(Vec::new());
        Self {
            full_path,
            is_directory: true,
            date_modified,
            size: None,
            icon: empty.clone(),
            icon_small: empty,
        }
    }

    /// Builds a file entry with its resolved icon.
    pub fn file(
        full_path: PathBuf,
        date_modified: SystemTime,
        size: u64,
        icon: Arc<Vec<u8>>,
        icon_small: Option<Arc<Vec<u8>>>,
    ) -> Self {
        let icon_small = icon_small.unwrap_or_else(|| icon.clone());
        Self {
            full_path,
            is_directory: false,
            date_modified,
            size: Some(size),
            icon,
            icon_small,
        }
    }

    /// The display name: file stem without the asset extension.
    pub fn file_name(&self) -> String {
        self.full_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Returns true if the path carries the asset file extension.
pub fn is_asset_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(ASSET_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_type_wire_round_trip() {
        for asset_type in [
            AssetType::Animation,
            AssetType::Audio,
            AssetType::Material,
            AssetType::Mesh,
            AssetType::Skeleton,
            AssetType::Texture,
        ] {
            assert_eq!(AssetType::from_wire(asset_type.wire_value()), Some(asset_type));
        }
    }

    #[test]
    fn asset_type_rejects_unknown_and_out_of_range() {
        assert_eq!(AssetType::from_wire(0), None);
        assert_eq!(AssetType::from_wire(7), None);
        assert_eq!(AssetType::from_wire(-1), None);
        assert_eq!(AssetType::from_wire(i32::MAX), None);
    }

    #[test]
    fn is_asset_path_matches_extension_only() {
        assert!(is_asset_path(Path::new("/content/rock.asset")));
        assert!(is_asset_path(Path::new("/content/rock.ASSET")));
        assert!(!is_asset_path(Path::new("/content/rock.fbx")));
        assert!(!is_asset_path(Path::new("/content/asset")));
        assert!(!is_asset_path(Path::new("/content/rock.asset.bak")));
    }

    #[test]
    fn content_info_file_name_is_the_stem() {
        let info = ContentInfo::directory(PathBuf::from("/content/props"), SystemTime::now());
        assert_eq!(info.file_name(), "props");

        let file = ContentInfo::file(
            PathBuf::from("/content/rock.asset"),
            SystemTime::now(),
            128,
            Arc::new(vec![1, 2, 3]),
            None,
        );
        assert_eq!(file.file_name(), "rock");
        assert_eq!(file.size, Some(128));
        assert_eq!(*file.icon_small, vec![1, 2, 3]);
    }
}
