//! Finding candidate video assets on disk.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{IngestError, Result};

/// Extensions picked up by [`discover_assets`], compared case-insensitively.
pub const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "mov"];

/// `true` if `path` has one of the [`VIDEO_EXTENSIONS`].
pub fn is_video_asset(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| VIDEO_EXTENSIONS.iter().any(|v| ext.eq_ignore_ascii_case(v)))
}

/// Recursively collect video files under `root`.
///
/// Entries are visited in file-name order within each directory, so repeated
/// runs over the same tree submit assets in the same order. Symlinks are
/// followed, both to files and to directories.
pub fn discover_assets(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(IngestError::Config(format!(
            "asset path {} is not a directory",
            root.display()
        )));
    }

    let mut assets = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_video_asset(entry.path()) {
            assets.push(entry.into_path());
        }
    }

    debug!(root = %root.display(), count = assets.len(), "discovered assets");
    Ok(assets)
}
