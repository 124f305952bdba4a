//! File system scanner for sheet directories.
//!
//! Walks a sheet's source directory in byte-wise sorted order at every
//! level, pruning excluded and scratch directories, and reports the sprite
//! PNGs and tile-entry JSON fragments it finds in traversal order.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::{ComposeError, Result};

/// Marker file that removes its directory from traversal.
pub const SCRATCH_MARKER: &str = ".scratch";

/// A file discovered in a sheet directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetFile {
    /// A sprite image (`.png`).
    Sprite(PathBuf),
    /// A tile-entry fragment (`.json`).
    Fragment(PathBuf),
}

impl SheetFile {
    pub fn path(&self) -> &Path {
        match self {
            SheetFile::Sprite(p) | SheetFile::Fragment(p) => p,
        }
    }
}

/// Detect whether a path is a sprite or fragment from its extension.
pub fn classify(path: &Path) -> Option<SheetFile> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => Some(SheetFile::Sprite(path.to_path_buf())),
        Some("json") => Some(SheetFile::Fragment(path.to_path_buf())),
        _ => None,
    }
}

/// Scan a sheet directory.
///
/// A directory below `root` is skipped when its basename or its path
/// relative to `root` is listed in `exclude`, or when it directly contains a
/// `.scratch` file. Any unreadable entry, including a missing `root`, is a
/// fatal `TilesetUnreadable`.
pub fn scan_sheet_dir(root: &Path, exclude: &[String]) -> Result<Vec<SheetFile>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_pruned(e, root, exclude));

    for entry in walker {
        let entry = entry.map_err(|e| ComposeError::TilesetUnreadable {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            message: e.to_string(),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(file) = classify(entry.path()) {
            files.push(file);
        }
    }

    Ok(files)
}

fn is_pruned(entry: &DirEntry, root: &Path, exclude: &[String]) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }

    if entry.path().join(SCRATCH_MARKER).is_file() {
        return true;
    }

    let basename = entry.file_name().to_string_lossy();
    let relative = entry
        .path()
        .strip_prefix(root)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();

    exclude.iter().any(|ex| {
        let ex = ex.trim_matches('/');
        ex == basename || ex == relative
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn names(files: &[SheetFile], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|f| {
                f.path()
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_classify() {
        assert!(matches!(classify(Path::new("a/wall.png")), Some(SheetFile::Sprite(_))));
        assert!(matches!(classify(Path::new("a/wall.json")), Some(SheetFile::Fragment(_))));
        assert_eq!(classify(Path::new("a/readme.md")), None);
        assert_eq!(classify(Path::new("a/.scratch")), None);
    }

    #[test]
    fn test_scan_sorted_at_every_level() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b_dir")).unwrap();
        fs::create_dir_all(root.join("a_dir/inner")).unwrap();
        fs::write(root.join("z.png"), b"").unwrap();
        fs::write(root.join("c.json"), b"").unwrap();
        fs::write(root.join("b_dir/q.png"), b"").unwrap();
        fs::write(root.join("b_dir/p.png"), b"").unwrap();
        fs::write(root.join("a_dir/inner/x.png"), b"").unwrap();
        fs::write(root.join("a_dir/w.json"), b"").unwrap();

        let files = scan_sheet_dir(root, &[]).unwrap();
        assert_eq!(
            names(&files, root),
            vec![
                "a_dir/inner/x.png",
                "a_dir/w.json",
                "b_dir/p.png",
                "b_dir/q.png",
                "c.json",
                "z.png",
            ]
        );
    }

    #[test]
    fn test_scan_prunes_scratch_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::create_dir_all(root.join("wip/deeper")).unwrap();
        fs::write(root.join("keep/a.png"), b"").unwrap();
        fs::write(root.join("wip/.scratch"), b"").unwrap();
        fs::write(root.join("wip/b.png"), b"").unwrap();
        fs::write(root.join("wip/deeper/c.png"), b"").unwrap();

        let files = scan_sheet_dir(root, &[]).unwrap();
        assert_eq!(names(&files, root), vec!["keep/a.png"]);
    }

    #[test]
    fn test_scan_prunes_excluded_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("terrain/old")).unwrap();
        fs::create_dir_all(root.join("items/old")).unwrap();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::write(root.join("terrain/old/a.png"), b"").unwrap();
        fs::write(root.join("terrain/b.png"), b"").unwrap();
        fs::write(root.join("items/old/c.png"), b"").unwrap();
        fs::write(root.join("drafts/d.png"), b"").unwrap();

        let exclude = vec!["terrain/old".to_string(), "drafts".to_string()];
        let files = scan_sheet_dir(root, &exclude).unwrap();
        assert_eq!(names(&files, root), vec!["items/old/c.png", "terrain/b.png"]);
    }

    #[test]
    fn test_scan_missing_dir_is_fatal() {
        let dir = tempdir().unwrap();
        let err = scan_sheet_dir(&dir.path().join("pngs_nope_16x16"), &[]).unwrap_err();
        assert!(matches!(err, ComposeError::TilesetUnreadable { .. }));
    }
}
