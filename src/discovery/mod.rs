//! Discovery of a composing tileset's inputs.
//!
//! A composing tileset is a directory holding `tile_info.json`, a
//! `tileset.txt`, and one `pngs_<sheet>_<W>x<H>/` directory per sheet.
//!
//! # Example
//!
//! ```ignore
//! use tilecompose::discovery::discover;
//!
//! let source = discover("gfx/MyTileset", "gfx/MyTileset")?;
//! println!("{} sheets -> {}", source.manifest.sheets.len(), source.output_name);
//! ```

mod manifest;
mod scanner;
mod tileset_txt;

use std::path::{Path, PathBuf};

use crate::error::Result;

pub use manifest::{manifest_path, Manifest, SheetClass, SheetSpec, TileInfo};
pub use scanner::{classify, scan_sheet_dir, SheetFile, SCRATCH_MARKER};
pub use tileset_txt::{find_output_name, TilesetTxt, JSON_KEY};

/// The name of the manifest file.
pub const MANIFEST_FILENAME: &str = "tile_info.json";

/// The name of the key/value tileset description.
pub const TILESET_TXT_FILENAME: &str = "tileset.txt";

/// Everything read from a source tree before composition starts.
#[derive(Debug, Clone)]
pub struct SourceTree {
    /// The composing source directory.
    pub root: PathBuf,
    /// Where sheets and the JSON config are written.
    pub output_dir: PathBuf,
    /// The parsed manifest.
    pub manifest: Manifest,
    /// File name of the output JSON, from tileset.txt.
    pub output_name: String,
}

impl SourceTree {
    /// Source directory of a sheet.
    pub fn sheet_dir(&self, sheet: &SheetSpec) -> PathBuf {
        self.root.join(sheet.dir_name())
    }

    /// Full path of the output JSON.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_name)
    }
}

/// Load the manifest and output name of a composing tileset.
///
/// `tileset.txt` is looked up in the source root first, then the output root.
pub fn discover(root: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Result<SourceTree> {
    let root = root.as_ref().to_path_buf();
    let output_dir = output_dir.as_ref().to_path_buf();

    let manifest = Manifest::load(&manifest_path(&root))?;
    let output_name = find_output_name(&[&root, &output_dir])?;

    Ok(SourceTree {
        root,
        output_dir,
        manifest,
        output_name,
    })
}
