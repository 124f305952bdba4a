//! The assembled tile configuration and its JSON writer.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::discovery::{SheetSpec, TileInfo};
use crate::error::{ComposeError, Result};
use crate::output::to_formatted_string;
use crate::render::SheetRange;
use crate::tiles::OutputEntry;

/// Sheet name used for the fallback block when none is declared.
pub const DEFAULT_FALLBACK_FILE: &str = "fallback.png";

/// One row of the ASCII fallback table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AsciiEntry {
    pub offset: u32,
    pub bold: bool,
    pub color: &'static str,
}

const fn ascii(offset: u32, bold: bool, color: &'static str) -> AsciiEntry {
    AsciiEntry {
        offset,
        bold,
        color,
    }
}

/// The 16 glyph rows of the fallback sheet, 256 glyphs apart.
pub const FALLBACK_ASCII: [AsciiEntry; 16] = [
    ascii(0, false, "BLACK"),
    ascii(256, true, "WHITE"),
    ascii(512, false, "WHITE"),
    ascii(768, true, "BLACK"),
    ascii(1024, false, "RED"),
    ascii(1280, false, "GREEN"),
    ascii(1536, false, "BLUE"),
    ascii(1792, false, "CYAN"),
    ascii(2048, false, "MAGENTA"),
    ascii(2304, false, "YELLOW"),
    ascii(2560, true, "RED"),
    ascii(2816, true, "GREEN"),
    ascii(3072, true, "BLUE"),
    ascii(3328, true, "CYAN"),
    ascii(3584, true, "MAGENTA"),
    ascii(3840, true, "YELLOW"),
];

/// Tileset-wide header, echoed from the manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileInfoHeader {
    pub pixelscale: f64,
    pub width: u32,
    pub height: u32,
    pub iso: bool,
    pub retract_dist_min: f64,
    pub retract_dist_max: f64,
}

impl From<&TileInfo> for TileInfoHeader {
    fn from(info: &TileInfo) -> Self {
        Self {
            pixelscale: info.pixelscale,
            width: info.width,
            height: info.height,
            iso: info.iso,
            retract_dist_min: info.retract_dist_min,
            retract_dist_max: info.retract_dist_max,
        }
    }
}

/// Per-sheet geometry written only for non-standard sheets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Geometry {
    pub sprite_width: u32,
    pub sprite_height: u32,
    pub sprite_offset_x: i32,
    pub sprite_offset_y: i32,
    pub sprite_offset_x_retracted: i32,
    pub sprite_offset_y_retracted: i32,
    pub pixelscale: f64,
}

impl Geometry {
    /// Overrides for `sheet`, or `None` if it matches the tileset defaults.
    pub fn of(sheet: &SheetSpec, info: &TileInfo) -> Option<Self> {
        if sheet.is_standard(info) {
            return None;
        }
        Some(Self {
            sprite_width: sheet.sprite_width,
            sprite_height: sheet.sprite_height,
            sprite_offset_x: sheet.offset_x,
            sprite_offset_y: sheet.offset_y,
            sprite_offset_x_retracted: sheet.offset_x_retracted,
            sprite_offset_y_retracted: sheet.offset_y_retracted,
            pixelscale: sheet.pixelscale,
        })
    }
}

/// A main or filler sheet's block in `tiles-new`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetBlock {
    pub file: String,
    #[serde(rename = "//")]
    pub comment: String,
    #[serde(flatten)]
    pub geometry: Option<Geometry>,
    pub tiles: Vec<OutputEntry>,
    #[serde(skip)]
    pub range: SheetRange,
}

impl SheetBlock {
    pub fn new(sheet: &SheetSpec, info: &TileInfo, range: SheetRange) -> Self {
        Self {
            file: sheet.name.clone(),
            comment: range.annotation(),
            geometry: Geometry::of(sheet, info),
            tiles: Vec::new(),
            range,
        }
    }
}

/// The trailing ASCII fallback block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackBlock {
    pub file: String,
    pub tiles: Vec<OutputEntry>,
    pub ascii: Vec<AsciiEntry>,
    #[serde(flatten)]
    pub geometry: Option<Geometry>,
}

impl FallbackBlock {
    /// Block for the declared fallback sheet, or the default one.
    pub fn new(sheet: Option<&SheetSpec>, info: &TileInfo) -> Self {
        Self {
            file: sheet
                .map(|s| s.name.clone())
                .unwrap_or_else(|| DEFAULT_FALLBACK_FILE.to_string()),
            tiles: Vec::new(),
            ascii: FALLBACK_ASCII.to_vec(),
            geometry: sheet.and_then(|s| Geometry::of(s, info)),
        }
    }
}

/// An element of `tiles-new`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Block {
    Sheet(SheetBlock),
    Fallback(FallbackBlock),
}

/// The complete output document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileConfig {
    pub tile_info: Vec<TileInfoHeader>,
    #[serde(rename = "tiles-new")]
    pub tiles_new: Vec<Block>,
}

impl TileConfig {
    pub fn new(info: &TileInfo) -> Self {
        Self {
            tile_info: vec![TileInfoHeader::from(info)],
            tiles_new: Vec::new(),
        }
    }

    /// Sheet blocks in output order, excluding the fallback.
    pub fn sheet_blocks(&self) -> impl Iterator<Item = &SheetBlock> {
        self.tiles_new.iter().filter_map(|b| match b {
            Block::Sheet(sheet) => Some(sheet),
            Block::Fallback(_) => None,
        })
    }

    /// Render the document, pretty-printed or compact, with a trailing newline.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let value = serde_json::to_value(self).map_err(|e| ComposeError::Io {
            path: Path::new("<tile config>").to_path_buf(),
            message: format!("Failed to serialize tile config: {}", e),
        })?;

        if pretty {
            Ok(to_formatted_string(&value))
        } else {
            Ok(format!("{}\n", value))
        }
    }

    /// Write the document to `path`, creating its directory if needed.
    pub fn save(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = self.to_json(pretty)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ComposeError::Io {
                path: parent.to_path_buf(),
                message: format!("Failed to create output directory: {}", e),
            })?;
        }

        fs::write(path, json).map_err(|e| ComposeError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to write tile config: {}", e),
        })
    }
}
