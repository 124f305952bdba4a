//! Tileset manifest (tile_info.json) parsing.
//!
//! The manifest is a JSON array. Element 0 holds tileset-wide parameters;
//! every later element is an object with a single key, the sheet file name,
//! mapping to that sheet's options.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ComposeError, Result};

/// Tileset-wide parameters from manifest element 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileInfo {
    pub width: u32,
    pub height: u32,
    pub pixelscale: f64,
    pub iso: bool,
    pub retract_dist_min: f64,
    pub retract_dist_max: f64,
}

impl Default for TileInfo {
    fn default() -> Self {
        Self {
            width: 16,
            height: 16,
            pixelscale: 1.0,
            iso: false,
            retract_dist_min: -1.0,
            retract_dist_max: 1.0,
        }
    }
}

/// Precedence class of a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SheetClass {
    Main,
    Filler,
    Fallback,
}

impl SheetClass {
    pub fn name(&self) -> &'static str {
        match self {
            SheetClass::Main => "main",
            SheetClass::Filler => "filler",
            SheetClass::Fallback => "fallback",
        }
    }
}

/// Per-sheet options as written in the manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SheetOptions {
    sprite_width: Option<u32>,
    sprite_height: Option<u32>,
    sprite_offset_x: i32,
    sprite_offset_y: i32,
    sprite_offset_x_retracted: Option<i32>,
    sprite_offset_y_retracted: Option<i32>,
    pixelscale: Option<f64>,
    sprites_across: Option<u32>,
    exclude: Vec<String>,
    filler: bool,
    fallback: bool,
}

/// A sheet declared in the manifest, with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetSpec {
    /// Output PNG file name, e.g. `tiles.png`.
    pub name: String,
    pub sprite_width: u32,
    pub sprite_height: u32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub offset_x_retracted: i32,
    pub offset_y_retracted: i32,
    pub pixelscale: f64,
    pub sprites_across: u32,
    /// Subpaths (or directory basenames) skipped during traversal.
    pub exclude: Vec<String>,
    pub class: SheetClass,
}

impl SheetSpec {
    /// Sheet file name without the `.png` suffix.
    pub fn stem(&self) -> &str {
        self.name.strip_suffix(".png").unwrap_or(&self.name)
    }

    /// Source directory name: `pngs_<stem>_<W>x<H>`.
    pub fn dir_name(&self) -> String {
        format!(
            "pngs_{}_{}x{}",
            self.stem(),
            self.sprite_width,
            self.sprite_height
        )
    }

    /// Whether the sheet uses the tileset's default geometry.
    pub fn is_standard(&self, info: &TileInfo) -> bool {
        self.sprite_width == info.width
            && self.sprite_height == info.height
            && self.offset_x == 0
            && self.offset_y == 0
            && self.offset_x_retracted == 0
            && self.offset_y_retracted == 0
            && self.pixelscale == 1.0
    }

    fn from_options(name: String, options: SheetOptions, info: &TileInfo) -> Self {
        let class = if options.fallback {
            SheetClass::Fallback
        } else if options.filler {
            SheetClass::Filler
        } else {
            SheetClass::Main
        };

        Self {
            name,
            sprite_width: options.sprite_width.unwrap_or(info.width),
            sprite_height: options.sprite_height.unwrap_or(info.height),
            offset_x: options.sprite_offset_x,
            offset_y: options.sprite_offset_y,
            offset_x_retracted: options
                .sprite_offset_x_retracted
                .unwrap_or(options.sprite_offset_x),
            offset_y_retracted: options
                .sprite_offset_y_retracted
                .unwrap_or(options.sprite_offset_y),
            pixelscale: options.pixelscale.unwrap_or(1.0),
            sprites_across: options.sprites_across.unwrap_or(16),
            exclude: options.exclude,
            class,
        }
    }
}

/// Parsed tile_info.json.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub info: TileInfo,
    /// Sheets in declaration order.
    pub sheets: Vec<SheetSpec>,
}

impl Manifest {
    /// Load the manifest from a file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ComposeError::ManifestMissing {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ComposeError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to read manifest: {}", e),
        })?;

        Self::parse(&content, path)
    }

    /// Parse manifest JSON. `path` is only used for error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let malformed = |message: String| ComposeError::ManifestMalformed {
            path: path.to_path_buf(),
            message,
            help: Some("tile_info.json must be an array: [ {tileset info}, {\"sheet.png\": {...}}, ... ]".to_string()),
        };

        let elements: Vec<Value> =
            serde_json::from_str(content).map_err(|e| malformed(e.to_string()))?;

        let mut elements = elements.into_iter();
        let info: TileInfo = match elements.next() {
            Some(first) => serde_json::from_value(first)
                .map_err(|e| malformed(format!("element 0: {}", e)))?,
            None => TileInfo::default(),
        };

        if info.width == 0 || info.height == 0 {
            return Err(malformed("tileset width and height must be positive".to_string()));
        }
        if info.pixelscale <= 0.0 {
            return Err(malformed("tileset pixelscale must be positive".to_string()));
        }

        let mut sheets = Vec::new();
        let mut seen = HashSet::new();
        for (i, element) in elements.enumerate() {
            let index = i + 1;
            let Value::Object(map) = element else {
                return Err(malformed(format!("element {} is not an object", index)));
            };
            if map.len() != 1 {
                return Err(malformed(format!(
                    "element {} must have exactly one sheet name key, found {}",
                    index,
                    map.len()
                )));
            }

            for (name, value) in map {
                let options: SheetOptions = serde_json::from_value(value)
                    .map_err(|e| malformed(format!("sheet '{}': {}", name, e)))?;
                if options.filler && options.fallback {
                    return Err(malformed(format!(
                        "sheet '{}' cannot be both filler and fallback",
                        name
                    )));
                }

                let spec = SheetSpec::from_options(name, options, &info);
                if spec.sprite_width == 0 || spec.sprite_height == 0 {
                    return Err(malformed(format!(
                        "sheet '{}' has a zero sprite size",
                        spec.name
                    )));
                }
                if spec.sprites_across == 0 {
                    return Err(malformed(format!(
                        "sheet '{}' has sprites_across = 0",
                        spec.name
                    )));
                }
                if spec.sprites_across.checked_mul(spec.sprite_width).is_none() {
                    return Err(malformed(format!(
                        "sheet '{}' is too wide: {} sprites of {} pixels per row",
                        spec.name, spec.sprites_across, spec.sprite_width
                    )));
                }
                if spec.pixelscale <= 0.0 {
                    return Err(malformed(format!(
                        "sheet '{}' pixelscale must be positive",
                        spec.name
                    )));
                }
                if !seen.insert(spec.name.clone()) {
                    return Err(malformed(format!(
                        "sheet '{}' is declared more than once",
                        spec.name
                    )));
                }
                sheets.push(spec);
            }
        }

        Ok(Self { info, sheets })
    }

    /// Sheets of one class, in declaration order.
    pub fn sheets_of(&self, class: SheetClass) -> impl Iterator<Item = &SheetSpec> {
        self.sheets.iter().filter(move |s| s.class == class)
    }

    /// The declared fallback sheet, if any (first one wins).
    pub fn fallback(&self) -> Option<&SheetSpec> {
        self.sheets_of(SheetClass::Fallback).next()
    }
}

/// Path of the manifest inside a source root.
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(super::MANIFEST_FILENAME)
}
