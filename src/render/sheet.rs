//! Sheet composition.
//!
//! Sprites are laid out in a fixed-stride grid: `sprites_across` cells per
//! row, row-major, each cell exactly one sprite in size. The last row is
//! padded with transparent cells, and those cells still consume indices so
//! that a global index always maps to one (sheet, row, column).

use std::path::{Path, PathBuf};

use image::imageops::{crop_imm, replace};
use image::RgbaImage;

use crate::discovery::SheetSpec;
use crate::error::{ComposeError, Result};

use super::backend::{EncodeOptions, ImageBackend};

/// The global index range a sheet block occupies, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetRange {
    pub first_index: u64,
    pub max_index: u64,
}

impl SheetRange {
    pub fn contains(&self, index: u64) -> bool {
        (self.first_index..=self.max_index).contains(&index)
    }

    /// The `//` annotation written into the sheet block.
    pub fn annotation(&self) -> String {
        format!("range {} to {}", self.first_index, self.max_index)
    }
}

/// Which files a sheet is written to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Skip PNG output entirely.
    pub only_json: bool,
    /// Write the primary sheet as an indexed PNG.
    pub palette: bool,
    /// Also write an indexed `<sheet>8` copy next to an RGBA sheet.
    pub palette_copies: bool,
}

/// Collects one sheet's sprites and writes the grid image.
#[derive(Debug)]
pub struct SheetWriter<'a> {
    spec: &'a SheetSpec,
    first_index: u64,
    null_sprite: bool,
    sprites: Vec<RgbaImage>,
}

impl<'a> SheetWriter<'a> {
    /// Start a sheet whose first sprite gets `first_index`.
    pub fn new(spec: &'a SheetSpec, first_index: u64) -> Self {
        Self {
            spec,
            first_index,
            null_sprite: false,
            sprites: Vec::new(),
        }
    }

    /// Put the null sprite in cell 0, ahead of every registered sprite.
    pub fn with_null_sprite(mut self) -> Self {
        self.null_sprite = true;
        self
    }

    /// Append the next sprite, in registration order.
    pub fn push(&mut self, sprite: RgbaImage) {
        self.sprites.push(sprite);
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }

    /// Grid cells including the null sprite and row padding.
    pub fn cell_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        let across = self.spec.sprites_across.max(1) as usize;
        let used = self.sprites.len() + usize::from(self.null_sprite);
        used.div_ceil(across) * across
    }

    /// The index range of this sheet, or `None` when it has no sprites.
    pub fn range(&self) -> Option<SheetRange> {
        if self.is_empty() {
            return None;
        }
        Some(SheetRange {
            first_index: self.first_index,
            max_index: self.first_index - 1 + self.cell_count() as u64,
        })
    }

    /// Pixel size of the sheet raster, `None` if it does not fit in `u32`.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let across = self.spec.sprites_across.max(1);
        let rows = u32::try_from(self.cell_count() / across as usize).ok()?;
        Some((
            across.checked_mul(self.spec.sprite_width)?,
            rows.checked_mul(self.spec.sprite_height)?,
        ))
    }

    /// Join the sprites into the sheet raster. `Ok(None)` for an empty sheet.
    ///
    /// A sprite whose size differs from the sheet's is drawn clipped to
    /// its cell.
    pub fn compose(&self) -> Result<Option<RgbaImage>> {
        if self.is_empty() {
            return Ok(None);
        }

        let (w, h) = (self.spec.sprite_width, self.spec.sprite_height);
        let across = self.spec.sprites_across.max(1);
        let (width, height) = self.dimensions().ok_or_else(|| ComposeError::ImageEncodeFailed {
            path: PathBuf::from(&self.spec.name),
            message: format!(
                "{} cells of {}x{} pixels, {} across, exceed the maximum image size",
                self.cell_count(),
                w,
                h,
                across
            ),
        })?;
        let mut sheet = RgbaImage::new(width, height);

        let offset = usize::from(self.null_sprite);
        for (i, sprite) in self.sprites.iter().enumerate() {
            let cell = (i + offset) as u32;
            let x = (cell % across) * w;
            let y = (cell / across) * h;
            let clipped = crop_imm(sprite, 0, 0, w.min(sprite.width()), h.min(sprite.height()));
            replace(&mut sheet, &clipped.to_image(), x as i64, y as i64);
        }

        Ok(Some(sheet))
    }

    /// Compose and encode the sheet into `output_dir`.
    ///
    /// Returns the files written; nothing is written for an empty sheet or
    /// when only the JSON is wanted.
    pub fn write(
        &self,
        backend: &dyn ImageBackend,
        output_dir: &Path,
        options: &WriteOptions,
    ) -> Result<Vec<PathBuf>> {
        if options.only_json {
            return Ok(Vec::new());
        }
        let Some(sheet) = self.compose()? else {
            return Ok(Vec::new());
        };

        let mut written = Vec::new();
        let primary = output_dir.join(&self.spec.name);
        let primary_options = if options.palette {
            EncodeOptions::indexed()
        } else {
            EncodeOptions::rgba()
        };
        backend.encode(&sheet, &primary, &primary_options)?;
        written.push(primary);

        if options.palette_copies && !options.palette {
            let copy = output_dir.join(format!("{}8", self.spec.name));
            backend.encode(&sheet, &copy, &EncodeOptions::indexed())?;
            written.push(copy);
        }

        Ok(written)
    }
}
