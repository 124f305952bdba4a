//! Sheet rendering.
//!
//! This module joins sprites into fixed-stride sheet rasters and encodes
//! them, through an [`ImageBackend`] so the grid logic can run without PNG
//! I/O.

mod backend;
mod png;
mod sheet;

pub use backend::{DecodedSprite, EncodeOptions, ImageBackend, MemoryBackend, PngBackend};
pub use self::png::{quantize, write_indexed, write_rgba, IndexedImage, MAX_PALETTE};
pub use sheet::{SheetRange, SheetWriter, WriteOptions};
