//! tilecompose - compositing tileset builder
//!
//! Assembles a directory tree of per-sprite PNGs and JSON tile entry
//! fragments into sprite sheet PNGs and a single tile configuration that
//! addresses sprites by global index.

pub mod cli;
pub mod compose;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod output;
pub mod registry;
pub mod render;
pub mod tiles;

pub use compose::{compose, compose_with, ComposeOptions, Composition, TileConfig, TilesetAssembler};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Severity};
pub use discovery::{discover, Manifest, SheetClass, SheetSpec, SourceTree, TileInfo};
pub use error::{ComposeError, Result};
pub use registry::SpriteRegistry;
pub use render::{ImageBackend, MemoryBackend, PngBackend, SheetWriter};
pub use tiles::{InputEntry, OutputEntry, SpriteRef, TileEntry, TileEntryRewriter};
