//! Tileset composition.
//!
//! The [`TilesetAssembler`] owns every piece of cross-sheet state (sprite
//! registry, processed ids, diagnostics) and drives the build:
//!
//! 1. read and write every main sheet, then every filler sheet, in manifest
//!    order, allocating indices as it goes
//! 2. rewrite the main sheets' entries, then settle unreferenced main sprites
//! 3. rewrite the filler sheets' entries, then settle unreferenced filler sprites
//! 4. append the fallback block
//!
//! # Example
//!
//! ```ignore
//! use tilecompose::compose::{compose, ComposeOptions};
//!
//! let result = compose("gfx/MyTileset", "gfx/MyTileset", &ComposeOptions::default())?;
//! std::process::exit(result.diagnostics.exit_code().into());
//! ```

mod config;
mod reader;

use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, Severity};
use crate::discovery::{discover, SheetClass, SheetSpec, SourceTree};
use crate::error::{ComposeError, Result};
use crate::output::{display_path, plural, Feedback, Printer};
use crate::registry::SpriteRegistry;
use crate::render::{ImageBackend, PngBackend, SheetWriter, WriteOptions};
use crate::tiles::{InputEntry, ProcessedIds, SpriteRef, TileEntry, TileEntryRewriter};

pub use config::{
    AsciiEntry, Block, FallbackBlock, Geometry, SheetBlock, TileConfig, TileInfoHeader,
    DEFAULT_FALLBACK_FILE, FALLBACK_ASCII,
};
pub use reader::{SheetContents, SheetReader};

/// Run flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Emit an entry for every sprite no fragment references.
    pub use_all: bool,
    /// Report shadowed filler sprites and ids.
    pub obsolete_fillers: bool,
    /// Write sheets as indexed PNGs.
    pub palette: bool,
    /// Write indexed `<sheet>8` copies next to RGBA sheets.
    pub palette_copies: bool,
    /// Pretty-print the output JSON.
    pub format_json: bool,
    /// Skip writing sheet PNGs.
    pub only_json: bool,
    /// Stop at the first error.
    pub fail_fast: bool,
    pub feedback: Feedback,
}

impl ComposeOptions {
    fn write_options(&self) -> WriteOptions {
        WriteOptions {
            only_json: self.only_json,
            palette: self.palette,
            palette_copies: self.palette_copies,
        }
    }
}

/// The outcome of a composition run.
#[derive(Debug)]
pub struct Composition {
    pub config: TileConfig,
    pub diagnostics: DiagnosticSink,
    /// Where the tile config is (or would be) saved.
    pub output: PathBuf,
    /// Sheet PNGs written, in write order.
    pub sheets_written: Vec<PathBuf>,
    /// Number of registered sprites.
    pub sprite_count: usize,
}

/// A read sheet waiting for its entries to be rewritten.
///
/// `block` is `None` for a sheet without sprites: its entries are still
/// rewritten so their references and ids count, but nothing is emitted.
struct PendingSheet<'m> {
    spec: &'m SheetSpec,
    block: Option<SheetBlock>,
    entries: Vec<InputEntry>,
}

/// Orchestrates one composition run.
pub struct TilesetAssembler<'a> {
    source: &'a SourceTree,
    options: ComposeOptions,
    backend: &'a dyn ImageBackend,
    printer: Printer,
    registry: SpriteRegistry,
    processed: ProcessedIds,
    sink: DiagnosticSink,
    null_pending: bool,
    sheets_written: Vec<PathBuf>,
}

impl<'a> TilesetAssembler<'a> {
    pub fn new(
        source: &'a SourceTree,
        options: ComposeOptions,
        backend: &'a dyn ImageBackend,
    ) -> Self {
        let sink = if options.fail_fast {
            DiagnosticSink::fail_fast()
        } else {
            DiagnosticSink::new()
        };

        Self {
            source,
            options,
            backend,
            printer: Printer::with_feedback(options.feedback),
            registry: SpriteRegistry::new(),
            processed: ProcessedIds::new(),
            sink,
            null_pending: true,
            sheets_written: Vec::new(),
        }
    }

    /// Build the tile configuration, writing sheet PNGs along the way.
    ///
    /// The configuration itself is not saved; see [`Composition`] and
    /// [`TileConfig::save`].
    pub fn run(mut self) -> Result<Composition> {
        if !self.options.only_json {
            fs::create_dir_all(&self.source.output_dir).map_err(|e| ComposeError::Io {
                path: self.source.output_dir.clone(),
                message: format!("Failed to create output directory: {}", e),
            })?;
        }

        let source = self.source;
        let manifest = &source.manifest;
        let mut main = Vec::new();
        for sheet in manifest.sheets_of(SheetClass::Main) {
            main.push(self.process_sheet(sheet)?);
        }
        let mut filler = Vec::new();
        for sheet in manifest.sheets_of(SheetClass::Filler) {
            filler.push(self.process_sheet(sheet)?);
        }

        let mut blocks = Vec::with_capacity(main.len() + filler.len());
        for pending in main {
            blocks.extend(self.rewrite_sheet(pending)?);
        }
        self.settle_unreferenced(SheetClass::Main, &mut blocks)?;

        let main_blocks = blocks.len();
        for pending in filler {
            blocks.extend(self.rewrite_sheet(pending)?);
        }
        self.settle_unreferenced(SheetClass::Filler, &mut blocks[main_blocks..])?;

        let mut config = TileConfig::new(&manifest.info);
        config.tiles_new.extend(blocks.into_iter().map(Block::Sheet));
        config.tiles_new.push(Block::Fallback(FallbackBlock::new(
            manifest.fallback(),
            &manifest.info,
        )));

        Ok(Composition {
            config,
            output: source.output_path(),
            sprite_count: self.registry.count(),
            diagnostics: self.sink,
            sheets_written: self.sheets_written,
        })
    }

    /// Read a sheet directory and write its PNG, if it has sprites.
    fn process_sheet<'m>(&mut self, sheet: &'m SheetSpec) -> Result<PendingSheet<'m>> {
        self.printer.status(
            "Composing",
            &format!(
                "{} ({}x{})",
                sheet.name, sheet.sprite_width, sheet.sprite_height
            ),
        );

        let reader = SheetReader::new(self.backend, self.printer)
            .report_obsolete(self.options.obsolete_fillers);
        let dir = self.source.sheet_dir(sheet);
        let contents = reader.read(sheet, &dir, &mut self.registry, &mut self.sink)?;

        let mut writer = SheetWriter::new(sheet, contents.first_index);
        if self.null_pending {
            writer = writer.with_null_sprite();
        }
        for sprite in contents.sprites {
            writer.push(sprite);
        }

        let Some(range) = writer.range() else {
            return Ok(PendingSheet {
                spec: sheet,
                block: None,
                entries: contents.entries,
            });
        };

        for path in writer.write(self.backend, &self.source.output_dir, &self.options.write_options())? {
            self.printer.status("Writing", &display_path(&path));
            self.sheets_written.push(path);
        }

        self.registry.reserve_through(range.max_index);
        self.null_pending = false;
        tracing::debug!(sheet = %sheet.name, range = %range.annotation(), "allocated");

        Ok(PendingSheet {
            spec: sheet,
            block: Some(SheetBlock::new(sheet, &self.source.manifest.info, range)),
            entries: contents.entries,
        })
    }

    /// Rewrite a sheet's entries into its block. `None` for an empty sheet.
    fn rewrite_sheet(&mut self, pending: PendingSheet<'_>) -> Result<Option<SheetBlock>> {
        let PendingSheet {
            spec,
            block,
            entries,
        } = pending;

        let mut rewriter = TileEntryRewriter::new(
            &mut self.registry,
            &mut self.processed,
            &mut self.sink,
            spec.class,
            &spec.name,
        )
        .report_obsolete(self.options.obsolete_fillers);

        let mut tiles = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(entry) = rewriter.rewrite(entry)? {
                tiles.push(entry);
            }
        }

        if let Some(mut block) = block {
            block.tiles = tiles;
            return Ok(Some(block));
        }

        // Entries that would have been emitted are lost with the sheet.
        let severity = if tiles.is_empty() {
            Severity::Info
        } else {
            Severity::Warning
        };
        self.sink.report(
            Diagnostic::new(
                DiagnosticKind::EmptySheet,
                format!(
                    "{} has no sprites; skipping it and dropping {}",
                    spec.name,
                    plural(tiles.len(), "tile entry", "tile entries")
                ),
            )
            .with_severity(severity)
            .with_help("Entries referencing sprites of other sheets belong in those sheets' directories"),
        )?;
        Ok(None)
    }

    /// Apply the unreferenced-sprite policy to one class.
    fn settle_unreferenced(&mut self, class: SheetClass, blocks: &mut [SheetBlock]) -> Result<()> {
        for (index, name) in self.registry.unreferenced(class) {
            if !self.options.use_all {
                let severity = if self.processed.contains(&name) {
                    Severity::Info
                } else {
                    Severity::Warning
                };
                self.sink.report(
                    Diagnostic::new(
                        DiagnosticKind::UnreferencedSprite,
                        format!(
                            "sprite '{}' (index {}) was not used in any {} tile entry",
                            name,
                            index,
                            class.name()
                        ),
                    )
                    .with_severity(severity),
                )?;
                continue;
            }

            let Some(block) = blocks.iter_mut().find(|b| b.range.contains(index)) else {
                tracing::debug!(name = %name, index, "no sheet block holds this index");
                continue;
            };

            let implicit: InputEntry = TileEntry::new(name.as_str()).with_fg(SpriteRef::Index(index));
            let file = block.file.clone();
            let mut rewriter = TileEntryRewriter::new(
                &mut self.registry,
                &mut self.processed,
                &mut self.sink,
                class,
                &file,
            )
            .report_obsolete(self.options.obsolete_fillers);

            if let Some(entry) = rewriter.rewrite(implicit)? {
                block.tiles.push(entry);
            }
        }

        Ok(())
    }
}

impl Composition {
    /// Print the closing summary line.
    pub fn print_summary(&self, printer: &Printer) {
        let output = self.output.as_path();
        let errors = self.diagnostics.error_count();
        let warnings = self.diagnostics.warning_count();
        let sheets = self.config.sheet_blocks().count();

        if errors > 0 {
            printer.error(
                "Failed",
                &format!(
                    "{}: {} error(s), {} warning(s)",
                    display_path(output),
                    errors,
                    warnings
                ),
            );
        } else {
            let mut message = format!(
                "{} ({}, {})",
                display_path(output),
                plural(sheets, "sheet", "sheets"),
                plural(self.sprite_count, "sprite", "sprites")
            );
            if warnings > 0 {
                message.push_str(&printer.dim(&format!(" {} warning(s)", warnings)));
            }
            printer.success("Finished", &message);
        }
    }
}

/// Compose the tileset at `source_dir` into `output_dir` with PNG I/O.
pub fn compose(
    source_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &ComposeOptions,
) -> Result<Composition> {
    compose_with(source_dir, output_dir, options, &PngBackend::new())
}

/// Like [`compose`] with an explicit image backend.
pub fn compose_with(
    source_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    options: &ComposeOptions,
    backend: &dyn ImageBackend,
) -> Result<Composition> {
    let source = discover(source_dir, output_dir)?;
    let composition = TilesetAssembler::new(&source, *options, backend).run()?;

    composition
        .config
        .save(&composition.output, options.format_json)?;
    Printer::with_feedback(options.feedback).status("Writing", &display_path(&composition.output));

    Ok(composition)
}
