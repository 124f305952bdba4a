use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Fatal errors for tileset composition.
///
/// Recoverable problems (missing sprites, duplicate ids, ...) never show up
/// here; they are reported through [`crate::diagnostics::DiagnosticSink`].
#[derive(Error, Diagnostic, Debug)]
pub enum ComposeError {
    #[error("Cannot read tileset directory {path}: {message}")]
    #[diagnostic(code(compose::tileset_unreadable))]
    TilesetUnreadable { path: PathBuf, message: String },

    #[error("Manifest not found: {path}")]
    #[diagnostic(
        code(compose::manifest_missing),
        help("A composing tileset needs a tile_info.json at its root")
    )]
    ManifestMissing { path: PathBuf },

    #[error("Invalid manifest {path}: {message}")]
    #[diagnostic(code(compose::manifest_malformed))]
    ManifestMalformed {
        path: PathBuf,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("No output JSON name configured (searched {searched})")]
    #[diagnostic(
        code(compose::missing_output_name),
        help("Add a line like `JSON: tile_config.json` to tileset.txt")
    )]
    MissingOutputName { searched: String },

    #[error("Failed to decode image {path}: {message}")]
    #[diagnostic(code(compose::image_decode))]
    ImageDecodeFailed { path: PathBuf, message: String },

    #[error("Failed to encode image {path}: {message}")]
    #[diagnostic(code(compose::image_encode))]
    ImageEncodeFailed { path: PathBuf, message: String },

    #[error("Failed to parse tile entries in {path}: {message}")]
    #[diagnostic(code(compose::fragment_parse))]
    FragmentParseFailed { path: PathBuf, message: String },

    #[error("IO error with {path}: {message}")]
    #[diagnostic(code(compose::io))]
    Io { path: PathBuf, message: String },

    #[error("Aborted on first error ({code}): {context}")]
    #[diagnostic(code(compose::aborted), help("Run without --fail-fast to collect every error"))]
    Aborted { code: &'static str, context: String },
}

pub type Result<T> = std::result::Result<T, ComposeError>;
