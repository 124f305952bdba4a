use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::compose::{compose, ComposeOptions};
use crate::error::Result;
use crate::output::{Feedback, Printer};

/// compose - merge a composing tileset into sheets and a tile config
#[derive(Parser, Debug)]
#[command(name = "compose")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Composing tileset directory (holds tile_info.json and pngs_* directories)
    pub source_dir: PathBuf,

    /// Where sheets and the tile config are written (defaults to source_dir)
    pub output_dir: Option<PathBuf>,

    /// Add an entry for every sprite no tile entry references
    #[arg(long)]
    pub use_all: bool,

    /// Report filler sprites and entries shadowed by main sheets
    #[arg(long)]
    pub obsolete_fillers: bool,

    /// Write sheets as indexed (palette) PNGs
    #[arg(long)]
    pub palette: bool,

    /// Also write an indexed <sheet>.png8 next to every RGBA sheet
    #[arg(long)]
    pub palette_copies: bool,

    /// Pretty-print the tile config
    #[arg(long)]
    pub format_json: bool,

    /// Only write the tile config, no sheet PNGs
    #[arg(long)]
    pub only_json: bool,

    /// Stop at the first error
    #[arg(long)]
    pub fail_fast: bool,

    /// Minimum level of log messages (RUST_LOG overrides)
    #[arg(long, value_enum, default_value_t = LogLevel::Warning)]
    pub loglevel: LogLevel,

    /// How much progress output to print
    #[arg(long, value_enum, default_value_t = Feedback::Concise)]
    pub feedback: Feedback,
}

/// Log level names accepted by `--loglevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Default `tracing` filter directive for this level.
    pub fn directive(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl Cli {
    pub fn options(&self) -> ComposeOptions {
        ComposeOptions {
            use_all: self.use_all,
            obsolete_fillers: self.obsolete_fillers,
            palette: self.palette,
            palette_copies: self.palette_copies,
            format_json: self.format_json,
            only_json: self.only_json,
            fail_fast: self.fail_fast,
            feedback: self.feedback,
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.source_dir.clone())
    }
}

/// Run a composition and return the process exit status.
pub fn run(cli: &Cli) -> Result<u8> {
    let options = cli.options();
    let output_dir = cli.output_dir();

    let composition = compose(&cli.source_dir, &output_dir, &options)?;

    composition.print_summary(&Printer::with_feedback(options.feedback));

    Ok(composition.diagnostics.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["compose", "gfx/Tiles"]).unwrap();
        assert_eq!(cli.output_dir(), PathBuf::from("gfx/Tiles"));
        assert_eq!(cli.loglevel, LogLevel::Warning);
        assert_eq!(cli.feedback, Feedback::Concise);
        assert_eq!(cli.options(), ComposeOptions::default());
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "compose",
            "src",
            "out",
            "--use-all",
            "--obsolete-fillers",
            "--palette",
            "--palette-copies",
            "--format-json",
            "--only-json",
            "--fail-fast",
            "--loglevel",
            "INFO",
            "--feedback",
            "VERBOSE",
        ])
        .unwrap();

        assert_eq!(cli.output_dir(), PathBuf::from("out"));
        assert_eq!(cli.loglevel.directive(), "info");
        let options = cli.options();
        assert!(options.use_all && options.obsolete_fillers && options.fail_fast);
        assert!(options.palette && options.palette_copies);
        assert!(options.format_json && options.only_json);
        assert_eq!(options.feedback, Feedback::Verbose);
    }

    #[test]
    fn test_rejects_unknown_level() {
        assert!(Cli::try_parse_from(["compose", "src", "--loglevel", "DEBUG"]).is_err());
        assert!(Cli::try_parse_from(["compose", "src", "--feedback", "LOUD"]).is_err());
    }
}
