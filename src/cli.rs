// Command-line front end for oxibsdiff.
//
// `oxibsdiff OLD NEW PATCH` keeps the classic bsdiff surface and writes a
// BSDIFF40 patch. Subcommands expose the rest: `diff` with format/backend
// selection, `patch` to apply, and `info` to inspect a patch.

use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::compress::CompressorType;
use crate::diff::DiffOptions;
use crate::format::PatchFormat;
use crate::io::{self, DiffStats, PatchStats};
use crate::reader::BsdiffPatchReader;
use crate::writer::{MAX_BROTLI_QUALITY, WriterOptions};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// bsdiff-compatible binary diff and patch tool.
#[derive(Parser, Debug)]
#[command(
    name = "oxibsdiff",
    version,
    about = "Binary diff/patch in the bsdiff format",
    arg_required_else_help = true,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Cmd>,

    /// Old file (classic form: OLD NEW PATCH).
    #[arg(value_hint = ValueHint::FilePath, requires_all = ["new", "patch"])]
    old: Option<PathBuf>,

    /// New file (classic form).
    #[arg(value_hint = ValueHint::FilePath)]
    new: Option<PathBuf>,

    /// Patch file to create (classic form).
    #[arg(value_hint = ValueHint::FilePath)]
    patch: Option<PathBuf>,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a patch from OLD to NEW.
    Diff(DiffArgs),
    /// Apply PATCH to OLD, writing NEW.
    Patch(PatchArgs),
    /// Print the header (and optionally the control entries) of a patch.
    Info(InfoArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// BSDIFF40, bzip2 streams only.
    Legacy,
    /// BSDF2, backend recorded in the header.
    Bsdf2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TypeArg {
    Bz2,
    Brotli,
    Lzma,
    Zlib,
    None,
}

impl From<TypeArg> for CompressorType {
    fn from(arg: TypeArg) -> Self {
        match arg {
            TypeArg::Bz2 => CompressorType::Bz2,
            TypeArg::Brotli => CompressorType::Brotli,
            TypeArg::Lzma => CompressorType::Lzma,
            TypeArg::Zlib => CompressorType::Zlib,
            TypeArg::None => CompressorType::None,
        }
    }
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Patch format (default: legacy, or bsdf2 when --type is not bz2).
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Stream compressor.
    #[arg(long = "type", value_enum)]
    compressor: Option<TypeArg>,

    /// Brotli quality, 0..=11 (default 11). Requires --type brotli.
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=MAX_BROTLI_QUALITY as i64))]
    quality: Option<u32>,

    /// Minimum length of a match that replaces the current alignment.
    #[arg(long = "min-length", default_value_t = 0)]
    min_length: usize,

    /// Old file.
    #[arg(value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// New file.
    #[arg(value_hint = ValueHint::FilePath)]
    new: PathBuf,

    /// Patch file to create.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,
}

#[derive(Args, Debug)]
struct PatchArgs {
    /// Old file.
    #[arg(value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// New file to create.
    #[arg(value_hint = ValueHint::FilePath)]
    new: PathBuf,

    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Also list every control entry.
    #[arg(long)]
    entries: bool,
}

// ---------------------------------------------------------------------------
// Resolved options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Diff {
        old: PathBuf,
        new: PathBuf,
        patch: PathBuf,
        writer: WriterOptions,
        diff: DiffOptions,
    },
    Patch {
        old: PathBuf,
        new: PathBuf,
        patch: PathBuf,
    },
    Info {
        patch: PathBuf,
        entries: bool,
    },
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
}

fn writer_options(
    format: Option<FormatArg>,
    compressor: Option<TypeArg>,
    quality: Option<u32>,
) -> Result<WriterOptions, String> {
    let compressor = compressor.map(CompressorType::from).unwrap_or_default();
    if quality.is_some() && compressor != CompressorType::Brotli {
        return Err(format!("--quality only applies to brotli, not {compressor}"));
    }
    let format = match format {
        Some(FormatArg::Legacy) => PatchFormat::Legacy,
        Some(FormatArg::Bsdf2) => PatchFormat::Bsdf2,
        None if compressor == CompressorType::Bz2 => PatchFormat::Legacy,
        None => PatchFormat::Bsdf2,
    };
    Ok(WriterOptions {
        format,
        compressor,
        brotli_quality: quality,
    })
}

fn resolve_options(cli: Cli) -> Result<Options, String> {
    let command = match cli.command {
        Some(Cmd::Diff(args)) => Command::Diff {
            writer: writer_options(args.format, args.compressor, args.quality)?,
            diff: DiffOptions::with_min_length(args.min_length),
            old: args.old,
            new: args.new,
            patch: args.patch,
        },
        Some(Cmd::Patch(args)) => Command::Patch {
            old: args.old,
            new: args.new,
            patch: args.patch,
        },
        Some(Cmd::Info(args)) => Command::Info {
            patch: args.patch,
            entries: args.entries,
        },
        None => match (cli.old, cli.new, cli.patch) {
            (Some(old), Some(new), Some(patch)) => Command::Diff {
                old,
                new,
                patch,
                writer: WriterOptions::default(),
                diff: DiffOptions::default(),
            },
            _ => return Err("usage: oxibsdiff OLD NEW PATCH".to_string()),
        },
    };

    Ok(Options {
        command,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
    })
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oxibsdiff".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn hex(digest: &[u8; 32]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Refuse to clobber `path` unless `-f` was given.
fn check_output(path: &Path, force: bool) -> Result<(), String> {
    if path.exists() && !force {
        return Err(format!(
            "output file exists, use -f to overwrite: {}",
            path.display()
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Diff command
// ---------------------------------------------------------------------------

fn cmd_diff(
    opts: &Options,
    old: &Path,
    new: &Path,
    patch: &Path,
    writer: &WriterOptions,
    diff: &DiffOptions,
) -> Result<(), String> {
    check_output(patch, opts.force)?;
    writer.validate().map_err(|e| e.to_string())?;

    let stats: DiffStats = io::diff_file(old, new, patch, writer, diff)
        .map_err(|e| format!("{} -> {}: {e}", old.display(), new.display()))?;

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oxibsdiff: diff: old size: {}, new size: {}, patch size: {}, entries: {}",
            stats.old_size, stats.new_size, stats.patch_size, stats.control_entries
        );
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "diff",
            "format": writer.format.to_string(),
            "compressor": writer.compressor.name(),
            "old_size": stats.old_size,
            "new_size": stats.new_size,
            "patch_size": stats.patch_size,
            "control_entries": stats.control_entries,
            "new_sha256": stats.new_sha256.as_ref().map(hex),
        });
        eprintln!("{json:#}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Patch command
// ---------------------------------------------------------------------------

fn cmd_patch(opts: &Options, old: &Path, new: &Path, patch: &Path) -> Result<(), String> {
    check_output(new, opts.force)?;

    let stats: PatchStats = io::patch_file(old, patch, new)
        .map_err(|e| format!("{}: {e}", patch.display()))?;

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oxibsdiff: patch: old size: {}, patch size: {}, new size: {}",
            stats.old_size, stats.patch_size, stats.new_size
        );
    }

    if opts.json_output {
        let json = serde_json::json!({
            "command": "patch",
            "old_size": stats.old_size,
            "patch_size": stats.patch_size,
            "new_size": stats.new_size,
            "new_sha256": stats.new_sha256.as_ref().map(hex),
        });
        eprintln!("{json:#}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Info command
// ---------------------------------------------------------------------------

fn cmd_info(opts: &Options, patch: &Path, list_entries: bool) -> Result<(), String> {
    let data =
        std::fs::read(patch).map_err(|e| format!("patch file: {}: {e}", patch.display()))?;
    let mut reader =
        BsdiffPatchReader::new(&data).map_err(|e| format!("{}: {e}", patch.display()))?;
    let header = *reader.header();

    let mut entries = Vec::new();
    if list_entries {
        let mut covered = 0u64;
        while covered < header.new_size {
            let entry = reader
                .parse_control_entry()
                .map_err(|e| format!("{}: entry {}: {e}", patch.display(), entries.len()))?;
            covered = covered.saturating_add(entry.diff_size.saturating_add(entry.extra_size));
            entries.push(entry);
        }
    }

    let [ctrl_type, diff_type, extra_type] = header.compressors;
    if opts.json_output {
        let json = serde_json::json!({
            "command": "info",
            "format": header.format.to_string(),
            "compressors": [ctrl_type.name(), diff_type.name(), extra_type.name()],
            "patch_size": data.len(),
            "ctrl_len": header.ctrl_len,
            "diff_len": header.diff_len,
            "new_size": header.new_size,
            "entries": entries
                .iter()
                .map(|e| serde_json::json!([e.diff_size, e.extra_size, e.offset_increment]))
                .collect::<Vec<_>>(),
        });
        eprintln!("{json:#}");
    }

    if opts.quiet {
        return Ok(());
    }
    println!("format:            {}", header.format);
    println!("compressors:       {ctrl_type}, {diff_type}, {extra_type}");
    println!("patch size:        {}", data.len());
    println!("control length:    {}", header.ctrl_len);
    println!("diff length:       {}", header.diff_len);
    println!("extra length:      {}", header.stream_ranges(data.len())[2].len());
    println!("new size:          {}", header.new_size);
    for (i, e) in entries.iter().enumerate() {
        println!(
            "entry {i:>6}: diff {:>10}  extra {:>10}  offset {:>+11}",
            e.diff_size, e.extra_size, e.offset_increment
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let opts = match resolve_options(cli) {
        Ok(opts) => opts,
        Err(msg) => {
            eprintln!("oxibsdiff: {msg}");
            process::exit(1);
        }
    };

    let result = match &opts.command {
        Command::Diff {
            old,
            new,
            patch,
            writer,
            diff,
        } => cmd_diff(&opts, old, new, patch, writer, diff),
        Command::Patch { old, new, patch } => cmd_patch(&opts, old, new, patch),
        Command::Info { patch, entries } => cmd_info(&opts, patch, *entries),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(msg) => {
            eprintln!("oxibsdiff: {msg}");
            process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
