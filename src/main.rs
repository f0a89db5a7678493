use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use region_patcher::config::{discover, PatcherConfig, CONFIG_ENV_VAR};
use region_patcher::{
    extract_text, patch_text, scan, text_hash, Image, MarkerSpan, OpenMode, PatchOptions,
    PatchResult, Verification, WriteMode,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "region-patcher")]
#[command(
    about = "Print or replace the marker-delimited text region of a binary image",
    long_about = None
)]
#[command(version)]
#[command(after_help = "Examples:\n  \
    region-patcher v4_5_0.krn\n  \
    region-patcher v4_5_0.krn 'root=/dev/sda1 video=gcnfb:tv=auto rootwait loglevel=4'")]
struct Cli {
    /// Image file to read or patch
    image: PathBuf,

    /// Replacement text; omit to print the current text
    new_text: Option<String>,

    /// Config file (defaults to $REGION_PATCHER_CONFIG, then ./region-patcher.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the start marker
    #[arg(long, value_name = "MARKER")]
    start_marker: Option<String>,

    /// Override the end marker
    #[arg(long, value_name = "MARKER")]
    end_marker: Option<String>,

    /// Overwrite the file in place instead of replacing it atomically
    #[arg(long)]
    in_place: bool,

    /// Keep the image's modification time
    #[arg(long)]
    preserve_mtime: bool,

    /// Dry run - show what would be changed without modifying the file
    #[arg(short = 'n', long, requires = "new_text")]
    dry_run: bool,

    /// Show a character diff of the old and new text
    #[arg(short, long, requires = "new_text")]
    diff: bool,

    /// Refuse to patch unless the current text is exactly this
    #[arg(long, value_name = "TEXT", requires = "new_text", conflicts_with = "expect_hash")]
    expect: Option<String>,

    /// Refuse to patch unless the current text has this xxh3 hash (hex)
    #[arg(long, value_name = "HEX", requires = "new_text")]
    expect_hash: Option<String>,

    /// Only print the region text and errors
    #[arg(short, long)]
    quiet: bool,
}

/// Status lines go to stdout unless `--quiet` is given.
struct Status {
    quiet: bool,
}

impl Status {
    fn line(&self, message: impl Display) {
        if !self.quiet {
            println!("{}", message);
        }
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version are not errors
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("{} {:#}", "ERROR:".red().bold(), err);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let status = Status { quiet: cli.quiet };
    let config = resolve_config(&cli, &status)?;

    match cli.new_text.as_deref() {
        None => cmd_print(&cli.image, &config, &status),
        Some(new_text) => cmd_replace(&cli, new_text, &config, &status),
    }
}

/// Resolve configuration using multiple sources
///
/// Priority order:
/// 1. Explicit --config flag
/// 2. REGION_PATCHER_CONFIG environment variable
/// 3. region-patcher.toml in the current directory
/// 4. Built-in defaults
///
/// Marker and write flags on the command line override whatever was loaded.
fn resolve_config(cli: &Cli, status: &Status) -> Result<PatcherConfig> {
    let env_value = env::var(CONFIG_ENV_VAR).ok();
    let cwd = env::current_dir().context("cannot determine current directory")?;
    let (source, stale_env) = discover(cli.config.as_deref(), env_value.as_deref(), &cwd);

    if let Some(path) = stale_env {
        status.line(
            format!(
                "Warning: {CONFIG_ENV_VAR} is set but path doesn't exist: {}",
                path.display()
            )
            .yellow(),
        );
    }
    if let Some(path) = source.path() {
        status.line(format!("Using config {}", path.display()).dimmed());
    }

    let mut config = source.load()?;

    if let Some(start) = &cli.start_marker {
        config.markers.start = start.clone();
    }
    if let Some(end) = &cli.end_marker {
        config.markers.end = end.clone();
    }
    if cli.in_place {
        config.write.mode = WriteMode::InPlace;
    }
    if cli.preserve_mtime {
        config.write.preserve_mtime = true;
    }

    config.validate().context("invalid marker options")?;
    Ok(config)
}

/// Load the image and locate the region, reporting progress.
fn locate(path: &Path, mode: OpenMode, config: &PatcherConfig, status: &Status) -> Result<(Image, MarkerSpan)> {
    let image = Image::load(path, mode)?;
    status.line(format!("{} read {} bytes", "OK:".green(), image.len()));

    let span = scan(image.bytes(), &config.markers())?;
    status.line("Found both start and end marker");
    status.line(
        format!(
            "Region: [{:#x}, {:#x}) ({} bytes)",
            span.start,
            span.end,
            span.len()
        )
        .dimmed(),
    );

    Ok((image, span))
}

fn cmd_print(path: &Path, config: &PatcherConfig, status: &Status) -> Result<()> {
    let (image, span) = locate(path, OpenMode::ReadOnly, config, status)?;
    let current = extract_text(image.bytes(), span)?;

    println!("Current text: {}", current);
    status.line(format!("xxh3: {}", text_hash(&current)).dimmed());
    Ok(())
}

fn cmd_replace(cli: &Cli, new_text: &str, config: &PatcherConfig, status: &Status) -> Result<()> {
    let verify = match (&cli.expect, &cli.expect_hash) {
        (Some(text), _) => Some(Verification::ExactMatch(text.clone())),
        (None, Some(hex)) => Some(
            Verification::parse_hash(hex).with_context(|| format!("invalid --expect-hash value '{hex}'"))?,
        ),
        (None, None) => None,
    };

    let (mut image, span) = locate(&cli.image, OpenMode::ReadWrite, config, status)?;
    let current = extract_text(image.bytes(), span)?;

    println!("Current text: {}", current);
    println!("New text: {} ({} of {} bytes)", new_text, new_text.len(), span.len());

    let options = PatchOptions {
        write_mode: config.write.mode,
        preserve_mtime: config.write.preserve_mtime,
        dry_run: cli.dry_run,
        verify,
    };

    let result = patch_text(&mut image, span, new_text, &options)?;
    status.line(format!("In image: {:?}", extract_text(image.bytes(), span)?));

    if cli.diff {
        display_diff(&current, new_text);
    }

    match result {
        PatchResult::Applied { bytes_written } => {
            println!(
                "{} {} bytes written to {}",
                "✓".green(),
                bytes_written,
                cli.image.display()
            );
        }
        PatchResult::AlreadyApplied => {
            println!(
                "{} Already applied to {}",
                "⊙".yellow(),
                cli.image.display()
            );
        }
        PatchResult::DryRun => {
            println!(
                "{} Would write {} bytes to {}",
                "⊘".cyan(),
                image.len(),
                cli.image.display()
            );
        }
    }

    Ok(())
}

/// Helper: Show a character diff between the original and new text
fn display_diff(original: &str, modified: &str) {
    let diff = TextDiff::from_chars(original, modified);

    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let piece = change.to_string();
        let piece = match change.tag() {
            ChangeTag::Delete => piece.red().strikethrough().to_string(),
            ChangeTag::Insert => piece.green().underline().to_string(),
            ChangeTag::Equal => piece,
        };
        out.push_str(&piece);
    }
    println!("{} {}", "Diff:".bold(), out);
}
