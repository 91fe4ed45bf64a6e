// Command-line front end for bsdelta.
//
// Explicit subcommands and long-form options; every command resolves into a
// flat `Options` and returns a process exit code.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use log::{debug, info};

use crate::format::{HEADER_LEN, MAGIC, MAX_MAGNITUDE};
use crate::io::{self as file_io, IoError};
use crate::patch::Records;

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// ENDSLEY/BSDIFF43 binary delta encoder/decoder.
#[derive(Parser, Debug)]
#[command(
    name = "bsdelta",
    version,
    about = "ENDSLEY/BSDIFF43 binary delta encoder/decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Create a patch turning OLD into NEW.
    Diff(DiffArgs),
    /// Apply a patch to OLD.
    Patch(PatchArgs),
    /// Print the header and every record of a patch.
    Inspect(InspectArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Old file the patch is made against.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// New file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    new: PathBuf,

    /// Patch output file (default: stdout).
    #[arg(value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Write the patch to stdout.
    #[arg(short = 'c', long)]
    stdout: bool,
}

#[derive(Args, Debug)]
struct PatchArgs {
    /// Old file the patch applies to.
    #[arg(long, short = 's', value_hint = ValueHint::FilePath)]
    old: PathBuf,

    /// Patch file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,

    /// Reconstructed output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Expected SHA-256 of the old file (hex).
    #[arg(long = "old-sha256", value_name = "HEX")]
    old_sha256: Option<String>,

    /// Expected SHA-256 of the output file (hex).
    #[arg(long = "expect-sha256", value_name = "HEX")]
    expect_sha256: Option<String>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Patch file.
    #[arg(value_hint = ValueHint::FilePath)]
    patch: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Diff,
    Patch,
    Inspect,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    use_stdout: bool,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    old_file: Option<PathBuf>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
    old_sha256: Option<String>,
    expect_sha256: Option<String>,
}

impl Options {
    fn new(command: Command, cli: &Cli) -> Self {
        Self {
            command,
            use_stdout: false,
            force: cli.force,
            quiet: cli.quiet,
            verbose: cli.verbose.min(2),
            json_output: cli.json_output,
            old_file: None,
            input_file: None,
            output_file: None,
            old_sha256: None,
            expect_sha256: None,
        }
    }

    /// Default log filter for the chosen verbosity.
    fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            _ => "debug",
        }
    }
}

fn resolve_options(cli: Cli) -> Options {
    let command = match cli.command {
        Cmd::Diff(_) => Command::Diff,
        Cmd::Patch(_) => Command::Patch,
        Cmd::Inspect(_) => Command::Inspect,
        Cmd::Config => Command::Config,
    };
    let mut opts = Options::new(command, &cli);

    match cli.command {
        Cmd::Diff(args) => {
            opts.use_stdout = args.stdout || args.output.is_none();
            opts.old_file = Some(args.old);
            opts.input_file = Some(args.new);
            opts.output_file = args.output;
        }
        Cmd::Patch(args) => {
            opts.old_file = Some(args.old);
            opts.input_file = Some(args.patch);
            opts.output_file = Some(args.output);
            opts.old_sha256 = args.old_sha256;
            opts.expect_sha256 = args.expect_sha256;
        }
        Cmd::Inspect(args) => opts.input_file = Some(args.patch),
        Cmd::Config => {}
    }
    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("bsdelta".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_overwrite(path: &Path, force: bool) -> Result<(), String> {
    if path.exists() && !force {
        return Err(format!(
            "output file exists, use -f to overwrite: {}",
            path.display()
        ));
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("bsdelta: json: {e}"),
    }
}

fn digest_json(digest: Option<[u8; 32]>) -> serde_json::Value {
    digest.map_or(serde_json::Value::Null, |d| file_io::hex(&d).into())
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("bsdelta version {version} (Rust)");
    eprintln!("Licensed under the MIT License");

    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;
    let ptr_size = std::mem::size_of::<*const ()>();
    let magic = String::from_utf8_lossy(MAGIC);

    eprintln!("MAGIC={magic}");
    eprintln!("HEADER_LEN={HEADER_LEN}");
    eprintln!("MAX_LEN={MAX_MAGNITUDE}");
    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("sizeof(usize)={ptr_size}");

    0
}

// ---------------------------------------------------------------------------
// Diff command
// ---------------------------------------------------------------------------

fn cmd_diff(opts: &Options) -> i32 {
    let (Some(old_path), Some(new_path)) = (&opts.old_file, &opts.input_file) else {
        eprintln!("bsdelta: diff requires --old and a new file");
        return 1;
    };

    if opts.use_stdout {
        return diff_to_stdout(opts, old_path, new_path);
    }

    let Some(patch_path) = &opts.output_file else {
        eprintln!("bsdelta: diff requires an output file");
        return 1;
    };
    if let Err(msg) = check_overwrite(patch_path, opts.force) {
        eprintln!("bsdelta: {msg}");
        return 1;
    }

    let stats = match file_io::diff_file(old_path, new_path, patch_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("bsdelta: diff error: {e}");
            return 1;
        }
    };

    info!(
        "diff: old size: {}, new size: {}, patch size: {}",
        stats.old_size, stats.new_size, stats.patch_size
    );
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "bsdelta: diff: old size: {}, new size: {}, patch size: {}",
            stats.old_size, stats.new_size, stats.patch_size
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "diff",
            "old_size": stats.old_size,
            "new_size": stats.new_size,
            "patch_size": stats.patch_size,
            "old_sha256": digest_json(stats.old_sha256),
            "new_sha256": digest_json(stats.new_sha256),
        }));
    }

    0
}

fn diff_to_stdout(opts: &Options, old_path: &Path, new_path: &Path) -> i32 {
    let old = match std::fs::read(old_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("bsdelta: old file: {}: {e}", old_path.display());
            return 1;
        }
    };
    let new = match std::fs::read(new_path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("bsdelta: new file: {}: {e}", new_path.display());
            return 1;
        }
    };

    if opts.output_file.is_some() && !opts.quiet {
        eprintln!("bsdelta: warning: -c option overrides output filename");
    }

    let mut out = BufWriter::with_capacity(BUF_SIZE, io::stdout().lock());
    let written = match crate::diff::diff(&old, &new, &mut out) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("bsdelta: diff error: {e}");
            return 1;
        }
    };
    if let Err(e) = out.flush() {
        eprintln!("bsdelta: write flush error: {e}");
        return 1;
    }
    debug!("diff: wrote {written} patch bytes to stdout");
    0
}

// ---------------------------------------------------------------------------
// Patch command
// ---------------------------------------------------------------------------

fn cmd_patch(opts: &Options) -> i32 {
    let (Some(old_path), Some(patch_path), Some(output_path)) =
        (&opts.old_file, &opts.input_file, &opts.output_file)
    else {
        eprintln!("bsdelta: patch requires --old, a patch file and an output file");
        return 1;
    };

    if let Err(msg) = check_overwrite(output_path, opts.force) {
        eprintln!("bsdelta: {msg}");
        return 1;
    }

    if let Some(expected) = &opts.old_sha256
        && let Err(e) = verify(old_path, expected)
    {
        eprintln!("bsdelta: old file: {e}");
        return 1;
    }

    // The output digest is checked in memory, before the file is created.
    let applied = match &opts.expect_sha256 {
        Some(expected) => patch_verified(old_path, patch_path, output_path, expected),
        None => file_io::patch_file(old_path, patch_path, output_path),
    };
    let stats = match applied {
        Ok(s) => s,
        Err(e) => {
            eprintln!("bsdelta: patch error: {e}");
            return 1;
        }
    };

    info!(
        "patch: old size: {}, patch size: {}, output size: {}",
        stats.old_size, stats.patch_size, stats.output_size
    );
    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "bsdelta: patch: output size: {} (declared {})",
            stats.output_size, stats.declared_size
        );
    }

    if opts.json_output {
        print_json(&serde_json::json!({
            "command": "patch",
            "old_size": stats.old_size,
            "patch_size": stats.patch_size,
            "output_size": stats.output_size,
            "declared_size": stats.declared_size,
            "output_sha256": digest_json(stats.output_sha256),
        }));
    }

    0
}

#[cfg(feature = "file-io")]
fn verify(path: &Path, expected: &str) -> Result<(), IoError> {
    file_io::verify_digest(path, expected)
}

#[cfg(not(feature = "file-io"))]
fn verify(_path: &Path, _expected: &str) -> Result<(), IoError> {
    Err(IoError::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        "digest checks need the `file-io` feature",
    )))
}

#[cfg(feature = "file-io")]
fn patch_verified(
    old_path: &Path,
    patch_path: &Path,
    output_path: &Path,
    expected: &str,
) -> Result<file_io::PatchStats, IoError> {
    file_io::patch_file_verified(old_path, patch_path, output_path, expected)
}

#[cfg(not(feature = "file-io"))]
fn patch_verified(
    _old_path: &Path,
    _patch_path: &Path,
    _output_path: &Path,
    _expected: &str,
) -> Result<file_io::PatchStats, IoError> {
    Err(IoError::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        "digest checks need the `file-io` feature",
    )))
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn cmd_inspect(opts: &Options) -> i32 {
    let Some(path) = &opts.input_file else {
        eprintln!("bsdelta: inspect requires a patch file");
        return 1;
    };

    let data = match std::fs::read(path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("bsdelta: {}: {e}", path.display());
            return 1;
        }
    };

    let (header, mut records) = match Records::new(&data) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("bsdelta: invalid patch header: {e}");
            return 1;
        }
    };

    let mut rows = Vec::new();
    let mut new_offset: u64 = 0;
    let mut status = 0;
    while let Some(result) = records.next() {
        match result {
            Ok(rec) => {
                rows.push(rec);
                new_offset += (rec.diff.len() + rec.literal.len()) as u64;
            }
            Err(e) => {
                eprintln!(
                    "bsdelta: record {} at offset {}: {e}",
                    rows.len(),
                    records.position()
                );
                status = 1;
                break;
            }
        }
    }

    if opts.json_output {
        let records: Vec<serde_json::Value> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "offset": r.offset,
                    "copy": r.control.copy,
                    "literal": r.control.literal,
                    "seek": r.control.seek,
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "command": "inspect",
            "patch_size": data.len(),
            "declared_size": header.new_len,
            "output_size": new_offset,
            "records": records,
        }));
        return status;
    }

    println!("Patch magic:           {}", String::from_utf8_lossy(MAGIC));
    println!("Patch size:            {}", data.len());
    println!("Declared output size:  {}", header.new_len);
    println!("Records:               {}", rows.len());
    println!("Output size:           {new_offset}");
    if opts.quiet {
        return status;
    }

    println!();
    println!("  Offset     Copy  Literal     Seek");
    for r in &rows {
        println!(
            "  {:06} {:8} {:8} {:8}",
            r.offset, r.control.copy, r.control.literal, r.control.seek
        );
    }

    status
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(opts.log_filter()))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Diff => cmd_diff(&opts),
        Command::Patch => cmd_patch(&opts),
        Command::Inspect => cmd_inspect(&opts),
        Command::Config => cmd_config(),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("bsdelta".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    #[test]
    fn diff_subcommand_maps_correctly() {
        let opts = parse_opts(&["diff", "--old", "old.bin", "new.bin", "out.patch"]);
        assert_eq!(opts.command, Command::Diff);
        assert_eq!(opts.old_file, Some(PathBuf::from("old.bin")));
        assert_eq!(opts.input_file, Some(PathBuf::from("new.bin")));
        assert_eq!(opts.output_file, Some(PathBuf::from("out.patch")));
        assert!(!opts.use_stdout);
    }

    #[test]
    fn diff_without_output_goes_to_stdout() {
        let opts = parse_opts(&["diff", "-s", "old.bin", "new.bin"]);
        assert!(opts.use_stdout);
        assert!(opts.output_file.is_none());

        let forced = parse_opts(&["diff", "-s", "old.bin", "-c", "new.bin", "out.patch"]);
        assert!(forced.use_stdout);
    }

    #[test]
    fn patch_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "--quiet",
            "patch",
            "--old",
            "old.bin",
            "--expect-sha256",
            "abcd",
            "in.patch",
            "out.bin",
        ]);
        assert_eq!(opts.command, Command::Patch);
        assert!(opts.quiet);
        assert_eq!(opts.old_file, Some(PathBuf::from("old.bin")));
        assert_eq!(opts.input_file, Some(PathBuf::from("in.patch")));
        assert_eq!(opts.output_file, Some(PathBuf::from("out.bin")));
        assert_eq!(opts.expect_sha256.as_deref(), Some("abcd"));
        assert!(opts.old_sha256.is_none());
    }

    #[test]
    fn patch_requires_old() {
        let argv = ["bsdelta", "patch", "in.patch", "out.bin"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn global_force_and_json_flags() {
        let opts = parse_opts(&["--force", "--json", "diff", "--old", "a", "b", "c"]);
        assert!(opts.force);
        assert!(opts.json_output);
    }

    #[test]
    fn verbose_is_capped() {
        let opts = parse_opts(&["-v", "-v", "-v", "inspect", "p"]);
        assert_eq!(opts.verbose, 2);
        assert_eq!(opts.log_filter(), "debug");
    }

    #[test]
    fn log_filter_follows_verbosity() {
        assert_eq!(parse_opts(&["config"]).log_filter(), "warn");
        assert_eq!(parse_opts(&["-v", "config"]).log_filter(), "info");
        assert_eq!(parse_opts(&["-q", "config"]).log_filter(), "error");
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let argv = ["bsdelta", "-q", "-v", "config"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn inspect_and_config_map() {
        let opts = parse_opts(&["inspect", "x.patch"]);
        assert_eq!(opts.command, Command::Inspect);
        assert_eq!(opts.input_file, Some(PathBuf::from("x.patch")));
        assert_eq!(parse_opts(&["config"]).command, Command::Config);
    }

    #[test]
    fn overwrite_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists");
        std::fs::write(&path, b"x").unwrap();
        assert!(check_overwrite(&path, false).is_err());
        assert!(check_overwrite(&path, true).is_ok());
        assert!(check_overwrite(&dir.path().join("missing"), false).is_ok());
    }

    #[test]
    fn fuzz_parse_does_not_panic() {
        fuzz_try_parse_args(&["diff".into(), "--old".into()]);
        fuzz_try_parse_args(&["bogus".into()]);
    }
}
