//! `vm64-asm`: assembles vm64 source into a flat binary image.

use std::env;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use assembler::{assemble, AssembleError, Assembly};
#[cfg(test)]
use tempfile as _;
use thiserror::Error;
use vm64_core as _;

const USAGE: &str = "\
Usage: vm64-asm build <input> [options]

Commands:
  build    Assemble <input> into a flat binary loaded at its origin

Options:
  -o, --output <file>   Binary path (default: <input> with a .bin extension)
  -l, --listing <file>  Write an address/bytes/line listing
  -s, --symbols         Print the label table sorted by address
  -h, --help            Show this help
";

/// Widest encoded instruction is 11 bytes, printed as `XX ` groups.
const LISTING_BYTES_COLUMN: usize = 33;

#[derive(Debug, Error)]
enum CliError {
    #[error("missing command")]
    MissingCommand,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("missing value for {0}")]
    MissingValue(&'static str),
    #[error("missing input path")]
    MissingInput,
    #[error("unexpected extra input: {}", .0.display())]
    ExtraInput(PathBuf),
    #[error("{}: error: {source}", input.display())]
    Assemble {
        input: PathBuf,
        #[source]
        source: AssembleError,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CliError {
    const fn is_usage(&self) -> bool {
        !matches!(self, Self::Assemble { .. } | Self::Write { .. })
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Build(BuildOptions),
    Help,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct BuildOptions {
    input: PathBuf,
    output: Option<PathBuf>,
    listing: Option<PathBuf>,
    symbols: bool,
}

impl BuildOptions {
    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("bin"))
    }
}

fn parse_command(args: &[OsString]) -> Result<Command, CliError> {
    let Some((command, rest)) = args.split_first() else {
        return Err(CliError::MissingCommand);
    };
    match command.to_str() {
        Some("build") => parse_build(rest),
        Some("-h" | "--help" | "help") => Ok(Command::Help),
        _ => Err(CliError::UnknownCommand(
            command.to_string_lossy().into_owned(),
        )),
    }
}

fn parse_build(args: &[OsString]) -> Result<Command, CliError> {
    let mut input = None;
    let mut options = BuildOptions::default();
    let mut args = args.iter();

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("-h" | "--help") => return Ok(Command::Help),
            Some("-o" | "--output") => {
                let value = args.next().ok_or(CliError::MissingValue("--output"))?;
                options.output = Some(PathBuf::from(value));
            }
            Some("-l" | "--listing") => {
                let value = args.next().ok_or(CliError::MissingValue("--listing"))?;
                options.listing = Some(PathBuf::from(value));
            }
            Some("-s" | "--symbols") => options.symbols = true,
            Some(flag) if flag.starts_with('-') => {
                return Err(CliError::UnknownOption(flag.to_owned()));
            }
            _ if input.is_some() => return Err(CliError::ExtraInput(PathBuf::from(arg))),
            _ => input = Some(PathBuf::from(arg)),
        }
    }

    options.input = input.ok_or(CliError::MissingInput)?;
    Ok(Command::Build(options))
}

/// Hex digits used for listing addresses: 8 while the image stays below
/// 4 GiB, 16 beyond.
fn address_digits(assembly: &Assembly) -> usize {
    let end = assembly.origin + assembly.binary.len() as u64;
    if end <= 1 << 32 {
        8
    } else {
        16
    }
}

fn format_listing(assembly: &Assembly) -> String {
    let digits = address_digits(assembly);
    let mut out = String::new();
    for entry in &assembly.listing {
        let bytes = entry
            .bytes
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            out,
            "{:0digits$X}  {bytes:<LISTING_BYTES_COLUMN$} {:>5}  {}",
            entry.address, entry.line, entry.source
        );
    }
    out
}

fn format_symbols(assembly: &Assembly) -> String {
    let digits = address_digits(assembly);
    let mut symbols: Vec<_> = assembly.symbols.iter().collect();
    symbols.sort_by(|a, b| (a.1.address, a.0).cmp(&(b.1.address, b.0)));

    let mut out = String::new();
    for (name, symbol) in symbols {
        let _ = writeln!(out, "{:0digits$X}  {name}", symbol.address);
    }
    out
}

fn summary(input: &Path, output: &Path, assembly: &Assembly) -> String {
    format!(
        "{} -> {}: {} bytes at origin {:#x}",
        input.display(),
        output.display(),
        assembly.binary.len(),
        assembly.origin
    )
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), CliError> {
    fs::write(path, contents).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn build(options: &BuildOptions) -> Result<(), CliError> {
    let assembly = assemble(&options.input).map_err(|source| CliError::Assemble {
        input: options.input.clone(),
        source,
    })?;

    let output = options.output_path();
    write_file(&output, &assembly.binary)?;
    if let Some(listing) = &options.listing {
        write_file(listing, format_listing(&assembly).as_bytes())?;
    }
    if options.symbols {
        print!("{}", format_symbols(&assembly));
    }

    println!("{}", summary(&options.input, &output, &assembly));
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<OsString> = env::args_os().skip(1).collect();
    let result = parse_command(&args).and_then(|command| match command {
        Command::Help => {
            print!("{USAGE}");
            Ok(())
        }
        Command::Build(options) => build(&options),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) if error.is_usage() => {
            eprintln!("error: {error}\n\n{USAGE}");
            ExitCode::from(2)
        }
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
