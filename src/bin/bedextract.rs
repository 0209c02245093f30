//! `bedextract`: the chromosome- and range-scoped extraction tool (§6).
//!
//! Three invocation shapes, modeled as a hand-rolled post-parse dispatch
//! rather than a getopt-style grammar, matching the original `Input`
//! constructor's own argc-counting logic: `--list-chr FILE`, `CHROM FILE`,
//! or `QUERY TARGET`.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use bedops_core::driver::{self, InputSource};
use bedops_core::error::{exit_code, BedError};
use bedops_core::reader::looks_like_starch;

#[derive(Parser)]
#[command(name = "bedextract")]
#[command(author = "Shane Neph & Alex Reynolds")]
#[command(version)]
#[command(about = "Extract BED records by chromosome or by overlap with a second file", long_about = None)]
struct Cli {
    /// List every chromosome present in FILE, in file order, and exit.
    #[arg(long = "list-chr", value_name = "FILE")]
    list_chr: Option<PathBuf>,

    /// `CHROM FILE` or `QUERY TARGET`, depending on arity.
    #[arg(num_args = 0..=2)]
    positional: Vec<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(err) = result {
        eprintln!("bedextract: {err}");
        process::exit(exit_code(&err));
    }
}

fn run(cli: Cli) -> bedops_core::error::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(path) = cli.list_chr {
        return driver::run_list_chromosomes(&path, &mut out);
    }

    match cli.positional.as_slice() {
        [chrom, path] if !looks_like_path_arg(chrom) => {
            let path = PathBuf::from(path);
            driver::run_one_chromosome(chrom, &path, &mut out)
        }
        [query, target] => {
            let query_path = PathBuf::from(query);
            reject_starch_query(&query_path)?;
            let mut query_file = File::open(&query_path).map_err(BedError::Io)?;
            let target_source = if target == "-" { InputSource::Stdin } else { InputSource::Path(PathBuf::from(target)) };
            driver::run_overlap_extract(&mut query_file, target_source, &mut out)
        }
        _ => {
            eprintln!("usage: bedextract --list-chr FILE | bedextract CHROM FILE | bedextract QUERY TARGET");
            process::exit(22);
        }
    }
}

/// A first positional argument is treated as `CHROM` (not a file path) when
/// it does not itself resolve to a readable file — mirroring the original's
/// disambiguation between the `ONECHROME` and `TWOFILE` invocation shapes.
fn looks_like_path_arg(arg: &str) -> bool {
    arg != "-" && std::path::Path::new(arg).is_file()
}

/// The original rejects a Starch-tagged first file (`QUERY`) outright;
/// stdin is never accepted for `QUERY` either, since the check below opens
/// the path directly.
fn reject_starch_query(path: &std::path::Path) -> bedops_core::error::Result<()> {
    let mut magic = [0u8; 3];
    let mut file = File::open(path).map_err(BedError::Io)?;
    let n = std::io::Read::read(&mut file, &mut magic).unwrap_or(0);
    if n == 3 && looks_like_starch(&magic) {
        return Err(BedError::CorruptArchive(format!("{}: QUERY must not be a Starch archive", path.display())));
    }
    Ok(())
}
