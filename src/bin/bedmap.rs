//! `bedmap`: the streaming overlap/statistics mapping tool (§6).
//!
//! Positional `REFERENCE MAP` (MAP may be `-` for stdin); overlap selector
//! as a mutually-exclusive group (default `--bp-ovr 1`, §3's "R=0 aliases
//! bp-overlap 1" framing); operations as repeatable flags, applied to the
//! `MultiVisitor` list in the order given on the command line — built with
//! `clap`'s builder API rather than the derive API specifically so flag
//! occurrence order survives the parse (the derive API only preserves
//! per-flag repetition count, not cross-flag interleaving).

use std::path::PathBuf;
use std::process;

use clap::{value_parser, Arg, ArgAction, ArgGroup, Command};

use bedops_core::config::{OutputConfig, SweepConfig};
use bedops_core::driver::{self, InputSource};
use bedops_core::error::exit_code;
use bedops_core::predicate::OverlapPredicate;
use bedops_core::visitor::VisitorKind;

const OPERATIONS: &[&str] = &[
    "count",
    "indicator",
    "bases",
    "bases-uniq",
    "bases-uniq-f",
    "sum",
    "mean",
    "variance",
    "stdev",
    "cv",
    "median",
    "min",
    "max",
    "wmean",
    "min-element",
    "max-element",
    "min-element-rand",
    "max-element-rand",
    "echo",
    "echo-ref-length",
    "echo-ref-span",
    "echo-ref-row-id",
    "echo-map",
    "echo-map-id",
    "echo-map-id-uniq",
    "echo-map-range",
    "echo-map-score",
    "echo-map-size",
    "echo-overlap-size",
];

fn build_command() -> Command {
    let mut cmd = Command::new("bedmap")
        .author("Shane Neph & Alex Reynolds")
        .version(bedops_core::VERSION)
        .about("Stream a map file past a sorted reference file, emitting per-reference statistics")
        .arg(Arg::new("reference").required(true).value_name("REFERENCE"))
        .arg(Arg::new("map").required(true).value_name("MAP"))
        .arg(Arg::new("bp-ovr").long("bp-ovr").value_name("N").value_parser(value_parser!(u64)))
        .arg(Arg::new("range").long("range").value_name("N").value_parser(value_parser!(u64)))
        .arg(Arg::new("exact").long("exact").action(ArgAction::SetTrue))
        .arg(Arg::new("fraction-ref").long("fraction-ref").value_name("F").value_parser(value_parser!(f64)))
        .arg(Arg::new("fraction-map").long("fraction-map").value_name("F").value_parser(value_parser!(f64)))
        .arg(Arg::new("fraction-either").long("fraction-either").value_name("F").value_parser(value_parser!(f64)))
        .arg(Arg::new("fraction-both").long("fraction-both").value_name("F").value_parser(value_parser!(f64)))
        .group(
            ArgGroup::new("overlap-selector")
                .args(["bp-ovr", "range", "exact", "fraction-ref", "fraction-map", "fraction-either", "fraction-both"])
                .multiple(false),
        )
        .arg(Arg::new("chrom").long("chrom").value_name("CHROM"))
        .arg(Arg::new("delim").long("delim").value_name("STR"))
        .arg(Arg::new("multidelim").long("multidelim").value_name("STR"))
        .arg(Arg::new("prec").long("prec").value_name("N").value_parser(value_parser!(usize)))
        .arg(Arg::new("sci").long("sci").action(ArgAction::SetTrue))
        .arg(Arg::new("ec").long("ec").action(ArgAction::SetTrue))
        .arg(Arg::new("header").long("header").action(ArgAction::SetTrue))
        .arg(Arg::new("skip-unmapped").long("skip-unmapped").action(ArgAction::SetTrue))
        .arg(Arg::new("unmapped-val").long("unmapped-val").value_name("STR"))
        .arg(Arg::new("sweep-all").long("sweep-all").action(ArgAction::SetTrue))
        .arg(Arg::new("faster").long("faster").action(ArgAction::SetTrue))
        .arg(Arg::new("min-memory").long("min-memory").action(ArgAction::SetTrue))
        .arg(
            Arg::new("mad")
                .long("mad")
                .value_name("MULTIPLIER")
                .num_args(0..=1)
                .default_missing_value("1.0")
                .value_parser(value_parser!(f64))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("tmean")
                .long("tmean")
                .value_names(["LO", "HI"])
                .num_args(2)
                .value_parser(value_parser!(f64))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("kth")
                .long("kth")
                .value_name("Q")
                .num_args(1)
                .value_parser(value_parser!(f64))
                .action(ArgAction::Append),
        );

    for op in OPERATIONS {
        cmd = cmd.arg(Arg::new(*op).long(*op).action(ArgAction::Count));
    }
    cmd
}

fn main() {
    env_logger::init();
    let matches = build_command().get_matches();

    let predicate = overlap_predicate(&matches);
    let visitors = operation_visitors(&matches);
    if visitors.is_empty() {
        eprintln!("bedmap: at least one operation flag is required (e.g. --count)");
        process::exit(22);
    }

    let sweep_cfg = SweepConfig {
        predicate,
        faster: matches.get_flag("faster"),
        sweep_all: matches.get_flag("sweep-all"),
        min_memory: matches.get_flag("min-memory"),
    };

    let mut output_cfg = OutputConfig::default();
    if let Some(d) = matches.get_one::<String>("delim") {
        output_cfg.column_delim = d.clone();
    }
    if let Some(d) = matches.get_one::<String>("multidelim") {
        output_cfg.multi_delim = d.clone();
    }
    if let Some(p) = matches.get_one::<usize>("prec") {
        output_cfg.precision = *p;
    }
    output_cfg.scientific = matches.get_flag("sci");
    output_cfg.skip_unmapped = matches.get_flag("skip-unmapped");
    if let Some(v) = matches.get_one::<String>("unmapped-val") {
        output_cfg.unmapped_value = v.clone();
    }

    let reference_path = PathBuf::from(matches.get_one::<String>("reference").unwrap());
    let map_arg = matches.get_one::<String>("map").unwrap();
    let map_source = if map_arg == "-" { InputSource::Stdin } else { InputSource::Path(PathBuf::from(map_arg)) };
    let error_check = matches.get_flag("ec");
    let header_passthrough = matches.get_flag("header");
    let chrom_filter = matches.get_one::<String>("chrom").cloned();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = driver::run_mapping(&reference_path, map_source, &sweep_cfg, &output_cfg, visitors, error_check, header_passthrough, chrom_filter, &mut out);

    if let Err(err) = result {
        eprintln!("bedmap: {err}");
        process::exit(exit_code(&err));
    }
}

fn overlap_predicate(matches: &clap::ArgMatches) -> OverlapPredicate {
    if let Some(n) = matches.get_one::<u64>("bp-ovr") {
        OverlapPredicate::BpOverlap(*n)
    } else if let Some(r) = matches.get_one::<u64>("range") {
        OverlapPredicate::Range(*r)
    } else if matches.get_flag("exact") {
        OverlapPredicate::Exact
    } else if let Some(f) = matches.get_one::<f64>("fraction-ref") {
        OverlapPredicate::FractionRef(*f)
    } else if let Some(f) = matches.get_one::<f64>("fraction-map") {
        OverlapPredicate::FractionMap(*f)
    } else if let Some(f) = matches.get_one::<f64>("fraction-either") {
        OverlapPredicate::FractionEither(*f)
    } else if let Some(f) = matches.get_one::<f64>("fraction-both") {
        OverlapPredicate::FractionBoth(*f)
    } else {
        OverlapPredicate::BpOverlap(1)
    }
}

fn simple_visitor_kind(op: &str) -> VisitorKind {
    match op {
        "count" => VisitorKind::Count { count: 0 },
        "indicator" => VisitorKind::Indicator,
        "bases" => VisitorKind::Bases,
        "bases-uniq" => VisitorKind::BasesUniq,
        "bases-uniq-f" => VisitorKind::BasesUniqFraction,
        "sum" => VisitorKind::Sum,
        "mean" => VisitorKind::Mean,
        "variance" => VisitorKind::Variance,
        "stdev" => VisitorKind::Stdev,
        "cv" => VisitorKind::Cv,
        "median" => VisitorKind::Median,
        "min" => VisitorKind::Min,
        "max" => VisitorKind::Max,
        "wmean" => VisitorKind::WMean,
        "min-element" => VisitorKind::MinElement,
        "max-element" => VisitorKind::MaxElement,
        "min-element-rand" => VisitorKind::min_element_rand(),
        "max-element-rand" => VisitorKind::max_element_rand(),
        "echo" => VisitorKind::EchoRef,
        "echo-ref-length" => VisitorKind::EchoRefLength,
        "echo-ref-span" => VisitorKind::EchoRefSpan,
        "echo-ref-row-id" => VisitorKind::EchoRefRowId { next_id: 0 },
        "echo-map" => VisitorKind::EchoMapAll,
        "echo-map-id" => VisitorKind::EchoMapId,
        "echo-map-id-uniq" => VisitorKind::EchoMapIdUniq,
        "echo-map-range" => VisitorKind::EchoMapRange,
        "echo-map-score" => VisitorKind::EchoMapScore,
        "echo-map-size" => VisitorKind::EchoMapSize,
        "echo-overlap-size" => VisitorKind::EchoOverlapSize,
        _ => unreachable!("exhaustive over OPERATIONS"),
    }
}

/// `--mad`, `--kth`, and `--tmean` carry their own values (§6's
/// `--mad[mult]`/`--kth q`/`--tmean lo hi` grammar) rather than the bare
/// repeat-count flags the rest of `OPERATIONS` uses, so each gets its own
/// occurrence extractor pairing a flag-order index with the value(s) that
/// particular occurrence consumed.
fn mad_occurrences(matches: &clap::ArgMatches) -> Vec<(usize, VisitorKind)> {
    let Some(indices) = matches.indices_of("mad") else { return Vec::new() };
    let values = matches.get_many::<f64>("mad").unwrap();
    indices.zip(values).map(|(idx, v)| (idx, VisitorKind::Mad { multiplier: *v })).collect()
}

fn kth_occurrences(matches: &clap::ArgMatches) -> Vec<(usize, VisitorKind)> {
    let Some(indices) = matches.indices_of("kth") else { return Vec::new() };
    let values = matches.get_many::<f64>("kth").unwrap();
    indices.zip(values).map(|(idx, v)| (idx, VisitorKind::Kth { q: *v })).collect()
}

fn tmean_occurrences(matches: &clap::ArgMatches) -> Vec<(usize, VisitorKind)> {
    let Some(indices) = matches.indices_of("tmean") else { return Vec::new() };
    let idx_per_value: Vec<usize> = indices.collect();
    let values: Vec<f64> = matches.get_many::<f64>("tmean").unwrap().copied().collect();
    idx_per_value
        .chunks(2)
        .zip(values.chunks(2))
        .map(|(idxs, vs)| (idxs[0], VisitorKind::TMean { lo: vs[0], hi: vs[1] }))
        .collect()
}

/// Collects every operation flag's occurrence indices, sorts them, and
/// builds one `VisitorKind` per occurrence in that order — the "in flag
/// order" contract from §6.
fn operation_visitors(matches: &clap::ArgMatches) -> Vec<VisitorKind> {
    let mut occurrences: Vec<(usize, VisitorKind)> = Vec::new();
    for op in OPERATIONS {
        if let Some(indices) = matches.indices_of(*op) {
            for idx in indices {
                occurrences.push((idx, simple_visitor_kind(op)));
            }
        }
    }
    occurrences.extend(mad_occurrences(matches));
    occurrences.extend(kth_occurrences(matches));
    occurrences.extend(tmean_occurrences(matches));
    occurrences.sort_by_key(|(idx, _)| *idx);
    occurrences.into_iter().map(|(_, kind)| kind).collect()
}
