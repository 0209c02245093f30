//! Chromosome-scoped extractor (§4.7).
//!
//! Three thin drivers over the byte-range finder: list every chromosome
//! present in a file, emit one chromosome whole, or extract file 1's
//! records overlapping file 2's records. Grounded in `ExtractRows.cpp`'s
//! three branches (`CHROMELIST`/`ONECHROME`/`TWOFILE`).

use std::io::{Read, Seek};

use crate::error::Result;
use crate::interval::{Interval, MAX_COORD};
use crate::predicate::OverlapPredicate;
use crate::rangefinder::{find_bed_range, find_bed_ranges, read_record_at, ByteIndex};

/// A reference spanning an entire chromosome, used both to emit a whole
/// chromosome and, with `MAX_COORD - 1`, as the sentinel the chromosome
/// walk uses to land on the current chromosome's last record.
fn whole_chromosome(chrom: &str) -> Interval {
    Interval::new(chrom, 0, MAX_COORD)
}

/// Walks every distinct chromosome in `file` in file order: probe the
/// current position, call `on_chrom` with the chromosome name, then binary
/// search with a sentinel reference (`MAX_COORD - 1` start) to land past
/// the current chromosome's last record and repeat from there.
///
/// Grounded in `ExtractRows.cpp`'s `CHROMELIST` branch.
pub fn list_chromosomes<F: Read + Seek>(file: &mut F, predicate: &OverlapPredicate, mut on_chrom: impl FnMut(&str) -> Result<()>) -> Result<()> {
    let mut index = ByteIndex::new();
    let mut cursor = 0u64;
    loop {
        let Some((first, _)) = peek_first_record(file, cursor)? else { break };
        on_chrom(&first.chrom)?;
        let sentinel = Interval::new(first.chrom.clone(), MAX_COORD - 1, MAX_COORD);
        cursor = find_bed_range(file, &sentinel, predicate, &mut index, cursor, |_| Ok(()))?;
        cursor = skip_to_next_chromosome(file, cursor, &first.chrom)?;
    }
    Ok(())
}

/// Reads the single record at `pos` without advancing any persistent
/// cursor, used only to discover the next chromosome's name.
fn peek_first_record<F: Read + Seek>(file: &mut F, pos: u64) -> Result<Option<(Interval, u64)>> {
    let file_len = file.seek(std::io::SeekFrom::End(0)).map_err(crate::error::BedError::Io)?;
    if pos >= file_len {
        return Ok(None);
    }
    read_record_at(file, pos)
}

/// Advances linearly past any remaining records on `chrom` starting at
/// `pos`, returning the offset of the first record on a later chromosome
/// (or EOF). The binary search in `find_bed_range` already lands very
/// close to this boundary; this only needs to step over what's left.
fn skip_to_next_chromosome<F: Read + Seek>(file: &mut F, pos: u64, chrom: &str) -> Result<u64> {
    let mut cursor = pos;
    loop {
        match read_record_at(file, cursor)? {
            None => return Ok(cursor),
            Some((rec, next)) => {
                if rec.chrom.as_ref() != chrom {
                    return Ok(cursor);
                }
                cursor = next;
            }
        }
    }
}

/// Emits every record of `file` on `chrom`, in file order.
///
/// Grounded in `ExtractRows.cpp`'s `ONECHROME` branch.
pub fn emit_chromosome<F: Read + Seek>(file: &mut F, chrom: &str, predicate: &OverlapPredicate, acceptor: impl FnMut(&Interval) -> Result<()>) -> Result<()> {
    let reference = whole_chromosome(chrom);
    let mut index = ByteIndex::new();
    find_bed_range(file, &reference, predicate, &mut index, 0, acceptor)?;
    Ok(())
}

/// Extracts every record of `file_one` overlapping some record of
/// `targets` (already read from file 2, sorted), in file order.
///
/// Grounded in `ExtractRows.cpp`'s `TWOFILE` branch.
pub fn overlap_extract<F: Read + Seek>(file_one: &mut F, targets: &[Interval], predicate: &OverlapPredicate, acceptor: impl FnMut(&Interval) -> Result<()>) -> Result<()> {
    find_bed_ranges(file_one, targets, predicate, acceptor)
}
