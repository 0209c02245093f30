//! Byte-range finder (§4.6).
//!
//! Given a seekable handle to a sorted BED file and a non-empty list of
//! reference records, emits every record overlapping some reference, in the
//! order the records appear in the file, without loading the file into
//! memory. Grounded in the original's `find_bed_range` template algorithm:
//! binary-search by byte halving to find the first possibly-overlapping
//! byte, then a forward linear scan that stops at the first record strictly
//! beyond the reference's extent.

use std::cmp::Ordering;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::{BedError, Context, Result};
use crate::interval::{GenomicOrder, Interval};
use crate::predicate::OverlapPredicate;
use crate::reader::parse_bed_line;

/// Bound on how far `find_line_start` will scan backward before giving up —
/// a single line is never expected to exceed this many bytes given the
/// field caps in §3; exceeding it raises `FieldTooLong` rather than growing
/// the scan buffer unboundedly (§9's binary-search-over-text-file note).
const SCAN_BACK_BOUND: usize = 1 << 20;
const SCAN_CHUNK: usize = 8192;

/// Monotone map from previously-observed record keys to the byte offset at
/// which that record begins. Consulted to upper-bound future binary
/// searches; grows as probes and linear scans discover new records.
#[derive(Debug, Default)]
pub struct ByteIndex {
    entries: Vec<(Interval, u64)>,
}

impl ByteIndex {
    pub fn new() -> Self {
        ByteIndex::default()
    }

    pub fn record(&mut self, key: Interval, offset: u64) {
        let idx = self.entries.partition_point(|(k, _)| GenomicOrder.cmp(k, &key) == Ordering::Less);
        if let Some((existing_key, existing_offset)) = self.entries.get(idx) {
            if GenomicOrder.cmp(existing_key, &key) == Ordering::Equal && *existing_offset == offset {
                return;
            }
        }
        self.entries.insert(idx, (key, offset));
    }

    /// The byte offset of the least previously-seen record that sorts
    /// strictly after `r`, used as `end_pos`'s upper bound.
    pub fn upper_bound(&self, r: &Interval) -> Option<u64> {
        let idx = self.entries.partition_point(|(k, _)| GenomicOrder.cmp(k, r) != Ordering::Greater);
        self.entries.get(idx).map(|(_, offset)| *offset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that `rec`, freshly probed at `offset`, is consistent with
    /// every already-indexed record: since the file is supposed to be
    /// sorted, a record at a lower byte offset must never sort after one at
    /// a higher offset. A violation means the binary search's core
    /// assumption — that byte position and sort order move together — does
    /// not hold for this file, i.e. the precondition that the input is
    /// pre-sorted has been broken.
    pub fn check_consistent(&self, offset: u64, rec: &Interval) -> Result<()> {
        for (key, key_offset) in &self.entries {
            let order = GenomicOrder.cmp(key, rec);
            if *key_offset < offset && order == Ordering::Greater {
                return Err(BedError::CorruptSortOrder(Context::new(format!(
                    "record at byte {offset} ({}:{}-{}) sorts before an earlier record at byte {key_offset} ({}:{}-{})",
                    rec.chrom, rec.start, rec.end, key.chrom, key.start, key.end
                ))));
            }
            if *key_offset > offset && order == Ordering::Less {
                return Err(BedError::CorruptSortOrder(Context::new(format!(
                    "record at byte {offset} ({}:{}-{}) sorts after a later record at byte {key_offset} ({}:{}-{})",
                    rec.chrom, rec.start, rec.end, key.chrom, key.start, key.end
                ))));
            }
        }
        Ok(())
    }
}

/// Scans backward from `pos` to the start of the line containing it.
fn find_line_start<F: Read + Seek>(file: &mut F, pos: u64) -> Result<u64> {
    if pos == 0 {
        return Ok(0);
    }
    let mut cursor = pos;
    let mut buf = vec![0u8; SCAN_CHUNK];
    let mut scanned = 0usize;
    loop {
        let chunk_len = (SCAN_CHUNK as u64).min(cursor) as usize;
        if chunk_len == 0 {
            return Ok(0);
        }
        let start = cursor - chunk_len as u64;
        file.seek(SeekFrom::Start(start)).map_err(BedError::Io)?;
        file.read_exact(&mut buf[..chunk_len]).map_err(BedError::Io)?;
        if let Some(idx) = memchr::memrchr(b'\n', &buf[..chunk_len]) {
            return Ok(start + idx as u64 + 1);
        }
        scanned += chunk_len;
        if scanned > SCAN_BACK_BOUND {
            return Err(BedError::FieldTooLong(Context::new(format!("no line boundary found within {SCAN_BACK_BOUND} bytes of offset {pos}"))));
        }
        if start == 0 {
            return Ok(0);
        }
        cursor = start;
    }
}

/// Reads and parses the single record beginning at `line_start`, returning
/// `None` at EOF and the byte offset where the *next* record begins
/// otherwise.
pub(crate) fn read_record_at<F: Read + Seek>(file: &mut F, line_start: u64) -> Result<Option<(Interval, u64)>> {
    file.seek(SeekFrom::Start(line_start)).map_err(BedError::Io)?;
    let mut reader = BufReader::with_capacity(SCAN_CHUNK, &mut *file);
    let mut line = String::new();
    let n = std::io::BufRead::read_line(&mut reader, &mut line).map_err(BedError::Io)?;
    if n == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches(['\n', '\r']);
    if trimmed.is_empty() {
        // Blank line: treat as an empty record span so the caller keeps scanning.
        return read_record_at(file, line_start + n as u64);
    }
    let record = parse_bed_line(trimmed, 0)?;
    Ok(Some((record, line_start + n as u64)))
}

/// Binary-search narrowing of §4.6 steps 1-2: shrinks `[start_pos, hi)` down
/// to the first byte that could possibly begin a record overlapping `r`,
/// consulting and growing `index` as it goes. Factored out of
/// `find_bed_range` so a caller that only needs the seek target (the
/// reader's seekable chromosome-filter fast path, §4.1) isn't forced to pay
/// for the forward linear scan too.
///
/// Narrows using `Interval::distance` against `r`'s predicate-expanded span
/// rather than the plain total order: a candidate that *sorts* before `r`
/// can still genuinely overlap it (a long-spanning record that starts
/// upstream of `r` but extends past `r.start`), and the total order alone
/// can't tell those two cases apart. `distance` returns `0` exactly when
/// the two intervals overlap, so only a strictly positive distance (`rec`
/// entirely behind the expanded reference) is safe to step `lo` past;
/// anything else — overlapping or entirely ahead — must retreat `hi`
/// instead, keeping the candidate in the search window.
pub fn locate_first_possible_offset<F: Read + Seek>(file: &mut F, r: &Interval, predicate: &OverlapPredicate, index: &mut ByteIndex, start_pos: u64) -> Result<u64> {
    let file_len = file.seek(SeekFrom::End(0)).map_err(BedError::Io)?;
    let mut lo = start_pos;
    let mut hi = index.upper_bound(r).unwrap_or(file_len).min(file_len);
    let (exp_lo, exp_hi) = predicate.expanded_reference(r);
    let expanded = Interval::new(r.chrom.clone(), exp_lo, exp_hi);

    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let line_start = find_line_start(file, mid)?;
        if line_start <= lo {
            break;
        }
        match read_record_at(file, line_start)? {
            None => {
                hi = line_start;
            }
            Some((rec, next_offset)) => {
                index.check_consistent(line_start, &rec)?;
                index.record(rec.clone(), line_start);
                if rec.distance(&expanded) > 0 {
                    lo = next_offset;
                } else {
                    hi = line_start;
                }
            }
        }
    }
    Ok(lo)
}

/// Finds every record of `file` overlapping `r` under `predicate`, calling
/// `acceptor` once per match in file order, and returns the byte offset the
/// next reference's search should start from (monotone across calls so the
/// byte index and the read cursor both only move forward).
pub fn find_bed_range<F: Read + Seek>(
    file: &mut F,
    r: &Interval,
    predicate: &OverlapPredicate,
    index: &mut ByteIndex,
    start_pos: u64,
    mut acceptor: impl FnMut(&Interval) -> Result<()>,
) -> Result<u64> {
    let lo = locate_first_possible_offset(file, r, predicate, index, start_pos)?;
    let mut pos = lo;
    loop {
        match read_record_at(file, pos)? {
            None => break,
            Some((rec, next_offset)) => {
                index.check_consistent(pos, &rec)?;
                index.record(rec.clone(), pos);
                if predicate.is_overlapping(r, &rec) {
                    acceptor(&rec)?;
                    pos = next_offset;
                } else if GenomicOrder.cmp(&rec, r) == Ordering::Less {
                    pos = next_offset;
                } else {
                    break;
                }
            }
        }
    }
    Ok(lo)
}

/// Runs `find_bed_range` for each reference in turn, reusing the byte index
/// and advancing the read cursor monotonically — the batch form described
/// in §4.6's four-step algorithm.
pub fn find_bed_ranges<F: Read + Seek>(file: &mut F, references: &[Interval], predicate: &OverlapPredicate, mut acceptor: impl FnMut(&Interval) -> Result<()>) -> Result<()> {
    let mut index = ByteIndex::new();
    let mut cursor = 0u64;
    for r in references {
        cursor = find_bed_range(file, r, predicate, &mut index, cursor, &mut acceptor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn fixture() -> Cursor<Vec<u8>> {
        let mut data = Vec::new();
        writeln!(data, "chr1\t5\t12").unwrap();
        writeln!(data, "chr1\t15\t25").unwrap();
        writeln!(data, "chr1\t109\t111").unwrap();
        writeln!(data, "chr2\t10\t20").unwrap();
        Cursor::new(data)
    }

    #[test]
    fn finds_overlapping_records_in_file_order() {
        let mut file = fixture();
        let r = Interval::new("chr1", 10, 20);
        let predicate = OverlapPredicate::BpOverlap(1);
        let mut found = Vec::new();
        find_bed_ranges(&mut file, &[r], &predicate, |rec| {
            found.push((rec.start, rec.end));
            Ok(())
        })
        .unwrap();
        assert_eq!(found, vec![(5, 12), (15, 25)]);
    }

    #[test]
    fn binary_search_does_not_drop_a_long_spanning_left_overlapping_record() {
        // `chr1 2 6000` starts well upstream of the reference but extends
        // past its start, so it genuinely overlaps even though it sorts
        // before the reference under the plain total order. The binary
        // search's midpoint probe must land on it at some point in this
        // fixture given where its line falls relative to the file's byte
        // midpoint.
        let mut data = Vec::new();
        writeln!(data, "chr1\t0\t1").unwrap();
        writeln!(data, "chr1\t2\t6000").unwrap();
        writeln!(data, "chr1\t5050\t5060").unwrap();
        writeln!(data, "chr1\t7000\t7100").unwrap();
        let mut file = Cursor::new(data);
        let r = Interval::new("chr1", 5000, 5100);
        let predicate = OverlapPredicate::BpOverlap(1);
        let mut found = Vec::new();
        find_bed_ranges(&mut file, &[r], &predicate, |rec| {
            found.push((rec.start, rec.end));
            Ok(())
        })
        .unwrap();
        assert_eq!(found, vec![(2, 6000), (5050, 5060)], "the long-spanning record overlaps the reference by 100bp and must not be skipped");
    }

    #[test]
    fn scenario_4_chromosome_extraction() {
        let mut file = fixture();
        let whole_chrom = Interval::new("chr2", 0, crate::interval::MAX_COORD);
        let predicate = OverlapPredicate::BpOverlap(1);
        let mut found = Vec::new();
        find_bed_ranges(&mut file, &[whole_chrom], &predicate, |rec| {
            found.push(rec.chrom.to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(found, vec!["chr2".to_string()]);
    }

    #[test]
    fn byte_index_upper_bound_excludes_equal_and_lesser_keys() {
        let mut index = ByteIndex::new();
        index.record(Interval::new("chr1", 10, 20), 100);
        index.record(Interval::new("chr1", 30, 40), 200);
        let r = Interval::new("chr1", 15, 25);
        assert_eq!(index.upper_bound(&r), Some(200));
    }

    #[test]
    fn byte_index_accepts_monotone_order() {
        let mut index = ByteIndex::new();
        index.record(Interval::new("chr1", 10, 20), 100);
        assert!(index.check_consistent(200, &Interval::new("chr1", 30, 40)).is_ok());
    }

    #[test]
    fn byte_index_rejects_records_out_of_order_with_their_byte_position() {
        let mut index = ByteIndex::new();
        index.record(Interval::new("chr1", 30, 40), 200);
        let err = index.check_consistent(100, &Interval::new("chr1", 50, 60)).unwrap_err();
        assert!(matches!(err, BedError::CorruptSortOrder(_)), "a record earlier in the file must not sort after one later in the file");
    }

    #[test]
    fn byte_index_is_silent_when_nothing_contradicts_yet() {
        // A record with no indexed neighbors on either side of its offset
        // can't yet be proven inconsistent; the check only fires once two
        // probes actually disagree.
        let index = ByteIndex::new();
        assert!(index.check_consistent(50, &Interval::new("chr1", 10, 20)).is_ok());
    }
}
