//! Streaming reader (§4.1).
//!
//! Produces a lazy, finite, forward-only sequence of `Interval` records from
//! a sorted source: a plain BED file, standard input, or (by contract only —
//! see `ArchiveCodec`) a compressed archive. Headers are skipped unless the
//! caller opts into pass-through, in which case they surface as synthetic
//! `_header` pseudo-records.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use crate::error::{BedError, Context, Result};
use crate::interval::{Interval, MAX_CHROM_LEN, MAX_COORD, MAX_ID_LEN, MAX_REST_LEN};
use crate::predicate::OverlapPredicate;
use crate::rangefinder::{locate_first_possible_offset, ByteIndex};

/// Starch archives are identified by this magic prefix; the core never
/// decodes the bitstream itself (§6) — it only recognizes the tag and
/// delegates to whatever `ArchiveCodec` the driver supplies.
pub const STARCH_MAGIC: &[u8] = b"\x7e#\x00";

pub fn looks_like_starch(bytes: &[u8]) -> bool {
    bytes.starts_with(STARCH_MAGIC)
}

/// Parses one tab-delimited BED line into an [`Interval`], shared by the
/// streaming reader and the byte-range finder's probing reads (§4.6), which
/// have no `BedReader` of their own to parse through.
pub fn parse_bed_line(line: &str, line_number: u64) -> Result<Interval> {
    let mut fields = line.splitn(6, '\t');
    let chrom = fields.next().unwrap_or("");
    let start_s = fields.next();
    let end_s = fields.next();
    let (start_s, end_s) = match (start_s, end_s) {
        (Some(s), Some(e)) => (s, e),
        _ => return Err(BedError::MalformedRecord(Context::on_line(line_number, "fewer than three whitespace-delimited tokens".to_string()))),
    };
    if chrom.is_empty() {
        return Err(BedError::MalformedRecord(Context::on_line(line_number, "empty chromosome field".to_string())));
    }
    if chrom.len() > MAX_CHROM_LEN {
        return Err(BedError::ChromosomeTooLong(Context::on_line(line_number, format!("chromosome field exceeds {MAX_CHROM_LEN} bytes"))));
    }
    let start: u64 = start_s
        .parse()
        .map_err(|_| BedError::MalformedRecord(Context::on_line(line_number, format!("start is not an unsigned integer: {start_s:?}"))))?;
    let end: u64 = end_s
        .parse()
        .map_err(|_| BedError::MalformedRecord(Context::on_line(line_number, format!("end is not an unsigned integer: {end_s:?}"))))?;
    if start > end {
        return Err(BedError::MalformedRecord(Context::on_line(line_number, format!("start ({start}) > end ({end})"))));
    }
    let mut iv = Interval::new(chrom, start, end);
    if let Some(rest_fields) = fields.next() {
        let mut rf = rest_fields.splitn(2, '\t');
        if let Some(id) = rf.next() {
            if !id.is_empty() {
                if id.len() > MAX_ID_LEN {
                    return Err(BedError::FieldTooLong(Context::on_line(line_number, format!("id field exceeds {MAX_ID_LEN} bytes"))));
                }
                iv = iv.with_id(id);
            }
        }
        if let Some(score_and_rest) = rf.next() {
            let mut sr = score_and_rest.splitn(2, '\t');
            if let Some(score_s) = sr.next() {
                if let Ok(score) = score_s.parse::<f64>() {
                    iv = iv.with_score(score);
                }
            }
            if let Some(rest) = sr.next() {
                if rest.len() > MAX_REST_LEN {
                    return Err(BedError::FieldTooLong(Context::on_line(line_number, format!("trailing field exceeds {MAX_REST_LEN} bytes"))));
                }
                iv = iv.with_rest(rest);
            }
        }
    }
    Ok(iv)
}

/// The boundary the core exposes to a compressed-archive codec: a lazy
/// sequence of already-decoded records. No bitstream details cross this
/// trait, matching the spec's "opaque to the core" contract.
pub trait ArchiveCodec {
    fn next_record(&mut self) -> Result<Option<Interval>>;
    fn chromosomes(&mut self) -> Result<Vec<String>>;
}

/// Recognizes the Starch magic prefix but declines to decode it — the real
/// bitstream format is out of scope for this crate. A real codec can
/// implement `ArchiveCodec` and be substituted without touching the reader,
/// sweep, or extractor.
pub struct NullCodec;

impl ArchiveCodec for NullCodec {
    fn next_record(&mut self) -> Result<Option<Interval>> {
        Err(BedError::CorruptArchive("Starch codec not available in this build".into()))
    }
    fn chromosomes(&mut self) -> Result<Vec<String>> {
        Err(BedError::CorruptArchive("Starch codec not available in this build".into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    PlainBed,
    Stdin,
    Starch,
}

/// A streaming BED reader over any `Read` source. Seeking (and therefore
/// chromosome-filtered fast-forward via the byte-range finder, and
/// restartability) is only available when `R: Seek` — see
/// `BedReader::<File>::seek_to_chromosome`.
pub struct BedReader<R> {
    reader: BufReader<R>,
    line_number: u64,
    header_done: bool,
    kind: SourceKind,
    error_check: bool,
    header_passthrough: bool,
    last_record: Option<Interval>,
    next_seq: u64,
    header_pseudo_index: u64,
    path: Option<PathBuf>,
}

impl BedReader<File> {
    pub fn from_path(path: impl AsRef<Path>, error_check: bool, header_passthrough: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(BedError::Io)?;
        let mut magic = [0u8; 3];
        let mut probe = BufReader::new(&file);
        let n = probe.read(&mut magic).unwrap_or(0);
        if n == 3 && looks_like_starch(&magic) {
            return Err(BedError::CorruptArchive(format!(
                "{}: Starch archives require an ArchiveCodec; the plain-BED reader cannot open this file",
                path.display()
            )));
        }
        let file = File::open(path).map_err(BedError::Io)?;
        let mut reader = Self::new(file, SourceKind::PlainBed, error_check, header_passthrough);
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }
}

impl<R: Read> BedReader<R> {
    pub fn new(inner: R, kind: SourceKind, error_check: bool, header_passthrough: bool) -> Self {
        BedReader {
            reader: BufReader::with_capacity(crate::buffers::DEFAULT_INPUT_BUFFER, inner),
            line_number: 0,
            header_done: false,
            kind,
            error_check,
            header_passthrough,
            last_record: None,
            next_seq: 0,
            header_pseudo_index: 0,
            path: None,
        }
    }

    pub fn stdin(stdin: R, error_check: bool, header_passthrough: bool) -> Self {
        Self::new(stdin, SourceKind::Stdin, error_check, header_passthrough)
    }

    /// Attaches the source path so subsequent parse/ordering errors name the
    /// file, even when constructed via [`BedReader::new`] rather than
    /// [`BedReader::from_path`] (e.g. the driver already holds an open
    /// `File` it wants to tag).
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn tag_path(&self, err: BedError) -> BedError {
        match &self.path {
            Some(path) => err.with_path(path.clone()),
            None => err,
        }
    }

    fn is_header_line(line: &str) -> bool {
        let first_word = line.split_whitespace().next().unwrap_or("");
        let first_char = line.chars().next().unwrap_or('\0');
        first_word == "browser" || first_word == "track" || first_char == '#' || first_char == '@'
    }

    /// Reads the next record, returning `None` at EOF. Headers are consumed
    /// transparently (optionally surfaced as pseudo-records first, in file
    /// order, before the first real record).
    pub fn read_record(&mut self) -> Result<Option<Interval>> {
        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line).map_err(BedError::Io)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() {
                continue;
            }
            if !self.header_done && Self::is_header_line(trimmed) {
                if self.header_passthrough {
                    let idx = self.header_pseudo_index;
                    self.header_pseudo_index += 1;
                    return Ok(Some(Interval::new("_header", idx, idx + 1).with_rest(trimmed.to_string())));
                }
                continue;
            }
            self.header_done = true;
            let record = self.parse_line(trimmed).map_err(|e| self.tag_path(e))?;
            if self.error_check {
                if let Some(prev) = &self.last_record {
                    if crate::interval::GenomicOrder.cmp(prev, &record) == std::cmp::Ordering::Greater {
                        return Err(self.tag_path(BedError::OrderingViolation(Context::on_line(
                            self.line_number,
                            format!(
                                "record out of order: {}:{}-{} follows {}:{}-{}",
                                record.chrom, record.start, record.end, prev.chrom, prev.start, prev.end
                            ),
                        ))));
                    }
                }
            }
            let seq = self.next_seq;
            self.next_seq += 1;
            let mut record = record;
            record.seq = seq;
            self.last_record = Some(record.clone());
            return Ok(Some(record));
        }
    }

    fn parse_line(&self, line: &str) -> Result<Interval> {
        parse_bed_line(line, self.line_number)
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}

impl<R: Read + Seek> BedReader<R> {
    /// Restarts the reader at the beginning of the source. Only meaningful
    /// when the underlying source is seekable, matching the contract "the
    /// reader is restartable only when the source is seekable."
    pub fn restart(&mut self) -> Result<()> {
        self.reader.get_mut().seek(std::io::SeekFrom::Start(0)).map_err(BedError::Io)?;
        self.line_number = 0;
        self.header_done = false;
        self.last_record = None;
        Ok(())
    }

    /// Jumps straight to the first record of `chrom`, skipping every record
    /// of every chromosome ahead of it — the seekable chromosome-filter fast
    /// path (§4.1), which delegates the initial seek to the byte-range
    /// finder (§4.6) rather than scanning record by record. `BufReader<R>`
    /// implements `Seek` directly when `R: Seek`, so the finder can probe
    /// through `self.reader` without reaching into the inner source, and
    /// seeking through it (rather than through `self.reader.get_mut()`)
    /// correctly discards any buffered bytes left over from before the jump.
    pub fn seek_to_chromosome(&mut self, chrom: &str) -> Result<()> {
        let target = Interval::new(chrom, 0, MAX_COORD);
        let mut index = ByteIndex::new();
        let offset = locate_first_possible_offset(&mut self.reader, &target, &OverlapPredicate::BpOverlap(1), &mut index, 0).map_err(|e| self.tag_path(e))?;
        self.reader.seek(std::io::SeekFrom::Start(offset)).map_err(BedError::Io)?;
        self.header_done = true;
        self.last_record = None;
        Ok(())
    }
}

/// Collects every record from `source`, used by small fixtures and
/// non-streaming commands that genuinely need the whole file in memory
/// (the chromosome-scoped extractor and window sweep never do this).
pub fn read_all<R: Read>(source: R, error_check: bool) -> Result<Vec<Interval>> {
    let mut reader = BedReader::new(source, SourceKind::Stdin, error_check, false);
    let mut out = Vec::new();
    while let Some(record) = reader.read_record()? {
        out.push(record);
    }
    Ok(out)
}
