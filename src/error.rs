//! Crate-wide error taxonomy.
//!
//! One variant per failure kind the core can raise. Every fallible entry
//! point returns `Result<_, BedError>`; nothing in the core recovers from a
//! fatal condition or attempts to resynchronize a stream after one.

use std::path::PathBuf;

use thiserror::Error;

/// A single diagnostic: a file path, an optional 1-based line number, and a
/// short message. Carried by the variants that need file/line context.
#[derive(Debug, Clone)]
pub struct Context {
    pub file: Option<PathBuf>,
    pub line: Option<u64>,
    pub message: String,
}

impl Context {
    pub fn new(message: impl Into<String>) -> Self {
        Context { file: None, line: None, message: message.into() }
    }

    pub fn at_line(file: impl Into<PathBuf>, line: u64, message: impl Into<String>) -> Self {
        Context { file: Some(file.into()), line: Some(line), message: message.into() }
    }

    /// A line number without a known file, filled in later by
    /// [`BedError::with_path`] once the caller knows which file it opened
    /// (parsing helpers like [`crate::reader::parse_bed_line`] are shared
    /// with callers, such as the byte-range finder, that have no path at
    /// hand).
    pub fn on_line(line: u64, message: impl Into<String>) -> Self {
        Context { file: None, line: Some(line), message: message.into() }
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file.display(), line, self.message),
            (Some(file), None) => write!(f, "{}: {}", file.display(), self.message),
            (None, _) => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Error)]
pub enum BedError {
    #[error("malformed record: {0}")]
    MalformedRecord(Context),

    #[error("ordering violation: {0}")]
    OrderingViolation(Context),

    #[error("predicate misconfiguration: {0}")]
    PredicateMisconfiguration(String),

    #[error("unseekable source: {0}")]
    UnseekableSource(String),

    #[error("corrupt sort order: {0}")]
    CorruptSortOrder(Context),

    #[error("truncated input: {0}")]
    Truncated(Context),

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("field too long: {0}")]
    FieldTooLong(Context),

    #[error("chromosome identifier too long: {0}")]
    ChromosomeTooLong(Context),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("broken pipe: {0}")]
    BrokenPipe(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BedError {
    /// Fills in a missing file path on the variants that carry a [`Context`],
    /// used by callers that know which file they opened but parse through a
    /// path-agnostic helper (e.g. [`crate::reader::parse_bed_line`]).
    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        fn fill(ctx: Context, path: impl Into<PathBuf>) -> Context {
            if ctx.file.is_some() {
                ctx
            } else {
                Context { file: Some(path.into()), ..ctx }
            }
        }
        match self {
            BedError::MalformedRecord(ctx) => BedError::MalformedRecord(fill(ctx, path)),
            BedError::OrderingViolation(ctx) => BedError::OrderingViolation(fill(ctx, path)),
            BedError::CorruptSortOrder(ctx) => BedError::CorruptSortOrder(fill(ctx, path)),
            BedError::Truncated(ctx) => BedError::Truncated(fill(ctx, path)),
            BedError::FieldTooLong(ctx) => BedError::FieldTooLong(fill(ctx, path)),
            BedError::ChromosomeTooLong(ctx) => BedError::ChromosomeTooLong(fill(ctx, path)),
            other => other,
        }
    }
}

/// `ChromosomeNotFound` is deliberately absent from `BedError`: per the
/// error taxonomy, a missing chromosome is silent empty output, not a
/// failure, so callers express it as `Ok` of zero emitted records rather
/// than as an `Err` variant.
pub const _CHROMOSOME_NOT_FOUND_IS_NOT_AN_ERROR: () = ();

/// Maps an error to a process exit code, favoring the standard POSIX codes
/// named in the external interface when they apply.
pub fn exit_code(err: &BedError) -> i32 {
    // Matches the POSIX errno values named in the spec's CLI surface:
    // EINVAL=22, ENOMEM=12, ENODATA=61, ENOENT=2.
    match err {
        BedError::PredicateMisconfiguration(_) => 22,
        BedError::OutOfMemory(_) => 12,
        BedError::Truncated(_) | BedError::CorruptSortOrder(_) | BedError::CorruptArchive(_) => 61,
        BedError::UnseekableSource(_) => 29, // ESPIPE
        BedError::BrokenPipe(_) => 32,       // EPIPE
        BedError::Io(io) => io.raw_os_error().unwrap_or(1),
        _ => 1,
    }
}

pub type Result<T> = std::result::Result<T, BedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_path_fills_in_a_missing_file() {
        let err = BedError::MalformedRecord(Context::on_line(3, "bad record"));
        let err = err.with_path("a.bed");
        assert_eq!(err.to_string(), "malformed record: a.bed:3: bad record");
    }

    #[test]
    fn with_path_does_not_override_an_existing_file() {
        let err = BedError::MalformedRecord(Context::at_line("first.bed", 3, "bad record"));
        let err = err.with_path("second.bed");
        assert_eq!(err.to_string(), "malformed record: first.bed:3: bad record");
    }

    #[test]
    fn with_path_is_a_no_op_on_variants_without_context() {
        let err = BedError::PredicateMisconfiguration("need exactly one selector".to_string());
        let err = err.with_path("a.bed");
        assert_eq!(err.to_string(), "predicate misconfiguration: need exactly one selector");
    }
}
