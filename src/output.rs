//! Row formatting for visitor emissions.
//!
//! Adapted from the teacher's `BedWriter` (`streaming/output.rs`): itoa for
//! integers on the hot path, `ryu` for the common case of default-precision
//! float formatting, falling back to `std`'s precision-controlled formatting
//! only when the caller has asked for a non-default precision or scientific
//! notation (ryu has no notion of either).

use crate::config::OutputConfig;

/// Precision value meaning "whatever `ryu` would print," i.e. no caller
/// override — matches [`OutputConfig::default`]'s `precision`.
pub const DEFAULT_PRECISION: usize = 6;

/// Accumulates one reference's emitted row: each visitor in a
/// [`crate::visitor::MultiVisitor`] appends one field (joining internal
/// multi-values with `multi_delim` itself), and the row as a whole joins
/// fields with `column_delim`.
pub struct RowBuilder<'a> {
    cfg: &'a OutputConfig,
    fields: Vec<String>,
    itoa: itoa::Buffer,
    ryu: ryu::Buffer,
}

impl<'a> RowBuilder<'a> {
    pub fn new(cfg: &'a OutputConfig) -> Self {
        RowBuilder { cfg, fields: Vec::new(), itoa: itoa::Buffer::new(), ryu: ryu::Buffer::new() }
    }

    pub fn push_str(&mut self, s: impl Into<String>) {
        self.fields.push(s.into());
    }

    pub fn push_int(&mut self, v: u64) {
        self.fields.push(self.itoa.format(v).to_string());
    }

    pub fn push_float(&mut self, v: f64) {
        let formatted = if self.cfg.scientific {
            format!("{:.*e}", self.cfg.precision, v)
        } else if self.cfg.precision == DEFAULT_PRECISION {
            self.ryu.format(v).to_string()
        } else {
            format!("{:.*}", self.cfg.precision, v)
        };
        self.fields.push(formatted);
    }

    /// Joins multiple values (e.g. one `echo-map-id` per window member) with
    /// the configured multi-value delimiter, or the unmapped placeholder if
    /// `values` is empty.
    pub fn push_joined(&mut self, values: impl Iterator<Item = String>) {
        let mut parts = values.peekable();
        if parts.peek().is_none() {
            self.fields.push(self.cfg.unmapped_value.clone());
            return;
        }
        self.fields.push(parts.collect::<Vec<_>>().join(&self.cfg.multi_delim));
    }

    pub fn push_unmapped(&mut self) {
        self.fields.push(self.cfg.unmapped_value.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn finish(self) -> String {
        self.fields.join(&self.cfg.column_delim)
    }
}
