//! Interval record and its orderings.
//!
//! Records are immutable once parsed; `chrom`/`id`/`rest` are boxed strings
//! rather than `String` so a fully-populated record costs one allocation
//! per field instead of carrying spare capacity.

use std::cmp::Ordering;

/// Maximum representable coordinate (`10^12 - 1`), matching the field-cap
/// table. Used as the sentinel span for "whole chromosome" references.
pub const MAX_COORD: u64 = 1_000_000_000_000 - 1;

#[cfg(not(feature = "megarow"))]
pub const MAX_CHROM_LEN: usize = 127;
#[cfg(feature = "megarow")]
pub const MAX_CHROM_LEN: usize = 1270;

#[cfg(not(feature = "megarow"))]
pub const MAX_ID_LEN: usize = 8191;
#[cfg(feature = "megarow")]
pub const MAX_ID_LEN: usize = 81910;

#[cfg(not(feature = "megarow"))]
pub const MAX_REST_LEN: usize = 32767;
#[cfg(feature = "megarow")]
pub const MAX_REST_LEN: usize = 327670;

/// A single genomic interval record: `chrom`, half-open `[start, end)`, and
/// optional id/score/rest payload (BED fields 4, 5, and 6+ respectively).
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub chrom: Box<str>,
    pub start: u64,
    pub end: u64,
    pub id: Option<Box<str>>,
    pub score: Option<f64>,
    pub rest: Option<Box<str>>,
    /// Construction-order tiebreaker standing in for the original source's
    /// pointer-identity comparison in `GenomicAddressCompare`: two records
    /// with the same (chrom, start, end) still need a stable strict order
    /// for use as set keys, and we have no stable object addresses in safe
    /// Rust to fall back on.
    pub(crate) seq: u64,
}

impl Interval {
    pub fn new(chrom: impl Into<Box<str>>, start: u64, end: u64) -> Self {
        Interval { chrom: chrom.into(), start, end, id: None, score: None, rest: None, seq: 0 }
    }

    pub fn with_id(mut self, id: impl Into<Box<str>>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_rest(mut self, rest: impl Into<Box<str>>) -> Self {
        self.rest = Some(rest.into());
        self
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty_span(&self) -> bool {
        self.start == self.end
    }

    /// Signed distance to `other`. Negative when `other` precedes `self`,
    /// zero when they overlap, `i64::MAX`/`i64::MIN` when on different
    /// chromosomes (standing in for the original's "infinity").
    pub fn distance(&self, other: &Interval) -> i64 {
        if self.chrom != other.chrom {
            return if self.chrom.as_ref() < other.chrom.as_ref() { i64::MAX } else { i64::MIN };
        }
        if self.end <= other.start {
            (other.start - self.end) as i64
        } else if other.end <= self.start {
            -((self.start - other.end) as i64)
        } else {
            0
        }
    }

    /// Non-negative overlap length against `other` (0 on different
    /// chromosomes or disjoint intervals).
    #[inline]
    pub fn overlap(&self, other: &Interval) -> u64 {
        if self.chrom != other.chrom {
            return 0;
        }
        let lo = self.start.max(other.start);
        let hi = self.end.min(other.end);
        hi.saturating_sub(lo)
    }

    /// Intersection, `None` when the two records do not overlap (including
    /// when they merely abut: `overlap == 0` is not an intersection).
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        if self.chrom != other.chrom {
            return None;
        }
        let lo = self.start.max(other.start);
        let hi = self.end.min(other.end);
        if lo >= hi {
            return None;
        }
        Some(Interval::new(self.chrom.clone(), lo, hi))
    }

    /// Union, defined only when the two records overlap or abut on the
    /// same chromosome.
    pub fn union_with(&self, other: &Interval) -> Option<Interval> {
        if self.chrom != other.chrom {
            return None;
        }
        if self.overlap(other) == 0 && self.start != other.end && other.start != self.end {
            return None;
        }
        Some(Interval::new(self.chrom.clone(), self.start.min(other.start), self.end.max(other.end)))
    }
}

/// `chrom` → `start` → `end`, the base total order (§3). Ties among
/// distinct records are not broken further; use `GenomicAddressOrder` when a
/// strict order over owned values is required (e.g. as a set/map key).
#[derive(Debug, Default, Clone, Copy)]
pub struct GenomicOrder;

impl GenomicOrder {
    pub fn cmp(&self, a: &Interval, b: &Interval) -> Ordering {
        a.chrom.cmp(&b.chrom).then_with(|| a.start.cmp(&b.start)).then_with(|| a.end.cmp(&b.end))
    }
}

/// `GenomicOrder`, ties broken by construction-order sequence number for a
/// strict total order over owned values — used to key the active window and
/// deferred-cache sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenomicAddressOrder;

impl GenomicAddressOrder {
    pub fn cmp(&self, a: &Interval, b: &Interval) -> Ordering {
        GenomicOrder.cmp(a, b).then_with(|| a.seq.cmp(&b.seq))
    }
}

/// Orders purely by `score`, ascending ("lesser") or descending
/// ("greater"). Records without a score sort as though scored `0.0`,
/// matching the original's `measurement()` accessor contract of always
/// returning a usable numeric value.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreOrderLesser;
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreOrderGreater;

fn score_of(iv: &Interval) -> f64 {
    iv.score.unwrap_or(0.0)
}

impl ScoreOrderLesser {
    pub fn cmp(&self, a: &Interval, b: &Interval) -> Ordering {
        score_of(a).partial_cmp(&score_of(b)).unwrap_or(Ordering::Equal)
    }
}

impl ScoreOrderGreater {
    pub fn cmp(&self, a: &Interval, b: &Interval) -> Ordering {
        ScoreOrderLesser.cmp(b, a)
    }
}

/// Score primary, `GenomicOrder` as tiebreak — used by `min-element`
/// (Lesser) / `max-element` (Greater) for a stable selection among ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreThenGenomicOrderLesser;
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreThenGenomicOrderGreater;

impl ScoreThenGenomicOrderLesser {
    pub fn cmp(&self, a: &Interval, b: &Interval) -> Ordering {
        score_of(a).partial_cmp(&score_of(b)).unwrap_or(Ordering::Equal).then_with(|| GenomicOrder.cmp(a, b))
    }
}

impl ScoreThenGenomicOrderGreater {
    /// Reverses only the score comparison, not the tiebreak: ties still
    /// resolve by ascending `GenomicOrder` (the first record by the total
    /// order wins) regardless of which score direction is active.
    pub fn cmp(&self, a: &Interval, b: &Interval) -> Ordering {
        score_of(b).partial_cmp(&score_of(a)).unwrap_or(Ordering::Equal).then_with(|| GenomicOrder.cmp(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_basic() {
        let a = Interval::new("chr1", 10, 20);
        let b = Interval::new("chr1", 15, 25);
        assert_eq!(a.overlap(&b), 5);
        assert_eq!(b.overlap(&a), 5);
    }

    #[test]
    fn overlap_different_chrom_is_zero() {
        let a = Interval::new("chr1", 10, 20);
        let b = Interval::new("chr2", 10, 20);
        assert_eq!(a.overlap(&b), 0);
    }

    #[test]
    fn zero_length_interval_overlaps_only_strictly_containing() {
        let point = Interval::new("chr1", 10, 10);
        let containing = Interval::new("chr1", 5, 15);
        let touching_start = Interval::new("chr1", 10, 20);
        assert_eq!(point.overlap(&containing), 0, "half-open point has zero measure so bp overlap is 0");
        assert_eq!(point.overlap(&touching_start), 0);
    }

    #[test]
    fn distance_signed_and_infinite_across_chrom() {
        let a = Interval::new("chr1", 100, 110);
        let b = Interval::new("chr1", 120, 130);
        assert_eq!(a.distance(&b), 10);
        assert_eq!(b.distance(&a), -10);
        let c = Interval::new("chr2", 0, 10);
        assert_eq!(a.distance(&c), i64::MAX);
        assert_eq!(c.distance(&a), i64::MIN);
    }

    #[test]
    fn genomic_order_is_chrom_then_start_then_end() {
        let a = Interval::new("chr1", 10, 20);
        let b = Interval::new("chr1", 10, 30);
        let c = Interval::new("chr2", 0, 1);
        assert_eq!(GenomicOrder.cmp(&a, &b), Ordering::Less);
        assert_eq!(GenomicOrder.cmp(&b, &c), Ordering::Less);
    }

    #[test]
    fn genomic_address_order_breaks_ties_by_sequence() {
        let mut a = Interval::new("chr1", 10, 20);
        let mut b = Interval::new("chr1", 10, 20);
        a.seq = 1;
        b.seq = 2;
        assert_eq!(GenomicAddressOrder.cmp(&a, &b), Ordering::Less);
        assert_eq!(GenomicOrder.cmp(&a, &b), Ordering::Equal);
    }

    #[test]
    fn score_then_genomic_picks_first_by_total_order_on_tie() {
        let a = Interval::new("chr1", 10, 20).with_score(5.0);
        let b = Interval::new("chr1", 30, 40).with_score(5.0);
        assert_eq!(ScoreThenGenomicOrderGreater.cmp(&a, &b), Ordering::Less, "ties resolve by genomic order, stable");
    }

    #[test]
    fn union_and_intersection() {
        let a = Interval::new("chr1", 10, 20);
        let b = Interval::new("chr1", 15, 25);
        assert_eq!(a.intersection(&b), Some(Interval::new("chr1", 15, 20)));
        assert_eq!(a.union_with(&b), Some(Interval::new("chr1", 10, 25)));
        let c = Interval::new("chr1", 30, 40);
        assert_eq!(a.intersection(&c), None);
        assert_eq!(a.union_with(&c), None);
    }
}
