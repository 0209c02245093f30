//! Window sweep (§4.4).
//!
//! Drives two sorted sequences — references and mapped records — through the
//! five lifecycle events (`OnStart`/`OnAdd`/`OnDelete`/`OnDone`/`OnEnd`)
//! against a pluggable [`OverlapPredicate`], maintaining an active window and
//! a deferred cache per the protocol in §4.4. Grounded in the teacher's
//! `ActiveSet`/Vec+head-index idiom (`streaming/active_set.rs`), generalized
//! from a single fixed expiry test to a predicate-driven one since the base
//! sweep cannot assume the no-nested-elements precondition the teacher's
//! streaming commands rely on.

use std::cmp::Ordering;

use crate::interval::{GenomicAddressOrder, Interval};
use crate::predicate::OverlapPredicate;
use crate::visitor::Visitor;

/// Source of already-ordered mapped records. Implemented by the streaming
/// reader; kept as a trait so the sweep never depends on `Read`/`Seek`.
pub trait MapSource {
    fn next_map(&mut self) -> crate::error::Result<Option<Interval>>;
}

fn insert_sorted(vec: &mut Vec<Interval>, item: Interval) {
    let idx = vec.partition_point(|existing| GenomicAddressOrder.cmp(existing, &item) == Ordering::Less);
    vec.insert(idx, item);
}

/// Removes every element matching `pred` from `vec`, preserving the relative
/// order of both the kept and removed elements.
fn partition_out(vec: &mut Vec<Interval>, mut pred: impl FnMut(&Interval) -> bool) -> Vec<Interval> {
    let mut kept = Vec::with_capacity(vec.len());
    let mut removed = Vec::new();
    for item in vec.drain(..) {
        if pred(&item) {
            removed.push(item);
        } else {
            kept.push(item);
        }
    }
    *vec = kept;
    removed
}

/// Full deferred-cache sweep: sound for every predicate in the family,
/// including ones where a fully-nested map element must re-enter the window
/// for a later reference after being stepped over by an earlier one.
pub struct WindowSweep {
    predicate: OverlapPredicate,
    active: Vec<Interval>,
    deferred: Vec<Interval>,
    pending_map: Option<Interval>,
    map_done: bool,
}

impl WindowSweep {
    pub fn new(predicate: OverlapPredicate) -> Self {
        WindowSweep { predicate, active: Vec::new(), deferred: Vec::new(), pending_map: None, map_done: false }
    }

    fn fill_pending(&mut self, map: &mut dyn MapSource) -> crate::error::Result<()> {
        if self.pending_map.is_none() && !self.map_done {
            self.pending_map = map.next_map()?;
            if self.pending_map.is_none() {
                self.map_done = true;
            }
        }
        Ok(())
    }

    /// Reads ahead from `map` into the deferred cache until the pending
    /// record can no longer possibly overlap `r` (or any reference that
    /// precedes `r` in the total order — those have already been consumed).
    fn read_ahead(&mut self, r: &Interval, map: &mut dyn MapSource) -> crate::error::Result<()> {
        let (_, upper) = self.predicate.expanded_reference(r);
        loop {
            self.fill_pending(map)?;
            let Some(pending) = &self.pending_map else { break };
            let still_reachable = match pending.chrom.as_ref().cmp(r.chrom.as_ref()) {
                Ordering::Less => true,
                Ordering::Equal => pending.start <= upper,
                Ordering::Greater => false,
            };
            if !still_reachable {
                break;
            }
            let rec = self.pending_map.take().unwrap();
            insert_sorted(&mut self.deferred, rec);
        }
        Ok(())
    }

    /// A member behind `r` (and hence behind every later reference on the
    /// same chromosome, since reference starts are non-decreasing) can be
    /// purged unconditionally: §4.4's conservative check collapses to this
    /// single comparison once read-ahead has established there is nothing
    /// left upstream of it still to arrive.
    fn is_purgeable(&self, m: &Interval, r: &Interval) -> bool {
        let (lower, _) = self.predicate.expanded_reference(r);
        match m.chrom.as_ref().cmp(r.chrom.as_ref()) {
            Ordering::Less => true,
            Ordering::Equal => m.end <= lower,
            Ordering::Greater => false,
        }
    }

    /// Advances the sweep to reference `r`, issuing the Delete/Add pair for
    /// this `OnStart` to `visitor`, then purging both sets.
    fn advance(&mut self, r: &Interval, map: &mut dyn MapSource, visitor: &mut dyn Visitor) -> crate::error::Result<()> {
        self.read_ahead(r, map)?;

        let predicate = self.predicate;
        let leaving = partition_out(&mut self.active, |m| !predicate.is_overlapping(r, m));
        for m in &leaving {
            visitor.on_delete(m);
        }
        self.deferred.extend(leaving);
        self.deferred.sort_by(|a, b| GenomicAddressOrder.cmp(a, b));

        let entering = partition_out(&mut self.deferred, |m| predicate.is_overlapping(r, m));
        for m in &entering {
            visitor.on_add(m);
        }
        self.active.extend(entering);
        self.active.sort_by(|a, b| GenomicAddressOrder.cmp(a, b));

        self.active.retain(|m| !self.is_purgeable(m, r));
        self.deferred.retain(|m| !self.is_purgeable(m, r));
        Ok(())
    }

    /// Drains any remaining map records to EOF without emitting further
    /// events, matching `--sweep-all`'s "read target to EOF even after all
    /// references done" contract (prevents a broken pipe upstream).
    pub fn drain_map(&mut self, map: &mut dyn MapSource) -> crate::error::Result<()> {
        while map.next_map()?.is_some() {}
        Ok(())
    }

    /// Runs the full per-reference sweep, delivering the five lifecycle
    /// events to `visitor` and calling `emit` once per reference between
    /// `OnDone` and the next `OnStart`.
    pub fn run(
        &mut self,
        mut references: impl Iterator<Item = crate::error::Result<Interval>>,
        map: &mut dyn MapSource,
        visitor: &mut dyn Visitor,
        mut emit: impl FnMut(&Interval, &[Interval], &mut dyn Visitor) -> crate::error::Result<()>,
        sweep_all: bool,
    ) -> crate::error::Result<()> {
        while let Some(r) = references.next().transpose()? {
            visitor.on_start(&r);
            self.advance(&r, map, visitor)?;
            emit(&r, &self.active, visitor)?;
        }
        if sweep_all {
            self.drain_map(map)?;
        }
        visitor.on_end();
        Ok(())
    }
}

/// Accelerated, deferred-cache-free sweep (`--faster`). Sound only under the
/// caller's precondition that the map stream contains no fully-nested
/// elements and the predicate is monotone in genomic distance — see
/// [`OverlapPredicate::supports_faster_sweep`]. Grounded directly in the
/// teacher's `streaming_window`/`streaming_coverage` Vec+head-index expiry
/// loop, generalized to be predicate-driven instead of hardwired to a
/// symmetric window.
pub struct FastSweep {
    predicate: OverlapPredicate,
    active: Vec<Interval>,
    head: usize,
    pending_map: Option<Interval>,
    map_done: bool,
}

const COMPACTION_THRESHOLD: usize = 4096;

impl FastSweep {
    pub fn new(predicate: OverlapPredicate) -> Self {
        assert!(predicate.supports_faster_sweep(), "predicate does not support the accelerated sweep path");
        FastSweep { predicate, active: Vec::new(), head: 0, pending_map: None, map_done: false }
    }

    fn fill_pending(&mut self, map: &mut dyn MapSource) -> crate::error::Result<()> {
        if self.pending_map.is_none() && !self.map_done {
            self.pending_map = map.next_map()?;
            if self.pending_map.is_none() {
                self.map_done = true;
            }
        }
        Ok(())
    }

    fn compact(&mut self) {
        if self.head > COMPACTION_THRESHOLD && self.head * 2 > self.active.len() {
            self.active.drain(0..self.head);
            self.head = 0;
        }
    }

    pub fn run(
        &mut self,
        mut references: impl Iterator<Item = crate::error::Result<Interval>>,
        map: &mut dyn MapSource,
        visitor: &mut dyn Visitor,
        mut emit: impl FnMut(&Interval, &[Interval], &mut dyn Visitor) -> crate::error::Result<()>,
        sweep_all: bool,
    ) -> crate::error::Result<()> {
        while let Some(r) = references.next().transpose()? {
            visitor.on_start(&r);
            let (lower, upper) = self.predicate.expanded_reference(&r);

            while self.head < self.active.len() {
                let candidate = &self.active[self.head];
                let expired = candidate.chrom.as_ref() < r.chrom.as_ref() || (candidate.chrom.as_ref() == r.chrom.as_ref() && candidate.end <= lower);
                if !expired {
                    break;
                }
                let left = self.active[self.head].clone();
                visitor.on_delete(&left);
                self.head += 1;
            }
            self.compact();

            loop {
                self.fill_pending(map)?;
                let Some(pending) = &self.pending_map else { break };
                let within_reach = match pending.chrom.as_ref().cmp(r.chrom.as_ref()) {
                    Ordering::Less => true,
                    Ordering::Equal => pending.start <= upper,
                    Ordering::Greater => false,
                };
                if !within_reach {
                    break;
                }
                let rec = self.pending_map.take().unwrap();
                if self.predicate.is_overlapping(&r, &rec) {
                    visitor.on_add(&rec);
                    self.active.push(rec);
                }
            }

            let window = &self.active[self.head..];
            emit(&r, window, visitor)?;
        }
        if sweep_all {
            while map.next_map()?.is_some() {}
        }
        visitor.on_end();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visitor::VisitorKind;

    struct VecMapSource {
        items: std::vec::IntoIter<Interval>,
    }
    impl VecMapSource {
        fn new(items: Vec<Interval>) -> Self {
            VecMapSource { items: items.into_iter() }
        }
    }
    impl MapSource for VecMapSource {
        fn next_map(&mut self) -> crate::error::Result<Option<Interval>> {
            Ok(self.items.next())
        }
    }

    fn iv(chrom: &str, s: u64, e: u64) -> Interval {
        Interval::new(chrom, s, e)
    }

    #[test]
    fn scenario_1_bp_overlap_count() {
        let refs = vec![iv("chr1", 10, 20), iv("chr1", 100, 110)];
        let map = vec![iv("chr1", 5, 12), iv("chr1", 15, 25), iv("chr1", 109, 111)];
        let mut sweep = WindowSweep::new(OverlapPredicate::BpOverlap(1));
        let mut source = VecMapSource::new(map);
        let mut visitor = VisitorKind::Count { count: 0 };
        let mut counts = Vec::new();
        sweep
            .run(
                refs.into_iter().map(Ok),
                &mut source,
                &mut visitor,
                |_r, window, _v| {
                    counts.push(window.len());
                    Ok(())
                },
                false,
            )
            .unwrap();
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn fully_nested_element_reenters_window() {
        // A big map element nested under an early reference but relevant to
        // a later one must survive in the deferred cache past being
        // stepped over once.
        let refs = vec![iv("chr1", 0, 5), iv("chr1", 50, 60)];
        let map = vec![iv("chr1", 0, 100)];
        let mut sweep = WindowSweep::new(OverlapPredicate::BpOverlap(1));
        let mut source = VecMapSource::new(map);
        let mut visitor = VisitorKind::Count { count: 0 };
        let mut counts = Vec::new();
        sweep
            .run(
                refs.into_iter().map(Ok),
                &mut source,
                &mut visitor,
                |_r, window, _v| {
                    counts.push(window.len());
                    Ok(())
                },
                false,
            )
            .unwrap();
        assert_eq!(counts, vec![1, 1], "the nested element overlaps both references");
    }
}
