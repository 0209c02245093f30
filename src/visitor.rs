//! Visitor framework (§4.5).
//!
//! A visitor observes the sweep's five lifecycle events and emits a row per
//! reference. Per the cyclic-ownership redesign note (§9), visitors never
//! retain a raw pointer into the sweep's window: `on_done` is handed a
//! borrowed slice of the current window for the duration of the call, and
//! any visitor that must keep a record past that (`MinElement`/`MaxElement`)
//! clones it into its own state.
//!
//! Re-architected per §9's "deep visitor inheritance" note as a closed
//! `enum VisitorKind` dispatched by `match` rather than a trait-object
//! hierarchy, since every visitor kind named in the CLI surface is known at
//! compile time and a flat match avoids a vtable in the per-reference hot
//! path.

use std::collections::BTreeSet;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::interval::{Interval, ScoreThenGenomicOrderGreater, ScoreThenGenomicOrderLesser};
use crate::output::RowBuilder;

/// Polymorphic observer over `{OnStart, OnAdd, OnDelete, OnDone, OnEnd}`.
/// Every method has a default no-op body: a concrete visitor only overrides
/// the ones its statistic actually needs, and most of the table computes
/// straight from the window slice `on_done` receives rather than maintaining
/// incremental state.
pub trait Visitor {
    fn on_start(&mut self, _reference: &Interval) {}
    fn on_add(&mut self, _map: &Interval) {}
    fn on_delete(&mut self, _map: &Interval) {}
    fn on_done(&mut self, reference: &Interval, window: &[Interval], row: &mut RowBuilder<'_>);
    fn on_end(&mut self) {}
}

fn format_full_row(iv: &Interval) -> String {
    let mut s = format!("{}\t{}\t{}", iv.chrom, iv.start, iv.end);
    if let Some(id) = &iv.id {
        s.push('\t');
        s.push_str(id);
        if let Some(score) = iv.score {
            s.push('\t');
            s.push_str(&score.to_string());
            if let Some(rest) = &iv.rest {
                s.push('\t');
                s.push_str(rest);
            }
        }
    }
    s
}

fn span(iv: &Interval) -> String {
    format!("{}:{}-{}", iv.chrom, iv.start, iv.end)
}

fn scores(window: &[Interval]) -> Vec<f64> {
    window.iter().map(|m| m.score.unwrap_or(0.0)).collect()
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn variance_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean_of(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn median_of(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

fn sorted_scores(window: &[Interval]) -> Vec<f64> {
    let mut v = scores(window);
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    v
}

/// Quantile by nearest-rank on a pre-sorted slice; `q` in `[0, 1]`.
fn kth_of(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let q = q.clamp(0.0, 1.0);
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Trims `lo`/`hi` fractions off each end of a pre-sorted slice before
/// averaging what remains.
fn tmean_of(sorted: &[f64], lo: f64, hi: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let drop_lo = ((n as f64) * lo).floor() as usize;
    let drop_hi = ((n as f64) * hi).floor() as usize;
    if drop_lo + drop_hi >= n {
        return 0.0;
    }
    mean_of(&sorted[drop_lo..n - drop_hi])
}

fn wmean_of(reference: &Interval, window: &[Interval]) -> f64 {
    let ref_len = reference.length();
    if ref_len == 0 || window.is_empty() {
        return 0.0;
    }
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for m in window {
        let weight = reference.overlap(m) as f64 / ref_len as f64;
        weighted_sum += weight * m.score.unwrap_or(0.0);
        weight_total += weight;
    }
    if weight_total == 0.0 {
        0.0
    } else {
        weighted_sum / weight_total
    }
}

/// Length of `union(m ∩ reference)` over every `m` in the window — merges
/// the per-member clips against `reference` and sums the merged span.
fn bases_uniq_of(reference: &Interval, window: &[Interval]) -> u64 {
    let mut clips: Vec<(u64, u64)> = window
        .iter()
        .filter_map(|m| {
            let lo = reference.start.max(m.start);
            let hi = reference.end.min(m.end);
            if lo < hi {
                Some((lo, hi))
            } else {
                None
            }
        })
        .collect();
    clips.sort_unstable();
    let mut total = 0u64;
    let mut cur: Option<(u64, u64)> = None;
    for (s, e) in clips.drain(..) {
        cur = match cur {
            None => Some((s, e)),
            Some((cs, ce)) if s <= ce => Some((cs, ce.max(e))),
            Some((cs, ce)) => {
                total += ce - cs;
                Some((s, e))
            }
        };
    }
    if let Some((cs, ce)) = cur {
        total += ce - cs;
    }
    total
}

fn pick_extreme<'a>(window: &'a [Interval], greater: bool) -> Option<&'a Interval> {
    window.iter().fold(None, |best, cand| match best {
        None => Some(cand),
        Some(b) => {
            let ord = if greater {
                ScoreThenGenomicOrderGreater.cmp(cand, b)
            } else {
                ScoreThenGenomicOrderLesser.cmp(cand, b)
            };
            if ord == std::cmp::Ordering::Less {
                Some(cand)
            } else {
                Some(b)
            }
        }
    })
}

fn pick_extreme_rand<'a>(window: &'a [Interval], greater: bool, rng: &mut SmallRng) -> Option<&'a Interval> {
    let Some(best) = pick_extreme(window, greater) else { return None };
    let best_score = best.score.unwrap_or(0.0);
    let ties: Vec<&Interval> = window.iter().filter(|m| m.score.unwrap_or(0.0) == best_score).collect();
    if ties.len() <= 1 {
        return Some(best);
    }
    let idx = rng.gen_range(0..ties.len());
    Some(ties[idx])
}

pub enum VisitorKind {
    Count { count: usize },
    Indicator,
    Bases,
    BasesUniq,
    BasesUniqFraction,
    Sum,
    Mean,
    Variance,
    Stdev,
    Cv,
    Median,
    Mad { multiplier: f64 },
    Min,
    Max,
    WMean,
    TMean { lo: f64, hi: f64 },
    Kth { q: f64 },
    MinElement,
    MaxElement,
    MinElementRand { rng: SmallRng },
    MaxElementRand { rng: SmallRng },
    EchoRef,
    EchoRefLength,
    EchoRefSpan,
    EchoRefRowId { next_id: u64 },
    EchoMapAll,
    EchoMapId,
    EchoMapIdUniq,
    EchoMapRange,
    EchoMapScore,
    EchoMapSize,
    EchoOverlapSize,
}

impl VisitorKind {
    pub fn min_element_rand() -> Self {
        VisitorKind::MinElementRand { rng: SmallRng::from_entropy() }
    }

    pub fn max_element_rand() -> Self {
        VisitorKind::MaxElementRand { rng: SmallRng::from_entropy() }
    }
}

impl Visitor for VisitorKind {
    fn on_start(&mut self, _reference: &Interval) {
        if let VisitorKind::Count { count } = self {
            *count = 0;
        }
    }

    fn on_done(&mut self, reference: &Interval, window: &[Interval], row: &mut RowBuilder<'_>) {
        match self {
            VisitorKind::Count { .. } => row.push_int(window.len() as u64),
            VisitorKind::Indicator => row.push_int(if window.is_empty() { 0 } else { 1 }),
            VisitorKind::Bases => {
                let sum: u64 = window.iter().map(|m| reference.overlap(m)).sum();
                row.push_int(sum);
            }
            VisitorKind::BasesUniq => row.push_int(bases_uniq_of(reference, window)),
            VisitorKind::BasesUniqFraction => {
                let uniq = bases_uniq_of(reference, window);
                let frac = if reference.length() == 0 { 0.0 } else { uniq as f64 / reference.length() as f64 };
                row.push_float(frac);
            }
            // The numeric-statistics family has no value to report over an
            // empty window — there is no score to sum, no midpoint to a
            // median of nothing — so each emits the unmapped placeholder
            // instead of a degenerate `0.0`/`inf` computed over an empty
            // slice, matching the original's `Signal::NaN` path through
            // `PrintScorePrecision` (`ProcessBedVisitorRow.hpp`).
            VisitorKind::Sum if window.is_empty() => row.push_unmapped(),
            VisitorKind::Sum => row.push_float(scores(window).iter().sum()),
            VisitorKind::Mean if window.is_empty() => row.push_unmapped(),
            VisitorKind::Mean => row.push_float(mean_of(&scores(window))),
            VisitorKind::Variance if window.is_empty() => row.push_unmapped(),
            VisitorKind::Variance => row.push_float(variance_of(&scores(window))),
            VisitorKind::Stdev if window.is_empty() => row.push_unmapped(),
            VisitorKind::Stdev => row.push_float(variance_of(&scores(window)).sqrt()),
            VisitorKind::Cv if window.is_empty() => row.push_unmapped(),
            VisitorKind::Cv => {
                let s = scores(window);
                let m = mean_of(&s);
                let cv = if m == 0.0 { 0.0 } else { variance_of(&s).sqrt() / m };
                row.push_float(cv);
            }
            VisitorKind::Median if window.is_empty() => row.push_unmapped(),
            VisitorKind::Median => row.push_float(median_of(&sorted_scores(window))),
            VisitorKind::Mad { .. } if window.is_empty() => row.push_unmapped(),
            VisitorKind::Mad { multiplier } => {
                let sorted = sorted_scores(window);
                let med = median_of(&sorted);
                let mut deviations: Vec<f64> = sorted.iter().map(|x| (x - med).abs()).collect();
                deviations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                row.push_float(*multiplier * median_of(&deviations));
            }
            VisitorKind::Min if window.is_empty() => row.push_unmapped(),
            VisitorKind::Min => row.push_float(scores(window).into_iter().fold(f64::INFINITY, f64::min)),
            VisitorKind::Max if window.is_empty() => row.push_unmapped(),
            VisitorKind::Max => row.push_float(scores(window).into_iter().fold(f64::NEG_INFINITY, f64::max)),
            VisitorKind::WMean if window.is_empty() => row.push_unmapped(),
            VisitorKind::WMean => row.push_float(wmean_of(reference, window)),
            VisitorKind::TMean { .. } if window.is_empty() => row.push_unmapped(),
            VisitorKind::TMean { lo, hi } => row.push_float(tmean_of(&sorted_scores(window), *lo, *hi)),
            VisitorKind::Kth { .. } if window.is_empty() => row.push_unmapped(),
            VisitorKind::Kth { q } => row.push_float(kth_of(&sorted_scores(window), *q)),
            VisitorKind::MinElement => match pick_extreme(window, false) {
                Some(m) => row.push_str(format_full_row(m)),
                None => row.push_unmapped(),
            },
            VisitorKind::MaxElement => match pick_extreme(window, true) {
                Some(m) => row.push_str(format_full_row(m)),
                None => row.push_unmapped(),
            },
            VisitorKind::MinElementRand { rng } => match pick_extreme_rand(window, false, rng) {
                Some(m) => row.push_str(format_full_row(m)),
                None => row.push_unmapped(),
            },
            VisitorKind::MaxElementRand { rng } => match pick_extreme_rand(window, true, rng) {
                Some(m) => row.push_str(format_full_row(m)),
                None => row.push_unmapped(),
            },
            VisitorKind::EchoRef => row.push_str(format_full_row(reference)),
            VisitorKind::EchoRefLength => row.push_int(reference.length()),
            VisitorKind::EchoRefSpan => row.push_str(span(reference)),
            VisitorKind::EchoRefRowId { next_id } => {
                row.push_int(*next_id);
                *next_id += 1;
            }
            VisitorKind::EchoMapAll => row.push_joined(window.iter().map(format_full_row)),
            VisitorKind::EchoMapId => row.push_joined(window.iter().filter_map(|m| m.id.as_ref().map(|s| s.to_string()))),
            VisitorKind::EchoMapIdUniq => {
                let uniq: BTreeSet<String> = window.iter().filter_map(|m| m.id.as_ref().map(|s| s.to_string())).collect();
                row.push_joined(uniq.into_iter());
            }
            VisitorKind::EchoMapRange => row.push_joined(window.iter().map(span)),
            VisitorKind::EchoMapScore => row.push_joined(window.iter().map(|m| m.score.unwrap_or(0.0).to_string())),
            VisitorKind::EchoMapSize => row.push_joined(window.iter().map(|m| m.length().to_string())),
            VisitorKind::EchoOverlapSize => row.push_joined(window.iter().map(|m| reference.overlap(m).to_string())),
        }
    }
}

/// Composes an ordered list of visitors and emits each into a shared
/// [`RowBuilder`], joined by the configured column delimiter. Emission order
/// is fixed at construction (the order operations were given on the command
/// line). When the window is empty and the caller opted into
/// `skip_unmapped`, the whole row is suppressed.
pub struct MultiVisitor {
    visitors: Vec<VisitorKind>,
}

impl MultiVisitor {
    pub fn new(visitors: Vec<VisitorKind>) -> Self {
        MultiVisitor { visitors }
    }

    /// Returns `None` when the window is empty and `skip_unmapped` is set,
    /// otherwise the finished row text (without trailing newline).
    pub fn emit(&mut self, reference: &Interval, window: &[Interval], cfg: &crate::config::OutputConfig) -> Option<String> {
        if window.is_empty() && cfg.skip_unmapped {
            return None;
        }
        let mut row = RowBuilder::new(cfg);
        for v in &mut self.visitors {
            v.on_done(reference, window, &mut row);
        }
        Some(row.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;

    fn iv(s: u64, e: u64) -> Interval {
        Interval::new("chr1", s, e)
    }

    #[test]
    fn count_and_indicator() {
        let cfg = OutputConfig::default();
        let reference = iv(0, 100);
        let window = vec![iv(10, 20), iv(30, 40)];
        let mut multi = MultiVisitor::new(vec![VisitorKind::Count { count: 0 }, VisitorKind::Indicator]);
        let row = multi.emit(&reference, &window, &cfg).unwrap();
        assert_eq!(row, "2|1");
    }

    #[test]
    fn scenario_2_fraction_both_nesting() {
        let cfg = OutputConfig::default();
        let reference = iv(0, 100);
        let window: Vec<Interval> = Vec::new(); // fraction-both excludes both members
        let mut multi = MultiVisitor::new(vec![VisitorKind::Count { count: 0 }]);
        let row = multi.emit(&reference, &window, &cfg).unwrap();
        assert_eq!(row, "0");
    }

    #[test]
    fn scenario_3_echo_map_id() {
        let cfg = OutputConfig::default();
        let reference = iv(0, 100);
        let window = vec![Interval::new("chr1", 10, 15).with_id("m1"), Interval::new("chr1", 20, 30).with_id("m2")];
        let mut multi = MultiVisitor::new(vec![VisitorKind::EchoRef, VisitorKind::EchoMapId]);
        let row = multi.emit(&reference, &window, &cfg).unwrap();
        assert_eq!(row, "chr1\t0\t100|m1;m2");
    }

    #[test]
    fn scenario_6_exact_echo_map_id() {
        let cfg = OutputConfig::default();
        let reference = Interval::new("chr1", 100, 200);
        let window = vec![Interval::new("chr1", 100, 200).with_id("foo"), Interval::new("chr1", 100, 200).with_id("bar")];
        let mut multi = MultiVisitor::new(vec![VisitorKind::EchoMapId]);
        let row = multi.emit(&reference, &window, &cfg).unwrap();
        assert_eq!(row, "foo;bar");
    }

    #[test]
    fn bases_uniq_merges_overlapping_clips() {
        let cfg = OutputConfig::default();
        let reference = iv(0, 100);
        let window = vec![iv(10, 30), iv(20, 40)];
        let mut multi = MultiVisitor::new(vec![VisitorKind::BasesUniq]);
        let row = multi.emit(&reference, &window, &cfg).unwrap();
        assert_eq!(row, "30");
    }

    #[test]
    fn skip_unmapped_suppresses_empty_window_row() {
        let mut cfg = OutputConfig::default();
        cfg.skip_unmapped = true;
        let reference = iv(0, 100);
        let mut multi = MultiVisitor::new(vec![VisitorKind::Count { count: 0 }]);
        assert!(multi.emit(&reference, &[], &cfg).is_none());
    }

    #[test]
    fn max_element_breaks_ties_by_stable_genomic_order() {
        let cfg = OutputConfig::default();
        let reference = iv(0, 100);
        let window = vec![Interval::new("chr1", 10, 20).with_score(5.0), Interval::new("chr1", 30, 40).with_score(5.0), Interval::new("chr1", 50, 60).with_score(3.0)];
        let mut multi = MultiVisitor::new(vec![VisitorKind::MaxElement]);
        let row = multi.emit(&reference, &window, &cfg).unwrap();
        assert!(row.starts_with("chr1\t10\t20"));
    }

    #[test]
    fn numeric_stats_emit_unmapped_placeholder_on_empty_window() {
        let cfg = OutputConfig::default();
        let reference = iv(0, 100);
        let mut multi = MultiVisitor::new(vec![
            VisitorKind::Sum,
            VisitorKind::Mean,
            VisitorKind::Variance,
            VisitorKind::Stdev,
            VisitorKind::Cv,
            VisitorKind::Median,
            VisitorKind::Mad { multiplier: 1.0 },
            VisitorKind::Min,
            VisitorKind::Max,
            VisitorKind::WMean,
            VisitorKind::TMean { lo: 0.1, hi: 0.9 },
            VisitorKind::Kth { q: 0.5 },
        ]);
        let row = multi.emit(&reference, &[], &cfg).unwrap();
        let expected = vec![cfg.unmapped_value.as_str(); 12].join("|");
        assert_eq!(row, expected, "an empty window must never surface a bare 0.0/inf/-inf for any numeric statistic");
    }
}
