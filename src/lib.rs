// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! A genomic interval toolkit core: the ordered interval sweep with its
//! overlap predicate family, the byte-indexed on-disk search used for
//! chromosome- and range-scoped extraction, and the visitor framework that
//! streams mapped intervals past a moving reference element.
//!
//! # Example
//!
//! ```rust,no_run
//! use bedops_core::config::{OutputConfig, SweepConfig};
//! use bedops_core::driver::{run_mapping, InputSource};
//! use bedops_core::visitor::VisitorKind;
//! use std::path::Path;
//!
//! let mut out = std::io::stdout();
//! run_mapping(
//!     Path::new("reference.bed"),
//!     InputSource::Path("map.bed".into()),
//!     &SweepConfig::default(),
//!     &OutputConfig::default(),
//!     vec![VisitorKind::Count { count: 0 }],
//!     false,
//!     false,
//!     None,
//!     &mut out,
//! ).unwrap();
//! ```

pub mod buffers;
pub mod config;
pub mod driver;
pub mod error;
pub mod extractor;
pub mod interval;
pub mod output;
pub mod pool;
pub mod predicate;
pub mod rangefinder;
pub mod reader;
pub mod sweep;
pub mod visitor;

/// Library version, surfaced by both binaries' `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use crate::interval::Interval;
    use crate::predicate::OverlapPredicate;
    use crate::sweep::{MapSource, WindowSweep};
    use crate::visitor::VisitorKind;

    struct VecMapSource {
        items: std::vec::IntoIter<Interval>,
    }
    impl MapSource for VecMapSource {
        fn next_map(&mut self) -> crate::error::Result<Option<Interval>> {
            Ok(self.items.next())
        }
    }

    #[test]
    fn end_to_end_sweep_and_visitor_pipeline() {
        let refs = vec![Interval::new("chr1", 10, 20), Interval::new("chr1", 100, 110)];
        let map = vec![Interval::new("chr1", 5, 12), Interval::new("chr1", 15, 25), Interval::new("chr1", 109, 111)];
        let mut sweep = WindowSweep::new(OverlapPredicate::BpOverlap(1));
        let mut source = VecMapSource { items: map.into_iter() };
        let mut visitor = VisitorKind::Count { count: 0 };
        let cfg = crate::config::OutputConfig::default();
        let mut rows = Vec::new();
        sweep
            .run(
                refs.into_iter().map(Ok),
                &mut source,
                &mut visitor,
                |r, window, _v| {
                    let mut row = crate::output::RowBuilder::new(&cfg);
                    row.push_int(window.len() as u64);
                    let _ = r;
                    rows.push(row.finish());
                    Ok(())
                },
                false,
            )
            .unwrap();
        assert_eq!(rows, vec!["2", "1"]);
    }
}
