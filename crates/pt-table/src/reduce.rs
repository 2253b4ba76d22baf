//! Worker-per-substream accumulation and deterministic merge-tree reduction.
//!
//! Each worker owns its own [`Table`] and shares nothing while ingesting.
//! Workers are combined by a fixed pairwise tree whose shape depends only on
//! the number of inputs and their order: at every level, table `2k + 1` is
//! merged into table `2k`. Thread count and scheduling therefore never change
//! the result, bit for bit.

use pt_core::{EventSource, Result};
use rayon::prelude::*;

use crate::config::TableConfig;
use crate::table::Table;

/// Accumulate each source into its own table on the rayon pool, then reduce.
///
/// Returns an empty table when `sources` is empty. The result is not finalized.
pub fn accumulate_parallel<S>(config: &TableConfig, sources: Vec<S>) -> Result<Table>
where
    S: EventSource + Send,
{
    let n_sources = sources.len();
    let tables = sources
        .into_par_iter()
        .map(|source| {
            let mut table = Table::new(config)?;
            table.ingest_all(source)?;
            Ok(table)
        })
        .collect::<Result<Vec<_>>>()?;
    log::debug!("accumulated {n_sources} worker tables");

    match merge_tree(tables)? {
        Some(table) => Ok(table),
        None => Table::new(config),
    }
}

/// Reduce tables pairwise in a fixed tree. `Ok(None)` for an empty input.
///
/// Pairs within a level are merged in parallel; each destination is written by
/// exactly one task.
pub fn merge_tree(tables: Vec<Table>) -> Result<Option<Table>> {
    let mut level = tables;
    let mut depth = 0usize;
    while level.len() > 1 {
        let mut pairs = Vec::with_capacity(level.len().div_ceil(2));
        let mut it = level.into_iter();
        while let Some(left) = it.next() {
            pairs.push((left, it.next()));
        }
        level = pairs
            .into_par_iter()
            .map(|(mut left, right)| {
                if let Some(right) = right {
                    left.merge_from(&right)?;
                }
                Ok(left)
            })
            .collect::<Result<Vec<_>>>()?;
        depth += 1;
        log::debug!("merge tree level {depth}: {} tables remain", level.len());
    }
    Ok(level.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisSpec;
    use pt_core::{Error, PhotonRecord};

    fn config() -> TableConfig {
        TableConfig::new(9)
            .axis(AxisSpec::uniform("r", "m", 0.0, 10.0, 5))
            .axis(AxisSpec::logarithmic("t", "ns", 1.0, 1000.0, 6))
    }

    fn stream(k: u64, n: usize) -> Vec<PhotonRecord> {
        (0..n)
            .map(|i| {
                let f = (i as f64 + 0.37 * k as f64) * 0.618_033_988_75;
                let r = (f * 7.0) % 11.0;
                let t = 1.0 + (f * 131.0) % 1100.0;
                PhotonRecord::new(vec![r, t], 0.5 + (i % 3) as f64, k)
            })
            .collect()
    }

    #[test]
    fn empty_sources_give_empty_table() {
        let t = accumulate_parallel::<Vec<PhotonRecord>>(&config(), vec![]).unwrap();
        assert_eq!(t.provenance().total_events, 0);
        assert!(merge_tree(vec![]).unwrap().is_none());
    }

    #[test]
    fn counts_all_records() {
        let sources: Vec<_> = (0..5).map(|k| stream(k, 200)).collect();
        let t = accumulate_parallel(&config(), sources).unwrap();
        assert_eq!(t.provenance().total_events, 1000);
        let binned: u64 = t.cells().iter().map(|c| c.sample_count()).sum();
        assert_eq!(binned + t.overflow().sample_count(), 1000);
    }

    #[test]
    fn tree_is_independent_of_thread_count() {
        let run = |threads: usize| {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
            pool.install(|| {
                let sources: Vec<_> = (0..7).map(|k| stream(k, 300)).collect();
                accumulate_parallel(&config(), sources).unwrap()
            })
        };
        let one = run(1);
        let four = run(4);
        assert_eq!(one, four);
        for (a, b) in one.cells().iter().zip(four.cells()) {
            assert_eq!(a.m2().to_bits(), b.m2().to_bits());
        }
    }

    #[test]
    fn bad_record_fails_the_run() {
        let mut bad = stream(1, 10);
        bad[4].weight = -2.0;
        let err = accumulate_parallel(&config(), vec![stream(0, 10), bad]).unwrap_err();
        assert!(matches!(err, Error::InvalidWeight(_)));
    }

    #[test]
    fn mismatched_tables_fail_the_tree() {
        let a = Table::new(&config()).unwrap();
        let b = Table::new(&TableConfig::new(9).axis(AxisSpec::uniform("r", "m", 0.0, 10.0, 4)))
            .unwrap();
        assert!(matches!(merge_tree(vec![a, b]), Err(Error::ShapeMismatch(_))));
    }
}
