//! Chunked, pooled scoring of candidate pairs.
//!
//! Each chunk runs as one task on the pool and scores its pairs in
//! parallel. Finished batches travel over a channel to a single collector
//! thread that owns the result map, so no worker ever touches shared state.

use std::collections::HashMap;
use std::panic;
use std::sync::mpsc;
use std::thread;

use indicatif::ProgressBar;
use rayon::ThreadPool;
use rayon::prelude::*;
use spotmatch_compare::PairScorer;
use spotmatch_types::{Algorithm, CandidatePair, ErrorRecord, PairKey, ReviewFlag, Score};
use tracing::debug;

use crate::journal::Journal;

/// A candidate row with one score per selected algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub pair: CandidatePair,
    pub scores: Vec<Score>,
    pub flag: ReviewFlag,
}

type ScoreBatch = Vec<(PairKey, Vec<Score>)>;

#[derive(Debug, Default)]
pub struct ComparisonRun {
    pub rows: Vec<ComparisonRow>,
    /// Pairs actually dispatched for scoring.
    pub compared: usize,
    /// Individual algorithm scores that came out unavailable.
    pub unavailable: usize,
}

pub struct ComparisonEngine<'a> {
    scorer: PairScorer,
    chunk_size: usize,
    journal: &'a Journal,
}

impl<'a> ComparisonEngine<'a> {
    pub fn new(scorer: PairScorer, chunk_size: usize, journal: &'a Journal) -> Self {
        Self {
            scorer,
            chunk_size: chunk_size.max(1),
            journal,
        }
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        self.scorer.algorithms()
    }

    /// Scores every real pair of `pairs` and joins the scores back onto the
    /// rows in their original order, flagged unprocessed. Placeholder rows
    /// and self pairs are never dispatched and carry unavailable scores.
    pub fn run(
        &self,
        pairs: Vec<CandidatePair>,
        pool: &ThreadPool,
        bar: &ProgressBar,
    ) -> ComparisonRun {
        let merged = self.score_chunks(&pairs, pool, bar);
        let compared = merged.len();

        let missing = vec![Score::Unavailable; self.algorithms().len()];
        let rows: Vec<ComparisonRow> = pairs
            .into_iter()
            .map(|pair| {
                let scores = merged
                    .get(&pair.key())
                    .cloned()
                    .unwrap_or_else(|| missing.clone());
                ComparisonRow {
                    pair,
                    scores,
                    flag: ReviewFlag::Unprocessed,
                }
            })
            .collect();
        let unavailable = merged
            .values()
            .flatten()
            .filter(|score| score.value().is_none())
            .count();

        ComparisonRun {
            rows,
            compared,
            unavailable,
        }
    }

    fn score_chunks(
        &self,
        pairs: &[CandidatePair],
        pool: &ThreadPool,
        bar: &ProgressBar,
    ) -> HashMap<PairKey, Vec<Score>> {
        let (tx, rx) = mpsc::channel::<ScoreBatch>();

        thread::scope(|scope| {
            let collector = scope.spawn(move || {
                let mut merged = HashMap::new();
                for batch in rx {
                    merged.extend(batch);
                }
                merged
            });

            pool.scope(|tasks| {
                for (index, chunk) in pairs.chunks(self.chunk_size).enumerate() {
                    let tx = tx.clone();
                    tasks.spawn(move |_| {
                        let batch = self.score_chunk(chunk);
                        debug!(chunk = index, rows = chunk.len(), scored = batch.len(), "chunk done");
                        bar.inc(chunk.len() as u64);
                        // The collector only stops once every sender is gone.
                        let _ = tx.send(batch);
                    });
                }
            });
            drop(tx);

            match collector.join() {
                Ok(merged) => merged,
                Err(payload) => panic::resume_unwind(payload),
            }
        })
    }

    fn score_chunk(&self, chunk: &[CandidatePair]) -> ScoreBatch {
        chunk
            .par_iter()
            .filter(|pair| !pair.is_placeholder() && !pair.key().is_self_pair())
            .map(|pair| (pair.key(), self.score_pair(pair)))
            .collect()
    }

    fn score_pair(&self, pair: &CandidatePair) -> Vec<Score> {
        self.scorer
            .score_all(&pair.focal_image, &pair.test_image)
            .into_iter()
            .map(|result| match result.outcome {
                Ok(value) => Score::Value(value),
                Err(err) => {
                    self.journal.record(&ErrorRecord::new(
                        format!("{} vs {}", pair.focal_image, pair.test_image),
                        err.class(),
                        format!("comparing with {} failed: {err}", result.algorithm),
                    ));
                    Score::Unavailable
                }
            })
            .collect()
    }
}
