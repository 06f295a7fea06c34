use spotmatch_types::{Algorithm, SampleName};

use crate::error::DescriptorError;
use crate::matcher::mean_match_distance;
use crate::store::DescriptorStore;

/// Outcome of one algorithm on one pair.
#[derive(Debug)]
pub struct AlgorithmScore {
    pub algorithm: Algorithm,
    pub outcome: Result<f64, DescriptorError>,
}

/// Scores sample pairs with a fixed selection of algorithms.
#[derive(Clone, Debug)]
pub struct PairScorer {
    store: DescriptorStore,
    algorithms: Vec<Algorithm>,
}

impl PairScorer {
    /// Duplicate algorithms are dropped, keeping the first occurrence.
    pub fn new(store: DescriptorStore, algorithms: &[Algorithm]) -> Self {
        let mut unique = Vec::with_capacity(algorithms.len());
        for algorithm in algorithms {
            if !unique.contains(algorithm) {
                unique.push(*algorithm);
            }
        }
        Self {
            store,
            algorithms: unique,
        }
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    pub fn store(&self) -> &DescriptorStore {
        &self.store
    }

    pub fn score(
        &self,
        a: &SampleName,
        b: &SampleName,
        algorithm: Algorithm,
    ) -> Result<f64, DescriptorError> {
        let left = self.store.load(a, algorithm)?;
        let right = self.store.load(b, algorithm)?;
        mean_match_distance(&left, &right)
    }

    /// One entry per selected algorithm. A failing algorithm never hides the
    /// others.
    pub fn score_all(&self, a: &SampleName, b: &SampleName) -> Vec<AlgorithmScore> {
        self.algorithms
            .iter()
            .map(|&algorithm| AlgorithmScore {
                algorithm,
                outcome: self.score(a, b, algorithm),
            })
            .collect()
    }
}
