//! Expands sighting catalogs into the photo pairs to compare.

use std::collections::HashSet;

use spotmatch_types::{
    CandidatePair, NO_MATCH_PLACEHOLDER, PairKey, SampleName, SightingRecord,
};

/// Which query sightings are eligible relative to the focal capture date.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum DateFilter {
    /// Query captured strictly before the focal sighting.
    Before,
    /// Query captured strictly after the focal sighting.
    After,
    #[default]
    All,
}

#[derive(Clone, Debug)]
pub struct PairFilters {
    pub by_sex: bool,
    pub by_size: bool,
    pub date: DateFilter,
    /// Accepted absolute size difference when filtering by size.
    pub size_offset: f64,
}

impl PairFilters {
    /// Whether `query` stays a candidate for `focal`. Missing sizes or sexes
    /// never exclude a row; missing dates fail any date condition.
    pub fn admits(&self, focal: &SightingRecord, query: &SightingRecord) -> bool {
        let date_ok = match self.date {
            DateFilter::All => true,
            DateFilter::Before => matches!(
                (&query.date, &focal.date),
                (Some(q), Some(f)) if q < f
            ),
            DateFilter::After => matches!(
                (&query.date, &focal.date),
                (Some(q), Some(f)) if q > f
            ),
        };
        if !date_ok {
            return false;
        }

        if self.by_size {
            if let (Some(f), Some(q)) = (focal.size, query.size) {
                if q < f - self.size_offset || q > f + self.size_offset {
                    return false;
                }
            }
        }

        if self.by_sex {
            if let (Some(f), Some(q)) = (&focal.sex, &query.sex) {
                if f != q {
                    return false;
                }
            }
        }
        true
    }
}

/// Generated pair list. Placeholder rows mark focal photos whose filtered
/// query set has no photo instances.
#[derive(Debug, Default)]
pub struct PairList {
    pub rows: Vec<CandidatePair>,
}

impl PairList {
    /// Rows that are real comparisons.
    pub fn candidate_count(&self) -> usize {
        self.rows.iter().filter(|row| !row.is_placeholder()).count()
    }

    pub fn placeholder_count(&self) -> usize {
        self.rows.len() - self.candidate_count()
    }
}

/// Pairs every photo instance of each focal subject with every instance of
/// its filtered query subjects.
///
/// Focal instances are samples whose first two name fields equal the focal
/// key; query instances are samples containing the query key. Pairs of a
/// photo with itself are skipped, and an unordered pair already emitted for
/// an earlier focal row is not repeated. A focal photo left without a row of
/// its own gets a placeholder.
pub fn generate_pairs(
    focal: &[SightingRecord],
    query: &[SightingRecord],
    samples: &[SampleName],
    filters: &PairFilters,
) -> PairList {
    let mut seen: HashSet<PairKey> = HashSet::new();
    let mut rows = Vec::new();

    for focal_record in focal {
        let focal_instances: Vec<&SampleName> = samples
            .iter()
            .filter(|sample| focal_record.key.owns_sample(sample))
            .collect();

        let test_instances: Vec<(&SampleName, &SightingRecord)> = query
            .iter()
            .filter(|query_record| filters.admits(focal_record, query_record))
            .flat_map(|query_record| {
                samples
                    .iter()
                    .filter(move |sample| query_record.key.embedded_in(sample))
                    .map(move |sample| (sample, query_record))
            })
            .collect();

        for focal_image in focal_instances {
            let emitted = rows.len();
            for (test_image, query_record) in &test_instances {
                if focal_image == *test_image {
                    continue;
                }
                if !seen.insert(PairKey::new(focal_image, test_image)) {
                    continue;
                }
                rows.push(CandidatePair {
                    focal_image: focal_image.clone(),
                    test_image: (*test_image).clone(),
                    focal_key: focal_image.subject_key(),
                    test_key: test_image.subject_key(),
                    focal_size: focal_record.size,
                    focal_sex: focal_record.sex.clone(),
                    test_size: query_record.size,
                    test_sex: query_record.sex.clone(),
                });
            }
            if rows.len() == emitted {
                rows.push(placeholder(focal_image, focal_record));
            }
        }
    }

    PairList { rows }
}

fn placeholder(focal_image: &SampleName, focal_record: &SightingRecord) -> CandidatePair {
    let mut row = CandidatePair::bare(
        focal_image.clone(),
        SampleName::new(NO_MATCH_PLACEHOLDER),
    );
    row.focal_size = focal_record.size;
    row.focal_sex = focal_record.sex.clone();
    row
}
