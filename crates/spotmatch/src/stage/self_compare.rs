use std::collections::{BTreeMap, HashSet};

use spotmatch_types::{CandidatePair, PairKey, SampleName, SubjectKey};

/// Samples grouped by the subject key embedded in their names.
pub fn group_by_subject(samples: &[SampleName]) -> BTreeMap<SubjectKey, Vec<SampleName>> {
    let mut groups: BTreeMap<SubjectKey, Vec<SampleName>> = BTreeMap::new();
    for sample in samples {
        groups
            .entry(sample.subject_key())
            .or_default()
            .push(sample.clone());
    }
    groups
}

/// Lazy walk over every 2-combination inside each group, in group order.
/// Calling [`within_subject_pairs`] again starts a fresh walk.
#[derive(Clone, Debug)]
pub struct SubjectCombinations<'a> {
    groups: Vec<&'a [SampleName]>,
    group: usize,
    i: usize,
    j: usize,
}

pub fn within_subject_pairs(
    groups: &BTreeMap<SubjectKey, Vec<SampleName>>,
) -> SubjectCombinations<'_> {
    SubjectCombinations {
        groups: groups.values().map(Vec::as_slice).collect(),
        group: 0,
        i: 0,
        j: 1,
    }
}

impl<'a> Iterator for SubjectCombinations<'a> {
    type Item = (&'a SampleName, &'a SampleName);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(members) = self.groups.get(self.group) {
            if self.j < members.len() {
                let pair = (&members[self.i], &members[self.j]);
                self.j += 1;
                return Some(pair);
            }
            self.i += 1;
            self.j = self.i + 1;
            if self.j >= members.len() {
                self.group += 1;
                self.i = 0;
                self.j = 1;
            }
        }
        None
    }
}

/// Distinct unordered pairs, in first-seen order. Pairs of a sample with
/// itself are dropped.
pub fn unique_pairs<'a>(
    combinations: impl Iterator<Item = (&'a SampleName, &'a SampleName)>,
) -> Vec<CandidatePair> {
    let mut seen: HashSet<PairKey> = HashSet::new();
    let mut pairs = Vec::new();
    for (a, b) in combinations {
        let key = PairKey::new(a, b);
        if key.is_self_pair() || !seen.insert(key) {
            continue;
        }
        pairs.push(CandidatePair::bare(a.clone(), b.clone()));
    }
    pairs
}
