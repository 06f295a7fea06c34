use std::collections::{BTreeMap, HashSet};

use spotmatch_types::SubjectKey;

use super::compare::ComparisonRow;

/// Reduces each focal subject's rows to its `n` nearest candidates.
///
/// Every score column is ranked on its own: the `n` smallest available
/// scores of the group are kept, ties going to the earlier row. The union
/// across columns is returned with each row once, groups in focal-key order,
/// then column order, then rank.
pub fn shortlist(rows: &[ComparisonRow], n: usize) -> Vec<ComparisonRow> {
    let mut groups: BTreeMap<&SubjectKey, Vec<usize>> = BTreeMap::new();
    for (index, row) in rows.iter().enumerate() {
        if row.pair.is_placeholder() {
            continue;
        }
        groups.entry(&row.pair.focal_key).or_default().push(index);
    }

    let columns = rows.first().map(|row| row.scores.len()).unwrap_or(0);
    let mut kept = Vec::new();
    for members in groups.values() {
        let mut taken: HashSet<usize> = HashSet::new();
        for column in 0..columns {
            let mut ranked: Vec<usize> = members
                .iter()
                .copied()
                .filter(|&index| score_at(rows, index, column).is_some())
                .collect();
            // stable: equal scores keep input order
            ranked.sort_by(|&a, &b| {
                let a = rows[a].scores[column];
                let b = rows[b].scores[column];
                a.rank_cmp(&b)
            });
            for index in ranked.into_iter().take(n) {
                if taken.insert(index) {
                    kept.push(rows[index].clone());
                }
            }
        }
    }
    kept
}

fn score_at(rows: &[ComparisonRow], index: usize, column: usize) -> Option<f64> {
    rows[index].scores.get(column).and_then(|score| score.value())
}
