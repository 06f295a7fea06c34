#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::descriptor::{DescriptorElement, DescriptorSet, Descriptors};
use crate::error::DescriptorError;

/// Accepted one-to-one correspondence between two descriptor sets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DescriptorMatch {
    pub query: usize,
    pub train: usize,
    pub distance: f32,
}

/// Brute-force nearest neighbours kept only when each side is the other's
/// nearest; ties resolve to the lowest index.
pub fn cross_checked_matches(
    query: &DescriptorSet,
    train: &DescriptorSet,
) -> Result<Vec<DescriptorMatch>, DescriptorError> {
    if query.dims() != train.dims() {
        return Err(DescriptorError::incompatible(format!(
            "descriptor length {} vs {}",
            query.dims(),
            train.dims()
        )));
    }
    match (query, train) {
        (DescriptorSet::Float(q), DescriptorSet::Float(t)) => Ok(cross_check(q, t)),
        (DescriptorSet::Binary(q), DescriptorSet::Binary(t)) => Ok(cross_check(q, t)),
        _ => Err(DescriptorError::incompatible(
            "float and binary descriptors mixed",
        )),
    }
}

/// Mean distance over the cross-checked matches.
pub fn mean_match_distance(
    query: &DescriptorSet,
    train: &DescriptorSet,
) -> Result<f64, DescriptorError> {
    let matches = cross_checked_matches(query, train)?;
    if matches.is_empty() {
        return Err(DescriptorError::incompatible("no cross-checked matches"));
    }
    let total: f64 = matches.iter().map(|m| m.distance as f64).sum();
    Ok(total / matches.len() as f64)
}

fn cross_check<T: DescriptorElement>(
    query: &Descriptors<T>,
    train: &Descriptors<T>,
) -> Vec<DescriptorMatch> {
    let forward = nearest(query, train);
    let backward = nearest(train, query);
    forward
        .into_iter()
        .enumerate()
        .filter_map(|(q, best)| {
            let (t, distance) = best?;
            match backward[t] {
                Some((back, _)) if back == q => Some(DescriptorMatch {
                    query: q,
                    train: t,
                    distance,
                }),
                _ => None,
            }
        })
        .collect()
}

fn nearest<T: DescriptorElement>(
    from: &Descriptors<T>,
    to: &Descriptors<T>,
) -> Vec<Option<(usize, f32)>> {
    let best_for = |row: &[T]| -> Option<(usize, f32)> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, candidate) in to.rows().enumerate() {
            let distance = T::distance(row, candidate);
            if best.is_none_or(|(_, current)| distance < current) {
                best = Some((idx, distance));
            }
        }
        best
    };

    #[cfg(feature = "parallel")]
    {
        let rows: Vec<&[T]> = from.rows().collect();
        rows.par_iter().map(|row| best_for(row)).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        from.rows().map(best_for).collect()
    }
}
