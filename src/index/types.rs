use crate::error::SearchError;
use std::cmp::Ordering;

/// Raw k-NN output: parallel id/score arrays in rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbors {
    pub ids: Vec<i64>,
    pub scores: Vec<f32>,
}

impl Neighbors {
    /// Id used for slots that have no genuine neighbour.
    pub const NO_RESULT: i64 = -1;

    /// Builds a `k`-slot result from scored candidates, best first, padding
    /// with [`NO_RESULT`](Self::NO_RESULT) when there are fewer than `k`.
    pub fn from_candidates(mut candidates: Vec<(i64, f32)>, k: usize) -> Self {
        if candidates.len() > k && k > 0 {
            candidates.select_nth_unstable_by(k - 1, rank_order);
        }
        candidates.truncate(k);
        candidates.sort_by(rank_order);

        let mut ids = Vec::with_capacity(k);
        let mut scores = Vec::with_capacity(k);
        for (id, score) in candidates {
            ids.push(id);
            scores.push(score);
        }
        while ids.len() < k {
            ids.push(Self::NO_RESULT);
            scores.push(f32::NEG_INFINITY);
        }

        Self { ids, scores }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `(id, score)` pairs in rank order, sentinels included.
    pub fn iter(&self) -> impl Iterator<Item = (i64, f32)> + '_ {
        self.ids.iter().copied().zip(self.scores.iter().copied())
    }
}

/// Higher score first; equal scores keep ascending id order.
fn rank_order(a: &(i64, f32), b: &(i64, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

#[inline]
pub(crate) fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scales `v` to unit length. A zero vector stays zero.
///
/// The norm is accumulated in `f64` so large components do not overflow.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = v
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt()
        + 1e-12;
    v.iter().map(|&x| (f64::from(x) / norm) as f32).collect()
}

pub(crate) fn check_dimension(expected: usize, query: &[f32]) -> Result<(), SearchError> {
    if query.len() != expected {
        return Err(SearchError::DimensionMismatch {
            expected,
            actual: query.len(),
        });
    }
    Ok(())
}
