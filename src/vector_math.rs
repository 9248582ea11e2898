use std::cmp::Ordering;

use ndarray::ArrayView1;

use crate::core::errors::ApiError;

pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> Result<f32, ApiError> {
    if query.is_empty() || candidate.is_empty() {
        return Err(ApiError::BadRequest(
            "Vectors must not be empty".to_string(),
        ));
    }
    if query.len() != candidate.len() {
        return Err(ApiError::BadRequest(format!(
            "Vector length mismatch: {} != {}",
            query.len(),
            candidate.len()
        )));
    }

    let query_view = ArrayView1::from(query);
    let candidate_view = ArrayView1::from(candidate);

    let dot = query_view.dot(&candidate_view);
    let denom = query_view.dot(&query_view).sqrt() * candidate_view.dot(&candidate_view).sqrt();
    if denom <= f32::EPSILON {
        return Ok(0.0);
    }

    Ok(dot / denom)
}

pub fn rank_descending_by_cosine(
    query: &[f32],
    candidates: &[Vec<f32>],
) -> Result<Vec<(usize, f32)>, ApiError> {
    let mut scores = Vec::with_capacity(candidates.len());
    for (idx, candidate) in candidates.iter().enumerate() {
        let score = cosine_similarity(query, candidate)?;
        scores.push((idx, score));
    }

    scores.sort_by(|left, right| right.1.partial_cmp(&left.1).unwrap_or(Ordering::Equal));
    Ok(scores)
}

/// Maximal marginal relevance over `candidates`, returning up to `k` indices in
/// selection order. `lambda` = 1.0 is pure relevance, 0.0 pure diversity.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[Vec<f32>],
    k: usize,
    lambda: f32,
) -> Result<Vec<usize>, ApiError> {
    let relevance = candidates
        .iter()
        .map(|candidate| cosine_similarity(query, candidate))
        .collect::<Result<Vec<_>, _>>()?;

    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k && !remaining.is_empty() {
        let mut best: Option<(usize, f32)> = None;
        for (pos, &idx) in remaining.iter().enumerate() {
            let mut redundancy = f32::MIN;
            for &chosen in &selected {
                let sim = cosine_similarity(&candidates[idx], &candidates[chosen])?;
                redundancy = redundancy.max(sim);
            }
            if selected.is_empty() {
                redundancy = 0.0;
            }
            let score = lambda * relevance[idx] - (1.0 - lambda) * redundancy;
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((pos, score));
            }
        }

        match best {
            Some((pos, _)) => selected.push(remaining.remove(pos)),
            None => break,
        }
    }

    Ok(selected)
}
