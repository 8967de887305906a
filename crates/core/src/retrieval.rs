/// A stored chunk paired with its similarity to the query. Ephemeral,
/// produced fresh per query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Position of the chunk in the loaded index.
    pub index: usize,
    pub score: f32,
}

/// Exact dense top-k search: dot product of the pre-normalized query
/// vector against every stored vector (cosine similarity, both sides being
/// unit length). Results are sorted by descending score; equal scores keep
/// the lower original index first, so identical inputs always produce
/// identical rankings.
pub fn search(query: &[f32], vectors: &[Vec<f32>], k: usize) -> Vec<Hit> {
    let mut hits: Vec<Hit> = vectors
        .iter()
        .enumerate()
        .map(|(index, vector)| Hit {
            index,
            score: dot(query, vector),
        })
        .collect();

    hits.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then(left.index.cmp(&right.index))
    });
    hits.truncate(k);
    hits
}

fn dot(left: &[f32], right: &[f32]) -> f32 {
    left.iter().zip(right).map(|(a, b)| a * b).sum()
}
