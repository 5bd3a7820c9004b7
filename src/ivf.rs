//! IVF-flat partition index over catalog embeddings.
//!
//! Vectors are grouped into lists around centroids; a query only scores the
//! vectors in the lists nearest to it. List count is tunable (default 100)
//! and clamped to the square root of the collection size, so small catalogs
//! collapse to a single list and search stays exact. The index is built
//! in memory from the stored vectors and rebuilt when embeddings change.

/// Rounds of centroid refinement during build. Assignments stabilize
/// quickly on normalized vectors; more rounds buy little.
const KMEANS_ROUNDS: usize = 3;

/// Fraction of lists always probed per query (at least one). Probing
/// continues past this floor until `k` candidates have been gathered, so a
/// query can never come back short while matching vectors exist.
const PROBE_DIVISOR: usize = 10;

struct Entry {
    id: i64,
    /// L2-normalized vector; zero vectors stay zero and score 0 everywhere.
    vector: Vec<f32>,
}

/// In-memory inverted-file index with flat (exact) scoring inside each
/// probed list. Cosine similarity reduces to a dot product because all
/// stored vectors and queries are normalized at the boundary.
pub(crate) struct IvfIndex {
    centroids: Vec<Vec<f32>>,
    lists: Vec<Vec<usize>>,
    entries: Vec<Entry>,
}

impl IvfIndex {
    /// Build an index over (id, vector) pairs.
    ///
    /// `lists` is the configured partition count; the effective count is
    /// clamped to ceil(sqrt(n)) so sparse collections are not shredded into
    /// near-empty lists.
    pub(crate) fn build(items: Vec<(i64, Vec<f32>)>, lists: usize) -> Self {
        let entries: Vec<Entry> = items
            .into_iter()
            .map(|(id, vector)| Entry {
                id,
                vector: normalize(&vector),
            })
            .collect();

        let n = entries.len();
        if n == 0 {
            return IvfIndex {
                centroids: Vec::new(),
                lists: Vec::new(),
                entries,
            };
        }

        let sqrt_n = (n as f64).sqrt().ceil() as usize;
        let nlist = lists.min(sqrt_n).max(1);

        // Deterministic init: stride-sample the entries as seed centroids.
        let mut centroids: Vec<Vec<f32>> = (0..nlist)
            .map(|i| entries[i * n / nlist].vector.clone())
            .collect();

        let mut assignments = vec![0usize; n];
        for _ in 0..KMEANS_ROUNDS {
            for (i, entry) in entries.iter().enumerate() {
                assignments[i] = nearest_centroid(&centroids, &entry.vector);
            }

            let dims = entries[0].vector.len();
            let mut sums = vec![vec![0.0f32; dims]; nlist];
            let mut counts = vec![0usize; nlist];
            for (i, entry) in entries.iter().enumerate() {
                let list = assignments[i];
                counts[list] += 1;
                for (dim, value) in entry.vector.iter().enumerate() {
                    sums[list][dim] += value;
                }
            }

            for (list, sum) in sums.into_iter().enumerate() {
                // An emptied list keeps its previous centroid.
                if counts[list] > 0 {
                    centroids[list] = normalize(&sum);
                }
            }
        }

        let mut list_members: Vec<Vec<usize>> = vec![Vec::new(); nlist];
        for (i, entry) in entries.iter().enumerate() {
            let list = nearest_centroid(&centroids, &entry.vector);
            list_members[list].push(i);
        }

        IvfIndex {
            centroids,
            lists: list_members,
            entries,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Score the probed lists against `query` and return up to `k`
    /// (id, cosine similarity) pairs, best first. Ties break on id
    /// ascending so equal-score results have a deterministic order.
    pub(crate) fn search(&self, query: &[f32], k: usize) -> Vec<(i64, f64)> {
        if self.entries.is_empty() || k == 0 {
            return Vec::new();
        }

        let query = normalize(query);
        let min_probes = (self.lists.len() / PROBE_DIVISOR).max(1);

        let mut ranked_lists: Vec<(usize, f64)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(list, centroid)| (list, dot(centroid, &query)))
            .collect();
        ranked_lists.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut scored: Vec<(i64, f64)> = Vec::new();
        for (probed, &(list, _)) in ranked_lists.iter().enumerate() {
            if probed >= min_probes && scored.len() >= k {
                break;
            }
            for &i in &self.lists[list] {
                let entry = &self.entries[i];
                scored.push((entry.id, dot(&entry.vector, &query)));
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }
}

fn nearest_centroid(centroids: &[Vec<f32>], vector: &[f32]) -> usize {
    let mut best = 0;
    let mut best_score = f64::NEG_INFINITY;
    for (list, centroid) in centroids.iter().enumerate() {
        let score = dot(centroid, vector);
        if score > best_score {
            best = list;
            best_score = score;
        }
    }
    best
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}

fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm <= 1e-9 {
        return vector.to_vec();
    }
    vector.iter().map(|&x| x / norm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: usize = 768;

    fn axis_vector(axis: usize, value: f32) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        v[axis] = value;
        v
    }

    #[test]
    fn test_empty_index() {
        let index = IvfIndex::build(Vec::new(), 100);
        assert_eq!(index.len(), 0);
        assert!(index.search(&axis_vector(0, 1.0), 5).is_empty());
    }

    #[test]
    fn test_small_collection_is_exact() {
        // Three entries clamp to nlist = 2; asking for more results than
        // entries probes every list, so scores match plain cosine
        // similarity exactly.
        let items = vec![
            (1, axis_vector(0, 1.0)),
            (2, axis_vector(1, 1.0)),
            (3, axis_vector(0, 2.0)),
        ];
        let index = IvfIndex::build(items, 100);

        let results = index.search(&axis_vector(0, 1.0), 10);
        assert_eq!(results[0].1, 1.0);
        // Magnitude is irrelevant: ids 1 and 3 both score 1.0, tie breaks
        // on id ascending.
        assert_eq!(results[0].0, 1);
        assert_eq!(results[1].0, 3);
        assert_eq!(results[1].1, 1.0);
    }

    #[test]
    fn test_scores_are_cosine() {
        let mut near = axis_vector(0, 1.0);
        near[1] = 1.0; // 45 degrees from axis 0
        let items = vec![(1, axis_vector(0, 1.0)), (2, near)];
        let index = IvfIndex::build(items, 100);

        let results = index.search(&axis_vector(0, 1.0), 10);
        assert_eq!(results[0].0, 1);
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert!((results[1].1 - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn test_k_truncates() {
        let items: Vec<(i64, Vec<f32>)> =
            (0..20).map(|i| (i, axis_vector(0, 1.0 + i as f32))).collect();
        let index = IvfIndex::build(items, 100);

        let results = index.search(&axis_vector(0, 1.0), 5);
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_clustered_recall() {
        // Two well-separated clusters; the probed lists must contain the
        // query's cluster and its members must rank first.
        let mut items: Vec<(i64, Vec<f32>)> = Vec::new();
        for i in 0..100 {
            let mut v = axis_vector(0, 10.0);
            v[2] = (i % 7) as f32 * 0.01;
            items.push((i, v));
        }
        for i in 100..200 {
            let mut v = axis_vector(1, 10.0);
            v[3] = (i % 5) as f32 * 0.01;
            items.push((i, v));
        }
        let index = IvfIndex::build(items, 100);
        assert_eq!(index.len(), 200);

        let results = index.search(&axis_vector(1, 1.0), 10);
        assert_eq!(results.len(), 10);
        for (id, score) in &results {
            assert!(*id >= 100, "expected a cluster-1 member, got id {id}");
            assert!(*score > 0.9);
        }
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let items = vec![(1, vec![0.0f32; DIMS]), (2, axis_vector(0, 1.0))];
        let index = IvfIndex::build(items, 100);

        let results = index.search(&axis_vector(0, 1.0), 10);
        assert_eq!(results[0].0, 2);
        assert_eq!(results[1].1, 0.0);
    }

    #[test]
    fn test_tie_break_is_id_ascending() {
        let items = vec![
            (9, axis_vector(0, 3.0)),
            (4, axis_vector(0, 5.0)),
            (7, axis_vector(0, 1.0)),
        ];
        let index = IvfIndex::build(items, 100);

        let results = index.search(&axis_vector(0, 2.0), 10);
        let ids: Vec<i64> = results.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![4, 7, 9]);
    }
}
