//! Lloyd's k-means used to train the IVF coarse quantizer.
//!
//! Initialization is deterministic: the initial centroids are training
//! points taken at an even stride, so the same training set always yields
//! the same partitions.

use crate::distance::squared_l2;

/// Index of the centroid nearest to `vector`.
pub fn nearest_centroid(centroids: &[f32], dimension: usize, vector: &[f32]) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (i, centroid) in centroids.chunks_exact(dimension).enumerate() {
        let distance = squared_l2(vector, centroid);
        if distance < best_distance {
            best_distance = distance;
            best = i;
        }
    }
    best
}

/// Cluster row-major `data` into `k` centroids.
///
/// Callers guarantee `k >= 1` and at least `k` training vectors. Clusters
/// that end up empty keep their previous centroid.
pub fn train(data: &[f32], dimension: usize, k: usize, max_iterations: usize) -> Vec<f32> {
    let n = data.len() / dimension;
    let row = |i: usize| &data[i * dimension..(i + 1) * dimension];

    let mut centroids: Vec<f32> = Vec::with_capacity(k * dimension);
    for c in 0..k {
        centroids.extend_from_slice(row(c * n / k));
    }

    let mut assignments = vec![usize::MAX; n];
    for iteration in 0..max_iterations {
        let mut changed = 0usize;
        for (i, slot) in assignments.iter_mut().enumerate() {
            let nearest = nearest_centroid(&centroids, dimension, row(i));
            if *slot != nearest {
                *slot = nearest;
                changed += 1;
            }
        }

        let mut sums = vec![0.0f64; k * dimension];
        let mut counts = vec![0usize; k];
        for (i, &cluster) in assignments.iter().enumerate() {
            counts[cluster] += 1;
            let sum = &mut sums[cluster * dimension..(cluster + 1) * dimension];
            for (s, &x) in sum.iter_mut().zip(row(i)) {
                *s += f64::from(x);
            }
        }
        for cluster in 0..k {
            if counts[cluster] == 0 {
                continue;
            }
            let count = counts[cluster] as f64;
            let centroid = &mut centroids[cluster * dimension..(cluster + 1) * dimension];
            let sum = &sums[cluster * dimension..(cluster + 1) * dimension];
            for (c, s) in centroid.iter_mut().zip(sum) {
                *c = (s / count) as f32;
            }
        }

        log::debug!("k-means iteration {}: {} reassignments", iteration + 1, changed);
        if changed == 0 {
            break;
        }
    }

    centroids
}
