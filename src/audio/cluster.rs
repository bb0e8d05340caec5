//! Seeded k-means used to group onsets by timbre.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::features::{FeatureTable, FrameSeries};
use crate::error::Result;

#[derive(Clone, Copy, Debug)]
pub struct KMeansParams {
    pub seed: u64,
    /// Independent k-means++ initializations; the lowest-inertia fit wins
    pub restarts: usize,
    pub max_iterations: usize,
}

#[derive(Clone, Debug)]
pub struct ClusterResult {
    pub labels: Vec<usize>,
    pub n_clusters: usize,
    pub inertia: f64,
}

/// Never ask for more clusters than there are points.
pub fn effective_k(requested: usize, n_points: usize) -> usize {
    requested.min(n_points)
}

/// MFCC vector at each onset frame followed by the spectral centroid there.
pub fn timbre_vectors(
    onset_frames: &[usize],
    mfcc: &FeatureTable,
    centroid: &FrameSeries,
) -> Result<Vec<Vec<f32>>> {
    onset_frames
        .iter()
        .map(|&frame| {
            let mut v = mfcc.at(frame)?.to_vec();
            v.push(centroid.at(frame)?);
            Ok(v)
        })
        .collect()
}

pub fn kmeans(points: &[Vec<f32>], k: usize, params: &KMeansParams) -> ClusterResult {
    let k = effective_k(k, points.len());
    if k == 0 {
        return ClusterResult {
            labels: Vec::new(),
            n_clusters: 0,
            inertia: 0.0,
        };
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<ClusterResult> = None;

    for _ in 0..params.restarts.max(1) {
        let centers = init_plus_plus(points, k, &mut rng);
        let fit = lloyd(points, centers, params.max_iterations);
        if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }

    best.unwrap_or(ClusterResult {
        labels: vec![0; points.len()],
        n_clusters: k,
        inertia: 0.0,
    })
}

fn sq_dist(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum()
}

fn init_plus_plus(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f32>> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())].clone());

    let mut closest: Vec<f64> = points.iter().map(|p| sq_dist(p, &centers[0])).collect();

    while centers.len() < k {
        let total: f64 = closest.iter().sum();
        let idx = if total > 0.0 {
            let mut r = rng.gen::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (j, &d) in closest.iter().enumerate() {
                r -= d;
                if r <= 0.0 && d > 0.0 {
                    chosen = j;
                    break;
                }
            }
            chosen
        } else {
            rng.gen_range(0..points.len())
        };

        let center = points[idx].clone();
        for (c, p) in closest.iter_mut().zip(points) {
            *c = c.min(sq_dist(p, &center));
        }
        centers.push(center);
    }

    centers
}

fn lloyd(points: &[Vec<f32>], mut centers: Vec<Vec<f32>>, max_iterations: usize) -> ClusterResult {
    let k = centers.len();
    let dim = points[0].len();
    let mut labels = vec![usize::MAX; points.len()];

    for _ in 0..max_iterations.max(1) {
        let mut changed = false;
        for (label, p) in labels.iter_mut().zip(points) {
            let nearest = nearest_center(p, &centers);
            if *label != nearest {
                *label = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (&label, p) in labels.iter().zip(points) {
            counts[label] += 1;
            for (s, &x) in sums[label].iter_mut().zip(p) {
                *s += x as f64;
            }
        }
        // empty clusters keep their previous center
        for c in 0..k {
            if counts[c] > 0 {
                for (dst, s) in centers[c].iter_mut().zip(&sums[c]) {
                    *dst = (s / counts[c] as f64) as f32;
                }
            }
        }
    }

    let inertia = labels
        .iter()
        .zip(points)
        .map(|(&l, p)| sq_dist(p, &centers[l]))
        .sum();

    ClusterResult {
        labels,
        n_clusters: k,
        inertia,
    }
}

fn nearest_center(p: &[f32], centers: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centers.iter().enumerate() {
        let d = sq_dist(p, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}
