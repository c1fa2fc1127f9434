//! Full-covariance Gaussian mixture color model.
//!
//! Fitted by k-means (seeded farthest-point initialization) followed by one
//! hard-assignment refinement step. Colors are in 0..255 RGB units.

use nalgebra::{Matrix3, Vector3};
use rand::Rng;

const COV_REGULARIZATION: f64 = 0.01;
const KMEANS_ITERS: usize = 10;
const LOG_2PI: f64 = 1.837_877_066_409_345_3;

#[derive(Debug, Clone)]
struct Gaussian {
    mean: Vector3<f64>,
    inv_cov: Matrix3<f64>,
    /// ln(weight) - 0.5 * (3 ln 2pi + ln det(cov))
    log_norm: f64,
}

impl Gaussian {
    #[inline]
    fn log_density(&self, z: &Vector3<f64>) -> f64 {
        let d = z - self.mean;
        self.log_norm - 0.5 * d.dot(&(self.inv_cov * d))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Gmm {
    components: Vec<Gaussian>,
}

#[inline]
fn to_vec(c: &[f64; 3]) -> Vector3<f64> {
    Vector3::new(c[0], c[1], c[2])
}

#[inline]
fn dist_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn nearest_center(z: &[f64; 3], centers: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centers.iter().enumerate() {
        let d = dist_sq(z, c);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

fn kmeans(samples: &[[f64; 3]], k: usize, rng: &mut impl Rng) -> Vec<usize> {
    let n = samples.len();
    let mut centers = vec![samples[rng.gen_range(0..n)]];
    let mut min_d: Vec<f64> = samples.iter().map(|s| dist_sq(s, &centers[0])).collect();
    while centers.len() < k {
        let (far_idx, far_d) = min_d
            .iter()
            .copied()
            .enumerate()
            .fold((0, -1.0), |acc, (i, d)| if d > acc.1 { (i, d) } else { acc });
        if far_d <= 0.0 {
            // Fewer distinct colors than components.
            break;
        }
        let c = samples[far_idx];
        for (d, s) in min_d.iter_mut().zip(samples) {
            *d = d.min(dist_sq(s, &c));
        }
        centers.push(c);
    }

    let mut assign = vec![0usize; n];
    for _ in 0..KMEANS_ITERS {
        let mut changed = false;
        for (a, s) in assign.iter_mut().zip(samples) {
            let c = nearest_center(s, &centers);
            if c != *a {
                *a = c;
                changed = true;
            }
        }
        let mut sums = vec![[0.0f64; 3]; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (&a, s) in assign.iter().zip(samples) {
            for c in 0..3 {
                sums[a][c] += s[c];
            }
            counts[a] += 1;
        }
        for (i, center) in centers.iter_mut().enumerate() {
            if counts[i] > 0 {
                let inv = 1.0 / counts[i] as f64;
                *center = [sums[i][0] * inv, sums[i][1] * inv, sums[i][2] * inv];
            }
        }
        if !changed {
            break;
        }
    }
    assign
}

fn learn(samples: &[[f64; 3]], assign: &[usize], k: usize) -> Vec<Gaussian> {
    let n = samples.len() as f64;
    let mut counts = vec![0usize; k];
    let mut sums = vec![Vector3::zeros(); k];
    let mut prods = vec![Matrix3::zeros(); k];
    for (&a, s) in assign.iter().zip(samples) {
        let z = to_vec(s);
        counts[a] += 1;
        sums[a] += z;
        prods[a] += z * z.transpose();
    }

    let mut out = Vec::with_capacity(k);
    for i in 0..k {
        if counts[i] == 0 {
            continue;
        }
        let m = counts[i] as f64;
        let mean = sums[i] / m;
        let mut cov = prods[i] / m - mean * mean.transpose();
        cov += Matrix3::identity() * COV_REGULARIZATION;
        let mut det = cov.determinant();
        let mut reg = COV_REGULARIZATION;
        while det <= 1e-12 && reg < 1e3 {
            reg *= 10.0;
            cov += Matrix3::identity() * reg;
            det = cov.determinant();
        }
        let Some(inv_cov) = cov.try_inverse() else {
            continue;
        };
        let weight = m / n;
        out.push(Gaussian {
            mean,
            inv_cov,
            log_norm: weight.ln() - 0.5 * (3.0 * LOG_2PI + det.ln()),
        });
    }
    out
}

impl Gmm {
    /// Fit a mixture with at most `k` components. Returns `None` for an empty
    /// sample set.
    pub(crate) fn fit(samples: &[[f64; 3]], k: usize, rng: &mut impl Rng) -> Option<Self> {
        if samples.is_empty() || k == 0 {
            return None;
        }
        let k = k.min(samples.len());
        let assign = kmeans(samples, k, rng);
        let initial = Self {
            components: learn(samples, &assign, k),
        };
        if initial.components.is_empty() {
            return None;
        }

        // One hard-EM step: reassign to the most likely component and relearn.
        let reassigned: Vec<usize> = samples
            .iter()
            .map(|s| initial.best_component(&to_vec(s)))
            .collect();
        let components = learn(samples, &reassigned, initial.components.len());
        if components.is_empty() {
            return Some(initial);
        }
        Some(Self { components })
    }

    pub(crate) fn n_components(&self) -> usize {
        self.components.len()
    }

    fn best_component(&self, z: &Vector3<f64>) -> usize {
        let mut best = 0;
        let mut best_ll = f64::NEG_INFINITY;
        for (i, g) in self.components.iter().enumerate() {
            let ll = g.log_density(z);
            if ll > best_ll {
                best_ll = ll;
                best = i;
            }
        }
        best
    }

    /// Mixture log-likelihood ln sum_k w_k N(z | mu_k, Sigma_k).
    pub(crate) fn log_likelihood(&self, color: &[f64; 3]) -> f64 {
        let z = to_vec(color);
        let lls: Vec<f64> = self.components.iter().map(|g| g.log_density(&z)).collect();
        let max = lls.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return max;
        }
        max + lls.iter().map(|ll| (ll - max).exp()).sum::<f64>().ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_blobs() -> Vec<[f64; 3]> {
        let mut out = Vec::new();
        for i in 0..50 {
            let j = (i % 5) as f64;
            out.push([20.0 + j, 30.0 - j, 40.0]);
            out.push([220.0 - j, 210.0, 190.0 + j]);
        }
        out
    }

    #[test]
    fn fit_separates_color_clusters() {
        let mut rng = StdRng::seed_from_u64(7);
        let gmm = Gmm::fit(&two_blobs(), 2, &mut rng).unwrap();
        assert_eq!(gmm.n_components(), 2);
        let near = gmm.log_likelihood(&[22.0, 28.0, 40.0]);
        let far = gmm.log_likelihood(&[120.0, 120.0, 120.0]);
        assert!(near > far + 10.0, "near={} far={}", near, far);
    }

    #[test]
    fn degenerate_single_color_is_regularized() {
        let samples = vec![[10.0, 10.0, 10.0]; 100];
        let mut rng = StdRng::seed_from_u64(1);
        let gmm = Gmm::fit(&samples, 5, &mut rng).unwrap();
        assert_eq!(gmm.n_components(), 1);
        let ll = gmm.log_likelihood(&[10.0, 10.0, 10.0]);
        assert!(ll.is_finite());
        assert!(ll > gmm.log_likelihood(&[12.0, 10.0, 10.0]));
    }

    #[test]
    fn empty_samples_give_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(Gmm::fit(&[], 5, &mut rng).is_none());
    }

    #[test]
    fn fit_is_deterministic_for_seed() {
        let samples = two_blobs();
        let a = Gmm::fit(&samples, 3, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = Gmm::fit(&samples, 3, &mut StdRng::seed_from_u64(9)).unwrap();
        let z = [100.0, 90.0, 80.0];
        assert_eq!(a.log_likelihood(&z), b.log_likelihood(&z));
    }
}
