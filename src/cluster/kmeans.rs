use super::ClusterEstimator;
use crate::Matrix;
use crate::error::{Error, Result};
use ndarray::{Array1, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Centroid seeding strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KMeansInit {
    /// k-means++: spread seeds proportionally to squared distance.
    #[default]
    KMeansPlusPlus,
    /// k distinct rows drawn uniformly.
    Random,
}

#[derive(Clone, Debug)]
pub struct KMeans {
    pub cluster_centers: Option<Matrix>,
    pub labels: Option<Array1<usize>>,
    pub inertia: Option<f64>,
    n_clusters: usize,
    max_iter: usize,
    tolerance: f64,
    random_state: Option<u64>,
    init: KMeansInit,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            cluster_centers: None,
            labels: None,
            inertia: None,
            n_clusters,
            max_iter: 300,
            tolerance: 1e-4,
            random_state: None,
            init: KMeansInit::KMeansPlusPlus,
        }
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    pub fn init(mut self, init: KMeansInit) -> Self {
        self.init = init;
        self
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn is_fitted(&self) -> bool {
        self.cluster_centers.is_some()
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<()> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(Error::EmptyInput);
        }
        if self.n_clusters == 0 {
            return Err(Error::invalid_parameter("n_clusters", "must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(Error::invalid_parameter("max_iter", "must be > 0"));
        }
        if !(self.tolerance >= 0.0) {
            return Err(Error::invalid_parameter(
                "tolerance",
                format!("must be >= 0, got {}", self.tolerance),
            ));
        }
        if x.nrows() < self.n_clusters {
            return Err(Error::InvalidClusterCount {
                requested: self.n_clusters,
                n_items: x.nrows(),
            });
        }

        let mut rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut centroids = self.initialize_centroids(x, &mut rng);
        let mut labels = Array1::zeros(x.nrows());

        for _ in 0..self.max_iter {
            self.assign(x, &centroids, &mut labels);

            let old_centroids = centroids.clone();
            let mut sums = Matrix::zeros(centroids.raw_dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (row, &label) in x.axis_iter(Axis(0)).zip(labels.iter()) {
                let mut sum = sums.row_mut(label);
                sum += &row;
                counts[label] += 1;
            }
            // Empty clusters keep their previous centroid.
            for (k, &count) in counts.iter().enumerate() {
                if count > 0 {
                    let mean = &sums.row(k) / count as f64;
                    centroids.row_mut(k).assign(&mean);
                }
            }

            if self.max_centroid_shift(&old_centroids, &centroids) < self.tolerance {
                break;
            }
        }

        // Final assignment against the final centroids, so that
        // fit_predict(x) and predict(x) agree.
        self.assign(x, &centroids, &mut labels);

        let inertia = x
            .axis_iter(Axis(0))
            .zip(labels.iter())
            .map(|(row, &label)| squared_distance(&row, &centroids.row(label)))
            .sum();

        self.cluster_centers = Some(centroids);
        self.labels = Some(labels);
        self.inertia = Some(inertia);

        Ok(())
    }

    pub fn predict(&self, x: &Matrix) -> Result<Array1<usize>> {
        let centroids = self.cluster_centers.as_ref().ok_or(Error::NotFitted)?;

        if x.ncols() != centroids.ncols() {
            return Err(Error::DimensionMismatch {
                expected: centroids.ncols(),
                found: x.ncols(),
            });
        }

        let mut labels = Array1::zeros(x.nrows());
        self.assign(x, centroids, &mut labels);
        Ok(labels)
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Array1<usize>> {
        self.fit(x)?;
        self.labels.clone().ok_or(Error::NotFitted)
    }

    /// Distance of every row of `x` to every centroid.
    pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let centroids = self.cluster_centers.as_ref().ok_or(Error::NotFitted)?;

        if x.ncols() != centroids.ncols() {
            return Err(Error::DimensionMismatch {
                expected: centroids.ncols(),
                found: x.ncols(),
            });
        }

        let mut distances = Matrix::zeros((x.nrows(), centroids.nrows()));
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            for (k, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
                distances[[i, k]] = squared_distance(&row, &centroid).sqrt();
            }
        }

        Ok(distances)
    }

    fn assign(&self, x: &Matrix, centroids: &Matrix, labels: &mut Array1<usize>) {
        for (row, label) in x.axis_iter(Axis(0)).zip(labels.iter_mut()) {
            let mut min_distance = f64::INFINITY;
            let mut closest = 0;
            for (k, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
                let distance = squared_distance(&row, &centroid);
                if distance < min_distance {
                    min_distance = distance;
                    closest = k;
                }
            }
            *label = closest;
        }
    }

    fn initialize_centroids(&self, x: &Matrix, rng: &mut StdRng) -> Matrix {
        let n_samples = x.nrows();
        let mut centroids = Matrix::zeros((self.n_clusters, x.ncols()));

        match self.init {
            KMeansInit::Random => {
                let picks = rand::seq::index::sample(rng, n_samples, self.n_clusters);
                for (k, idx) in picks.iter().enumerate() {
                    centroids.row_mut(k).assign(&x.row(idx));
                }
            }
            KMeansInit::KMeansPlusPlus => {
                let first = rng.gen_range(0..n_samples);
                centroids.row_mut(0).assign(&x.row(first));

                let mut closest = Array1::from_elem(n_samples, f64::INFINITY);
                for k in 1..self.n_clusters {
                    let latest = centroids.row(k - 1).to_owned();
                    for (row, best) in x.axis_iter(Axis(0)).zip(closest.iter_mut()) {
                        *best = best.min(squared_distance(&row, &latest.view()));
                    }

                    let total: f64 = closest.sum();
                    let next = if total > 0.0 {
                        let target = rng.r#gen::<f64>() * total;
                        let mut cumulative = 0.0;
                        closest
                            .iter()
                            .position(|&d| {
                                cumulative += d;
                                cumulative >= target
                            })
                            .unwrap_or(n_samples - 1)
                    } else {
                        // Every row coincides with a seed.
                        rng.gen_range(0..n_samples)
                    };
                    centroids.row_mut(k).assign(&x.row(next));
                }
            }
        }

        centroids
    }

    fn max_centroid_shift(&self, old_centroids: &Matrix, new_centroids: &Matrix) -> f64 {
        old_centroids
            .axis_iter(Axis(0))
            .zip(new_centroids.axis_iter(Axis(0)))
            .map(|(old, new)| squared_distance(&old, &new).sqrt())
            .fold(0.0, f64::max)
    }
}

impl ClusterEstimator for KMeans {
    fn fit_predict(&mut self, x: &Matrix) -> Result<Array1<usize>> {
        KMeans::fit_predict(self, x)
    }

    fn predict(&self, x: &Matrix) -> Result<Array1<usize>> {
        KMeans::predict(self, x)
    }
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}
