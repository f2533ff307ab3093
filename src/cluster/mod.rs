//! Clustering estimators.
//!
//! [`ClusterEstimator`] is the capability the adapter requires from a
//! clustering algorithm: a combined fit-and-predict step and a standalone
//! predict step, both mapping a feature matrix (one row per element) to one
//! label per row.
//!
//! `KMeans` is bundled so the adapter works out of the box. Any other
//! algorithm plugs in by implementing the trait.
//!
//! # Examples
//!
//! ```rust
//! use cluster_subsets::{ClusterEstimator, KMeans};
//! use ndarray::array;
//!
//! let x = array![
//!     [0.0, 0.0],
//!     [0.0, 1.0],
//!     [10.0, 10.0],
//!     [10.0, 11.0]
//! ];
//!
//! let mut kmeans = KMeans::new(2).random_state(7);
//! let labels = kmeans.fit_predict(&x).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//!
//! // Once fit, new points can be assigned.
//! let new_labels = kmeans.predict(&array![[0.5, 0.5]]).unwrap();
//! assert_eq!(new_labels[0], labels[0]);
//! ```

mod kmeans;

pub use kmeans::{KMeans, KMeansInit};

use crate::Matrix;
use crate::error::Result;
use ndarray::Array1;

/// Common interface for hard clustering estimators (one label per row).
pub trait ClusterEstimator: Send + Sync + std::fmt::Debug {
    /// Fit the estimator on `x` and return the label of every row.
    fn fit_predict(&mut self, x: &Matrix) -> Result<Array1<usize>>;

    /// Assign every row of `x` to a cluster. Requires a prior fit.
    fn predict(&self, x: &Matrix) -> Result<Array1<usize>>;
}

impl<E: ClusterEstimator + ?Sized> ClusterEstimator for Box<E> {
    fn fit_predict(&mut self, x: &Matrix) -> Result<Array1<usize>> {
        (**self).fit_predict(x)
    }

    fn predict(&self, x: &Matrix) -> Result<Array1<usize>> {
        (**self).predict(x)
    }
}
