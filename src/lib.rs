//! Clustering models as first-class dataset subsets.
//!
//! A [`ClusteringModel`] binds a [`ClusterEstimator`] to a dataset and a
//! selection of its attributes. A [`ClusterSubsetState`] turns one of the
//! model's clusters into a boolean membership mask a visualization host can
//! filter and render with, like any other subset.
//!
//! Predictions and masks are memoized per dataset fingerprint, so every
//! subset state of a model shares a single prediction per dataset.

#![forbid(unsafe_code)]

pub use ndarray::{Array1, Array2, ArrayD};

pub mod cache;
pub mod cluster;
pub mod collection;
pub mod dataset;
pub mod error;
pub mod model;
pub mod subset;
pub mod subsets;

pub use cache::{CacheConfig, CacheStats};
pub use cluster::{ClusterEstimator, KMeans, KMeansInit};
pub use collection::{DataCollection, SubsetGroup};
pub use dataset::{AttributeRef, Data, Dataset, DatasetKey};
pub use error::{Error, Result};
pub use model::{ClusteringModel, FitMode, ModelConfig};
pub use subset::{
    AxisSlice, ClusterSubsetState, CompositeSubsetState, SubsetOp, SubsetState, View,
};
pub use subsets::{DEFAULT_NAME_PATTERN, cluster_name, create_model, fit_and_create_clusters};

pub type Matrix = Array2<f64>;
/// Cluster label per dataset element.
pub type LabelArray = ArrayD<usize>;
/// Membership per dataset element.
pub type Mask = ArrayD<bool>;
