//! Convenience entry points for the host application.
//!
//! ```rust
//! use cluster_subsets::{Data, DataCollection, KMeans, ModelConfig, fit_and_create_clusters};
//! use ndarray::array;
//!
//! let mut data = Data::new("points");
//! data.add_component("x", array![0.0, 0.0, 10.0, 10.0].into_dyn()).unwrap();
//! data.add_component("y", array![0.0, 1.0, 10.0, 11.0].into_dyn()).unwrap();
//!
//! let mut collection = DataCollection::new();
//! collection.append(data);
//!
//! let model = fit_and_create_clusters(
//!     &mut collection,
//!     "points",
//!     &["x", "y"],
//!     || KMeans::new(2).random_state(0),
//!     None,
//!     ModelConfig::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(model.n_clusters(), 2);
//! assert!(collection.subset_group("cluster_0").is_some());
//! assert!(collection.subset_group("cluster_1").is_some());
//! ```

use crate::cluster::ClusterEstimator;
use crate::collection::DataCollection;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::model::{ClusteringModel, ModelConfig};
use crate::subset::ClusterSubsetState;
use std::sync::Arc;

/// Subset name pattern used when none is given.
pub const DEFAULT_NAME_PATTERN: &str = "cluster_{index}";

/// Build an estimator with `factory` and fit it on `data`.
pub fn create_model<E, F, S>(
    data: Arc<dyn Dataset>,
    attributes: &[S],
    factory: F,
    config: ModelConfig,
) -> Result<ClusteringModel>
where
    E: ClusterEstimator + 'static,
    F: FnOnce() -> E,
    S: AsRef<str>,
{
    ClusteringModel::new(factory(), data, attributes, config)
}

/// Fit a model on the dataset labelled `data_label` and add one subset group
/// per cluster to `collection`.
///
/// Groups are named from `name_pattern` (default [`DEFAULT_NAME_PATTERN`]),
/// where `{index}` or `{0}` stands for the cluster index. `config` is passed
/// to [`ClusteringModel::new`], so a prefitted estimator or a custom cache
/// size can be used.
pub fn fit_and_create_clusters<E, F, S>(
    collection: &mut DataCollection,
    data_label: &str,
    attributes: &[S],
    factory: F,
    name_pattern: Option<&str>,
    config: ModelConfig,
) -> Result<Arc<ClusteringModel>>
where
    E: ClusterEstimator + 'static,
    F: FnOnce() -> E,
    S: AsRef<str>,
{
    let data = collection.get(data_label)?;
    let model = Arc::new(create_model(data, attributes, factory, config)?);

    let pattern = name_pattern.unwrap_or(DEFAULT_NAME_PATTERN);
    for index in 0..model.n_clusters() {
        let state = ClusterSubsetState::new(Arc::clone(&model), index)?;
        collection.new_subset_group(cluster_name(pattern, index), Box::new(state));
    }

    Ok(model)
}

/// Substitute `index` into a subset name pattern.
pub fn cluster_name(pattern: &str, index: usize) -> String {
    let index = index.to_string();
    pattern.replace("{index}", &index).replace("{0}", &index)
}
