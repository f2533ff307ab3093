//! Clustering model bound to a dataset and an attribute selection.
//!
//! [`ClusteringModel`] owns one [`ClusterEstimator`], the dataset it was fit
//! on and the ordered attribute references that make up its feature matrix.
//! Predictions are memoized per dataset fingerprint.

use crate::LabelArray;
use crate::Matrix;
use crate::cache::{CacheConfig, CacheStats, Memo};
use crate::cluster::ClusterEstimator;
use crate::dataset::{AttributeRef, Dataset, DatasetKey};
use crate::error::{Error, Result};
use ndarray::{Array1, IxDyn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// How the estimator gets its fit state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitMode {
    /// Fit the estimator on the training data during construction.
    #[default]
    Fit,
    /// The estimator is already fit; only predict on the training data.
    Prefitted,
}

/// Model construction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub fit: FitMode,
    pub cache: CacheConfig,
}

impl ModelConfig {
    pub fn prefitted() -> Self {
        Self {
            fit: FitMode::Prefitted,
            ..Self::default()
        }
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

pub struct ClusteringModel {
    estimator: Box<dyn ClusterEstimator>,
    training_data: Arc<dyn Dataset>,
    attribute_refs: Vec<AttributeRef>,
    n_clusters: usize,
    predictions: Mutex<Memo<DatasetKey, LabelArray>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for ClusteringModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusteringModel")
            .field("estimator", &self.estimator)
            .field("training_data", &self.training_data.label())
            .field("attributes", &self.attributes())
            .field("n_clusters", &self.n_clusters)
            .field("predictions", &*self.predictions.lock())
            .field("generation", &self.generation())
            .finish()
    }
}

impl ClusteringModel {
    /// Bind `estimator` to `data` and the attributes named in `attributes`.
    ///
    /// With [`FitMode::Fit`] the estimator is fit on `data`; with
    /// [`FitMode::Prefitted`] it must already support prediction. Either way
    /// the cluster count is taken from the labels of `data`.
    pub fn new<E, S>(
        estimator: E,
        data: Arc<dyn Dataset>,
        attributes: &[S],
        config: ModelConfig,
    ) -> Result<Self>
    where
        E: ClusterEstimator + 'static,
        S: AsRef<str>,
    {
        if attributes.is_empty() {
            return Err(Error::EmptyInput);
        }
        let attribute_refs = attributes
            .iter()
            .map(|name| data.resolve(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut model = Self {
            estimator: Box::new(estimator),
            training_data: data,
            attribute_refs,
            n_clusters: 0,
            predictions: Mutex::new(Memo::new(config.cache)),
            generation: AtomicU64::new(0),
        };

        let labels = match config.fit {
            FitMode::Fit => {
                let x = model.build_feature_matrix(&*model.training_data)?;
                let flat = model.estimator.fit_predict(&x)?;
                Arc::new(reshape_labels(flat, &*model.training_data)?)
            }
            FitMode::Prefitted => {
                let data = Arc::clone(&model.training_data);
                model.predict(&*data)?
            }
        };
        model.n_clusters = match labels.iter().max() {
            Some(&max) => max.checked_add(1).ok_or(Error::InvalidLabel { label: max })?,
            None => 0,
        };

        info!(
            data = model.training_data.label(),
            attributes = ?model.attributes(),
            n_elements = labels.len(),
            n_clusters = model.n_clusters,
            mode = ?config.fit,
            "clustering model ready"
        );
        Ok(model)
    }

    /// Stack the model's attributes of `data` column by column.
    ///
    /// Row `i` holds element `i` of every attribute in row-major order, and
    /// column `j` is the `j`-th attribute the model was built with.
    pub fn build_feature_matrix(&self, data: &dyn Dataset) -> Result<Matrix> {
        let shape = data.shape();
        let mut x = Matrix::zeros((data.len(), self.attribute_refs.len()));

        for (j, attribute) in self.attribute_refs.iter().enumerate() {
            let values = data.values(attribute)?;
            if values.shape() != shape {
                return Err(Error::ShapeMismatch {
                    expected: shape.to_vec(),
                    found: values.shape().to_vec(),
                });
            }
            for (dst, &v) in x.column_mut(j).iter_mut().zip(values.iter()) {
                *dst = v;
            }
        }

        Ok(x)
    }

    /// Cluster label of every element of `data`, shaped like `data`.
    ///
    /// Calling this again for an unchanged dataset returns the cached array.
    /// The cache lock is not held while the estimator runs; when two callers
    /// miss at once both compute, and both get the result stored first.
    pub fn predict(&self, data: &dyn Dataset) -> Result<Arc<LabelArray>> {
        let key = data.key();
        let hit = self.predictions.lock().get(&key);
        if let Some(labels) = hit {
            if labels.shape() == data.shape() {
                debug!(data = data.label(), ?key, "prediction cache hit");
                return Ok(labels);
            }
            // Another dataset reported the same key.
            warn!(
                data = data.label(),
                ?key,
                cached = ?labels.shape(),
                shape = ?data.shape(),
                "cached prediction has the wrong shape, recomputing"
            );
            self.predictions.lock().remove(&key);
        }

        debug!(data = data.label(), ?key, "prediction cache miss");
        let x = self.build_feature_matrix(data)?;
        let flat = self.estimator.predict(&x)?;
        let labels = Arc::new(reshape_labels(flat, data)?);

        // n_clusters is still 0 while a prefitted model is being built.
        if self.n_clusters > 0 {
            let outside = labels.iter().filter(|&&l| l >= self.n_clusters).count();
            if outside > 0 {
                warn!(
                    data = data.label(),
                    outside,
                    n_clusters = self.n_clusters,
                    "predicted labels outside the clusters found at fit time"
                );
            }
        }

        let mut predictions = self.predictions.lock();
        let stored = predictions.put_if_absent(key, Arc::clone(&labels));
        if stored.shape() == data.shape() {
            return Ok(stored);
        }
        predictions.put(key, Arc::clone(&labels));
        Ok(labels)
    }

    /// Forget cached predictions for `data`.
    ///
    /// Also bumps [`ClusteringModel::generation`], which makes every subset
    /// state built on this model drop its cached masks.
    pub fn invalidate(&self, data: &dyn Dataset) {
        let removed = self.predictions.lock().invalidate(data.key().id);
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!(data = data.label(), removed, "invalidated predictions");
    }

    pub fn clear_cache(&self) {
        self.predictions.lock().clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Counter bumped by every invalidation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.predictions.lock().stats()
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Attribute names, in feature-matrix column order.
    pub fn attributes(&self) -> Vec<String> {
        self.attribute_refs
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }

    pub fn attribute_refs(&self) -> &[AttributeRef] {
        &self.attribute_refs
    }

    /// The dataset the model was fit on.
    pub fn training_data(&self) -> &Arc<dyn Dataset> {
        &self.training_data
    }

    pub fn estimator(&self) -> &dyn ClusterEstimator {
        &*self.estimator
    }
}

fn reshape_labels(flat: Array1<usize>, data: &dyn Dataset) -> Result<LabelArray> {
    if flat.len() != data.len() {
        return Err(Error::LabelCountMismatch {
            expected: data.len(),
            found: flat.len(),
        });
    }
    flat.into_shape_with_order(IxDyn(data.shape()))
        .map_err(|_| Error::ShapeMismatch {
            expected: data.shape().to_vec(),
            found: vec![data.len()],
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::KMeans;
    use crate::dataset::Data;
    use ndarray::array;

    fn points() -> Arc<Data> {
        let mut data = Data::new("points");
        data.add_component("x", array![0.0, 0.0, 10.0, 10.0].into_dyn()).unwrap();
        data.add_component("y", array![0.0, 1.0, 10.0, 11.0].into_dyn()).unwrap();
        Arc::new(data)
    }

    #[test]
    fn test_eager_fit() {
        let data = points();
        let model = ClusteringModel::new(
            KMeans::new(2).random_state(0),
            data.clone(),
            &["x", "y"],
            ModelConfig::default(),
        )
        .unwrap();

        assert_eq!(model.n_clusters(), 2);
        assert_eq!(model.attributes(), vec!["x", "y"]);

        let labels = model.predict(&*data).unwrap();
        assert_eq!(labels.shape(), &[4]);
        assert_eq!(labels[[0]], labels[[1]]);
        assert_eq!(labels[[2]], labels[[3]]);
        assert_ne!(labels[[0]], labels[[2]]);
    }

    #[test]
    fn test_feature_matrix_column_order() {
        let mut data = Data::new("grid");
        data.add_component("a", array![[1.0, 2.0], [3.0, 4.0]].into_dyn()).unwrap();
        data.add_component("b", array![[5.0, 6.0], [7.0, 8.0]].into_dyn()).unwrap();
        let data = Arc::new(data);

        let model = ClusteringModel::new(
            KMeans::new(2).random_state(1),
            data.clone(),
            &["b", "a"],
            ModelConfig::default(),
        )
        .unwrap();

        let x = model.build_feature_matrix(&*data).unwrap();
        assert_eq!(x, array![[5.0, 1.0], [6.0, 2.0], [7.0, 3.0], [8.0, 4.0]]);
    }

    #[test]
    fn test_empty_attribute_list() {
        let names: [&str; 0] = [];
        let config = ModelConfig::default();
        let result = ClusteringModel::new(KMeans::new(2), points(), &names, config);
        assert!(matches!(result, Err(Error::EmptyInput)));
    }

    #[test]
    fn test_prefitted_requires_fit() {
        let config = ModelConfig::prefitted();
        let result = ClusteringModel::new(KMeans::new(2), points(), &["x"], config);
        assert!(matches!(result, Err(Error::NotFitted)));
    }

    #[test]
    fn test_predict_is_memoized() {
        let data = points();
        let model = ClusteringModel::new(
            KMeans::new(2).random_state(0),
            data.clone(),
            &["x", "y"],
            ModelConfig::default(),
        )
        .unwrap();

        let first = model.predict(&*data).unwrap();
        let second = model.predict(&*data).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = model.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);

        let generation = model.generation();
        model.invalidate(&*data);
        let third = model.predict(&*data).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(first, third);
        assert!(model.generation() > generation);
    }

    #[test]
    fn test_concurrent_misses_share_one_result() {
        let data = points();
        let model = ClusteringModel::new(
            KMeans::new(2).random_state(0),
            data.clone(),
            &["x", "y"],
            ModelConfig::default(),
        )
        .unwrap();

        let results: Vec<Arc<LabelArray>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| model.predict(&*data).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        let cached = model.predict(&*data).unwrap();
        for labels in &results {
            assert!(Arc::ptr_eq(labels, &cached));
        }
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: ModelConfig = serde_json::from_str(r#"{"fit": "prefitted"}"#).unwrap();
        assert_eq!(config.fit, FitMode::Prefitted);
        assert_eq!(config.cache, CacheConfig::default());
    }
}
