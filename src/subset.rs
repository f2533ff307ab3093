//! Subset states: boolean membership predicates over datasets.
//!
//! [`ClusterSubsetState`] selects the elements a [`ClusteringModel`] assigns
//! to one cluster. [`CompositeSubsetState`] combines any subset states with
//! boolean logic.

use crate::LabelArray;
use crate::Mask;
use crate::cache::{CacheConfig, CacheStats, Memo};
use crate::dataset::{Dataset, DatasetKey};
use crate::error::{Error, Result};
use crate::model::ClusteringModel;
use ndarray::{Array1, Slice, Zip};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// A boolean membership test the host can render, filter and combine.
pub trait SubsetState: Send + Sync + std::fmt::Debug {
    /// Membership of every element of `data`, optionally restricted to `view`.
    fn to_mask(&self, data: &dyn Dataset, view: Option<&View>) -> Result<Arc<Mask>>;

    /// A new state selecting the same elements.
    fn copy(&self) -> Box<dyn SubsetState>;

    /// Names of the attributes membership depends on.
    fn attributes(&self) -> Vec<String>;
}

/// Range along one axis. `end: None` runs to the end of the axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisSlice {
    pub start: usize,
    pub end: Option<usize>,
    pub step: usize,
}

impl AxisSlice {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
            step: 1,
        }
    }

    pub fn all() -> Self {
        Self {
            start: 0,
            end: None,
            step: 1,
        }
    }

    pub fn step_by(mut self, step: usize) -> Self {
        self.step = step;
        self
    }
}

/// Sub-selection of a dataset's element space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum View {
    /// One range per axis; keeps the dimensionality.
    Slice(Vec<AxisSlice>),
    /// Flat row-major positions; yields a 1-D mask.
    ///
    /// Positions index the flattened element space, so on an n-dimensional
    /// mask `Indices(vec![3])` is one element, not the fourth row as with
    /// numpy integer-array indexing.
    Indices(Vec<usize>),
}

impl View {
    /// Restrict `mask` to this view.
    pub fn apply(&self, mask: &Mask) -> Result<Mask> {
        match self {
            View::Slice(axes) => {
                if axes.len() != mask.ndim() {
                    return Err(Error::InvalidView(format!(
                        "{} axis ranges for a {}-dimensional mask",
                        axes.len(),
                        mask.ndim()
                    )));
                }
                for (axis, (range, &len)) in axes.iter().zip(mask.shape()).enumerate() {
                    let end = range.end.unwrap_or(len);
                    if range.step == 0 {
                        return Err(Error::InvalidView(format!("zero step on axis {axis}")));
                    }
                    if range.start > end || end > len {
                        return Err(Error::InvalidView(format!(
                            "range {}..{} out of bounds for axis {axis} of length {len}",
                            range.start, end
                        )));
                    }
                }
                let sliced = mask.slice_each_axis(|desc| {
                    let range = &axes[desc.axis.index()];
                    let end = range.end.unwrap_or(desc.len);
                    Slice::new(range.start as isize, Some(end as isize), range.step as isize)
                });
                Ok(sliced.to_owned())
            }
            View::Indices(indices) => {
                let flat: Vec<bool> = mask.iter().copied().collect();
                let picked = indices
                    .iter()
                    .map(|&i| {
                        flat.get(i).copied().ok_or_else(|| {
                            Error::InvalidView(format!(
                                "index {i} out of bounds for {} elements",
                                flat.len()
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Array1::from(picked).into_dyn())
            }
        }
    }
}

type MaskKey = (DatasetKey, Option<View>);

/// A cached mask and the prediction it was derived from.
#[derive(Debug)]
struct MaskEntry {
    labels: Arc<LabelArray>,
    mask: Arc<Mask>,
}

#[derive(Debug)]
struct MaskCache {
    /// Model generation the entries were computed under.
    generation: u64,
    memo: Memo<MaskKey, MaskEntry>,
}

impl MaskCache {
    fn new(config: CacheConfig, generation: u64) -> Self {
        Self {
            generation,
            memo: Memo::new(config),
        }
    }

    /// Drop every entry computed before the model's latest invalidation.
    fn sync(&mut self, generation: u64) {
        if self.generation != generation {
            debug!(
                from = self.generation,
                to = generation,
                dropped = self.memo.len(),
                "model invalidated, dropping cluster masks"
            );
            self.memo.clear();
            self.generation = generation;
        }
    }
}

/// Elements whose predicted cluster equals a fixed index.
///
/// Masks are memoized per dataset fingerprint and view. A cached mask is only
/// reused while the model still returns the prediction it was built from, so
/// invalidating the model also invalidates the masks of every state on it.
#[derive(Debug)]
pub struct ClusterSubsetState {
    model: Arc<ClusteringModel>,
    cluster: usize,
    cache: CacheConfig,
    masks: Mutex<MaskCache>,
}

impl ClusterSubsetState {
    /// Select cluster `cluster` of `model`.
    ///
    /// Fails with [`Error::ClusterIndexOutOfRange`] unless
    /// `cluster < model.n_clusters()`.
    pub fn new(model: Arc<ClusteringModel>, cluster: usize) -> Result<Self> {
        Self::with_cache(model, cluster, CacheConfig::default())
    }

    pub fn with_cache(
        model: Arc<ClusteringModel>,
        cluster: usize,
        cache: CacheConfig,
    ) -> Result<Self> {
        if cluster >= model.n_clusters() {
            return Err(Error::ClusterIndexOutOfRange {
                index: cluster,
                n_clusters: model.n_clusters(),
            });
        }
        let masks = Mutex::new(MaskCache::new(cache, model.generation()));
        Ok(Self {
            model,
            cluster,
            cache,
            masks,
        })
    }

    pub fn model(&self) -> &Arc<ClusteringModel> {
        &self.model
    }

    pub fn cluster(&self) -> usize {
        self.cluster
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.masks.lock().memo.stats()
    }

    /// Forget cached masks for `data`.
    pub fn invalidate(&self, data: &dyn Dataset) {
        let removed = self.masks.lock().memo.invalidate(data.key().id);
        debug!(data = data.label(), cluster = self.cluster, removed, "invalidated masks");
    }

    pub fn clear_cache(&self) {
        self.masks.lock().memo.clear();
    }
}

impl Clone for ClusterSubsetState {
    fn clone(&self) -> Self {
        Self {
            model: Arc::clone(&self.model),
            cluster: self.cluster,
            cache: self.cache,
            masks: Mutex::new(MaskCache::new(self.cache, self.model.generation())),
        }
    }
}

impl SubsetState for ClusterSubsetState {
    fn to_mask(&self, data: &dyn Dataset, view: Option<&View>) -> Result<Arc<Mask>> {
        let generation = self.model.generation();
        let labels = self.model.predict(data)?;
        let key = (data.key(), view.cloned());
        {
            let mut masks = self.masks.lock();
            masks.sync(generation);
            if let Some(entry) = masks.memo.get(&key) {
                if Arc::ptr_eq(&entry.labels, &labels) {
                    return Ok(Arc::clone(&entry.mask));
                }
                masks.memo.remove(&key);
            }
        }

        let full = labels.mapv(|label| label == self.cluster);
        let mask = match view {
            Some(view) => view.apply(&full)?,
            None => full,
        };
        debug!(
            data = data.label(),
            cluster = self.cluster,
            selected = mask.iter().filter(|&&m| m).count(),
            "computed cluster mask"
        );

        let entry = Arc::new(MaskEntry {
            labels,
            mask: Arc::new(mask),
        });
        let mut masks = self.masks.lock();
        masks.sync(generation);
        let stored = masks.memo.put_if_absent(key.clone(), Arc::clone(&entry));
        if Arc::ptr_eq(&stored.labels, &entry.labels) {
            return Ok(Arc::clone(&stored.mask));
        }
        masks.memo.put(key, Arc::clone(&entry));
        Ok(Arc::clone(&entry.mask))
    }

    fn copy(&self) -> Box<dyn SubsetState> {
        Box::new(self.clone())
    }

    fn attributes(&self) -> Vec<String> {
        self.model.attributes()
    }
}

/// Boolean operator of a [`CompositeSubsetState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsetOp {
    And,
    Or,
    Xor,
    Not,
}

/// Boolean combination of subset states.
#[derive(Debug)]
pub struct CompositeSubsetState {
    op: SubsetOp,
    left: Box<dyn SubsetState>,
    right: Option<Box<dyn SubsetState>>,
}

impl CompositeSubsetState {
    pub fn and(left: Box<dyn SubsetState>, right: Box<dyn SubsetState>) -> Self {
        Self::binary(SubsetOp::And, left, right)
    }

    pub fn or(left: Box<dyn SubsetState>, right: Box<dyn SubsetState>) -> Self {
        Self::binary(SubsetOp::Or, left, right)
    }

    pub fn xor(left: Box<dyn SubsetState>, right: Box<dyn SubsetState>) -> Self {
        Self::binary(SubsetOp::Xor, left, right)
    }

    pub fn not(state: Box<dyn SubsetState>) -> Self {
        Self {
            op: SubsetOp::Not,
            left: state,
            right: None,
        }
    }

    fn binary(op: SubsetOp, left: Box<dyn SubsetState>, right: Box<dyn SubsetState>) -> Self {
        Self {
            op,
            left,
            right: Some(right),
        }
    }

    pub fn op(&self) -> SubsetOp {
        self.op
    }
}

impl SubsetState for CompositeSubsetState {
    fn to_mask(&self, data: &dyn Dataset, view: Option<&View>) -> Result<Arc<Mask>> {
        let left = self.left.to_mask(data, view)?;
        let Some(right) = &self.right else {
            return Ok(Arc::new(left.mapv(|m| !m)));
        };
        let right = right.to_mask(data, view)?;

        if left.shape() != right.shape() {
            return Err(Error::ShapeMismatch {
                expected: left.shape().to_vec(),
                found: right.shape().to_vec(),
            });
        }

        let op = self.op;
        let mask = Zip::from(&*left).and(&*right).map_collect(|&a, &b| match op {
            SubsetOp::And => a && b,
            SubsetOp::Or => a || b,
            SubsetOp::Xor => a ^ b,
            SubsetOp::Not => !a,
        });
        Ok(Arc::new(mask))
    }

    fn copy(&self) -> Box<dyn SubsetState> {
        Box::new(Self {
            op: self.op,
            left: self.left.copy(),
            right: self.right.as_ref().map(|r| r.copy()),
        })
    }

    fn attributes(&self) -> Vec<String> {
        let mut attributes = self.left.attributes();
        if let Some(right) = &self.right {
            for name in right.attributes() {
                if !attributes.contains(&name) {
                    attributes.push(name);
                }
            }
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::KMeans;
    use crate::dataset::Data;
    use crate::model::ModelConfig;
    use ndarray::{ArrayD, array};

    fn fitted() -> (Arc<Data>, Arc<ClusteringModel>) {
        let mut data = Data::new("points");
        data.add_component("x", array![0.0, 0.0, 10.0, 10.0].into_dyn()).unwrap();
        data.add_component("y", array![0.0, 1.0, 10.0, 11.0].into_dyn()).unwrap();
        let data = Arc::new(data);
        let model = ClusteringModel::new(
            KMeans::new(2).random_state(0),
            data.clone(),
            &["x", "y"],
            ModelConfig::default(),
        )
        .unwrap();
        (data, Arc::new(model))
    }

    #[test]
    fn test_mask_matches_labels() {
        let (data, model) = fitted();
        let state = ClusterSubsetState::new(model.clone(), 0).unwrap();

        let mask = state.to_mask(&*data, None).unwrap();
        let labels = model.predict(&*data).unwrap();
        for (m, l) in mask.iter().zip(labels.iter()) {
            assert_eq!(*m, *l == 0);
        }

        let expected = array![true, true, false, false].into_dyn();
        assert!(*mask == expected || mask.mapv(|m| !m) == expected);
    }

    #[test]
    fn test_mask_is_memoized() {
        let (data, model) = fitted();
        let state = ClusterSubsetState::new(model, 1).unwrap();

        let first = state.to_mask(&*data, None).unwrap();
        let second = state.to_mask(&*data, None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(state.cache_stats().hits, 1);
    }

    #[test]
    fn test_model_invalidation_drops_masks() {
        let (data, model) = fitted();
        let state = ClusterSubsetState::new(model.clone(), 1).unwrap();
        let first = state.to_mask(&*data, None).unwrap();

        model.invalidate(&*data);
        let second = state.to_mask(&*data, None).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
        assert_eq!(state.cache_stats().size, 1);

        model.clear_cache();
        let third = state.to_mask(&*data, None).unwrap();
        assert!(!Arc::ptr_eq(&second, &third));
    }

    #[test]
    fn test_state_invalidate_and_clear() {
        let (data, model) = fitted();
        let state = ClusterSubsetState::new(model, 0).unwrap();
        state.to_mask(&*data, None).unwrap();
        state.to_mask(&*data, Some(&View::Indices(vec![0]))).unwrap();
        assert_eq!(state.cache_stats().size, 2);

        state.invalidate(&*data);
        assert_eq!(state.cache_stats().size, 0);

        let first = state.to_mask(&*data, None).unwrap();
        state.clear_cache();
        let second = state.to_mask(&*data, None).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_out_of_range_cluster() {
        let (_, model) = fitted();
        let result = ClusterSubsetState::new(model, 2);
        assert!(matches!(
            result,
            Err(Error::ClusterIndexOutOfRange { index: 2, n_clusters: 2 })
        ));
    }

    #[test]
    fn test_copy_shares_model() {
        let (data, model) = fitted();
        let state = ClusterSubsetState::new(model.clone(), 0).unwrap();
        let copy = state.copy();

        assert_eq!(copy.attributes(), vec!["x", "y"]);
        assert_eq!(
            copy.to_mask(&*data, None).unwrap(),
            state.to_mask(&*data, None).unwrap()
        );
        // Held by the state, its copy and this test.
        assert_eq!(Arc::strong_count(&model), 3);
    }

    #[test]
    fn test_view_slice() {
        let mask: ArrayD<bool> = array![[true, false, true], [false, true, false]].into_dyn();

        let view = View::Slice(vec![AxisSlice::new(1, 2), AxisSlice::all().step_by(2)]);
        let restricted = view.apply(&mask).unwrap();
        assert_eq!(restricted, array![[false, false]].into_dyn());
    }

    #[test]
    fn test_view_indices() {
        let mask: ArrayD<bool> = array![[true, false], [false, true]].into_dyn();

        let view = View::Indices(vec![3, 0, 1]);
        assert_eq!(view.apply(&mask).unwrap(), array![true, true, false].into_dyn());

        // Flat positions, not rows: index 1 is the second element of row 0.
        let view = View::Indices(vec![1]);
        assert_eq!(view.apply(&mask).unwrap(), array![false].into_dyn());
    }

    #[test]
    fn test_invalid_views() {
        let mask: ArrayD<bool> = array![true, false].into_dyn();

        assert!(matches!(
            View::Indices(vec![2]).apply(&mask),
            Err(Error::InvalidView(_))
        ));
        assert!(matches!(
            View::Slice(vec![AxisSlice::new(0, 3)]).apply(&mask),
            Err(Error::InvalidView(_))
        ));
        assert!(matches!(
            View::Slice(vec![AxisSlice::all(), AxisSlice::all()]).apply(&mask),
            Err(Error::InvalidView(_))
        ));
        assert!(matches!(
            View::Slice(vec![AxisSlice::all().step_by(0)]).apply(&mask),
            Err(Error::InvalidView(_))
        ));
    }

    #[test]
    fn test_composite_states() {
        let (data, model) = fitted();
        let state = |k| -> Box<dyn SubsetState> {
            Box::new(ClusterSubsetState::new(model.clone(), k).unwrap())
        };
        let zero = || state(0);
        let one = || state(1);

        let either = CompositeSubsetState::or(zero(), one());
        assert!(either.to_mask(&*data, None).unwrap().iter().all(|&m| m));

        let both = CompositeSubsetState::and(zero(), one());
        assert!(both.to_mask(&*data, None).unwrap().iter().all(|&m| !m));

        let not_zero = CompositeSubsetState::not(zero());
        assert_eq!(
            *not_zero.to_mask(&*data, None).unwrap(),
            *one().to_mask(&*data, None).unwrap()
        );

        let xor = CompositeSubsetState::xor(zero(), one());
        assert_eq!(xor.copy().attributes(), vec!["x", "y"]);
    }
}
