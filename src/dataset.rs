//! Host-side datasets.
//!
//! A dataset is a labelled collection of attributes. Every attribute is an
//! n-dimensional `f64` array and all attributes of one dataset share a shape.
//! Attributes are addressed through [`AttributeRef`] handles, resolved once
//! from their names and reused afterwards.
//!
//! ```rust
//! use cluster_subsets::{Data, Dataset};
//! use ndarray::array;
//!
//! let mut data = Data::new("points");
//! let x = data.add_component("x", array![0.0, 0.0, 10.0, 10.0].into_dyn()).unwrap();
//!
//! assert_eq!(data.shape(), &[4]);
//! assert_eq!(data.resolve("x").unwrap(), x);
//! ```

use crate::error::{Error, Result};
use ndarray::{ArrayD, CowArray, IxDyn};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DATA_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_ATTRIBUTE_ID: AtomicU64 = AtomicU64::new(1);

/// Fingerprint of a dataset's content, used as memoization key.
///
/// `id` is unique per dataset instance and `version` grows on every in-place
/// mutation, so a key never refers to two different contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetKey {
    pub id: u64,
    pub version: u64,
}

impl DatasetKey {
    /// Key of a new dataset: a process-unique id at version 0.
    pub fn fresh() -> Self {
        Self {
            id: Self::next_id(),
            version: 0,
        }
    }

    /// Allocate a process-unique dataset id.
    ///
    /// Shared with [`Data`], so ids from here never collide with in-crate
    /// datasets.
    pub fn next_id() -> u64 {
        NEXT_DATA_ID.fetch_add(1, Ordering::Relaxed)
    }

    /// The same dataset after one more in-place mutation.
    pub fn bumped(self) -> Self {
        Self {
            id: self.id,
            version: self.version + 1,
        }
    }
}

/// Stable handle to one attribute column.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeRef {
    id: u64,
    name: String,
}

impl AttributeRef {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// What the clustering adapter needs from a host dataset.
pub trait Dataset: Send + Sync + std::fmt::Debug {
    /// Human-readable label.
    fn label(&self) -> &str;

    /// Element layout shared by all attributes.
    fn shape(&self) -> &[usize];

    /// Content fingerprint.
    ///
    /// Host implementations must take their id from [`DatasetKey::fresh`] or
    /// [`DatasetKey::next_id`] and bump the version on every in-place
    /// mutation. Two datasets sharing a key share cached predictions.
    fn key(&self) -> DatasetKey;

    /// Resolve an attribute name to a reference.
    fn resolve(&self, name: &str) -> Result<AttributeRef>;

    /// Fetch the values behind a reference, shaped like [`Dataset::shape`].
    fn values(&self, attribute: &AttributeRef) -> Result<CowArray<'_, f64, IxDyn>>;

    /// Number of elements.
    fn len(&self) -> usize {
        self.shape().iter().product()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct Component {
    attribute: AttributeRef,
    values: ArrayD<f64>,
}

/// In-memory dataset.
#[derive(Debug)]
pub struct Data {
    label: String,
    shape: Option<Vec<usize>>,
    components: Vec<Component>,
    id: u64,
    version: u64,
}

impl Data {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            shape: None,
            components: Vec::new(),
            id: DatasetKey::next_id(),
            version: 0,
        }
    }

    /// Add a new attribute and return its reference.
    ///
    /// The first attribute fixes the dataset shape; later ones must match it.
    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        values: ArrayD<f64>,
    ) -> Result<AttributeRef> {
        let name = name.into();
        if self.components.iter().any(|c| c.attribute.name == name) {
            return Err(Error::DuplicateAttribute {
                attribute: name,
                data: self.label.clone(),
            });
        }

        let attribute = AttributeRef {
            id: NEXT_ATTRIBUTE_ID.fetch_add(1, Ordering::Relaxed),
            name,
        };
        self.insert(attribute.clone(), values)?;
        Ok(attribute)
    }

    /// Add values for an attribute that already lives in another dataset.
    ///
    /// References resolved against the other dataset then also resolve here,
    /// which is what lets a model fit on one dataset predict on another.
    pub fn add_linked_component(
        &mut self,
        attribute: &AttributeRef,
        values: ArrayD<f64>,
    ) -> Result<()> {
        if self
            .components
            .iter()
            .any(|c| c.attribute.id == attribute.id || c.attribute.name == attribute.name)
        {
            return Err(Error::DuplicateAttribute {
                attribute: attribute.name.clone(),
                data: self.label.clone(),
            });
        }
        self.insert(attribute.clone(), values)
    }

    /// Replace the values of an attribute in place.
    pub fn update_values(&mut self, attribute: &AttributeRef, values: ArrayD<f64>) -> Result<()> {
        self.check_shape(&values)?;
        let label = &self.label;
        let component = self
            .components
            .iter_mut()
            .find(|c| c.attribute.id == attribute.id)
            .ok_or_else(|| Error::AttributeResolution {
                attribute: attribute.name.clone(),
                data: label.clone(),
            })?;
        component.values = values;
        self.version += 1;
        Ok(())
    }

    /// Names of all attributes, in insertion order.
    pub fn attribute_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.attribute.name.as_str()).collect()
    }

    fn insert(&mut self, attribute: AttributeRef, values: ArrayD<f64>) -> Result<()> {
        self.check_shape(&values)?;
        if self.shape.is_none() {
            self.shape = Some(values.shape().to_vec());
        }
        self.components.push(Component { attribute, values });
        self.version += 1;
        Ok(())
    }

    fn check_shape(&self, values: &ArrayD<f64>) -> Result<()> {
        match &self.shape {
            Some(shape) if shape.as_slice() != values.shape() => Err(Error::ShapeMismatch {
                expected: shape.clone(),
                found: values.shape().to_vec(),
            }),
            _ => Ok(()),
        }
    }
}

impl Clone for Data {
    // A clone is a separate dataset: it gets its own id so that mutating one
    // copy never aliases cache entries of the other.
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            shape: self.shape.clone(),
            components: self
                .components
                .iter()
                .map(|c| Component {
                    attribute: c.attribute.clone(),
                    values: c.values.clone(),
                })
                .collect(),
            id: DatasetKey::next_id(),
            version: 0,
        }
    }
}

impl Dataset for Data {
    fn label(&self) -> &str {
        &self.label
    }

    fn shape(&self) -> &[usize] {
        self.shape.as_deref().unwrap_or(&[])
    }

    fn key(&self) -> DatasetKey {
        DatasetKey {
            id: self.id,
            version: self.version,
        }
    }

    fn resolve(&self, name: &str) -> Result<AttributeRef> {
        self.components
            .iter()
            .find(|c| c.attribute.name == name)
            .map(|c| c.attribute.clone())
            .ok_or_else(|| Error::AttributeResolution {
                attribute: name.to_string(),
                data: self.label.clone(),
            })
    }

    fn values(&self, attribute: &AttributeRef) -> Result<CowArray<'_, f64, IxDyn>> {
        self.components
            .iter()
            .find(|c| c.attribute.id == attribute.id)
            .map(|c| CowArray::from(c.values.view()))
            .ok_or_else(|| Error::AttributeResolution {
                attribute: attribute.name.clone(),
                data: self.label.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_data_creation() {
        let mut data = Data::new("grid");
        data.add_component("a", array![[1.0, 2.0], [3.0, 4.0]].into_dyn()).unwrap();
        data.add_component("b", array![[5.0, 6.0], [7.0, 8.0]].into_dyn()).unwrap();

        assert_eq!(data.shape(), &[2, 2]);
        assert_eq!(data.len(), 4);
        assert_eq!(data.attribute_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut data = Data::new("grid");
        data.add_component("a", array![1.0, 2.0, 3.0].into_dyn()).unwrap();

        let result = data.add_component("b", array![1.0, 2.0].into_dyn());
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_duplicate_attribute() {
        let mut data = Data::new("points");
        data.add_component("x", array![1.0].into_dyn()).unwrap();

        let result = data.add_component("x", array![2.0].into_dyn());
        assert!(matches!(result, Err(Error::DuplicateAttribute { .. })));
    }

    #[test]
    fn test_unknown_reference() {
        let mut first = Data::new("first");
        let x = first.add_component("x", array![1.0, 2.0].into_dyn()).unwrap();

        let mut second = Data::new("second");
        second.add_component("x", array![1.0, 2.0].into_dyn()).unwrap();

        // Same name, different attribute.
        assert!(matches!(
            second.values(&x),
            Err(Error::AttributeResolution { .. })
        ));
        assert!(matches!(
            first.resolve("y"),
            Err(Error::AttributeResolution { .. })
        ));
    }

    #[test]
    fn test_linked_component_resolves() {
        let mut first = Data::new("first");
        let x = first.add_component("x", array![1.0, 2.0].into_dyn()).unwrap();

        let mut second = Data::new("second");
        second.add_linked_component(&x, array![3.0, 4.0, 5.0].into_dyn()).unwrap();

        let values = second.values(&x).unwrap();
        assert_eq!(values.shape(), &[3]);
        assert_eq!(values[[2]], 5.0);
    }

    #[test]
    fn test_update_bumps_version() {
        let mut data = Data::new("points");
        let x = data.add_component("x", array![1.0, 2.0].into_dyn()).unwrap();
        let before = data.key();

        data.update_values(&x, array![3.0, 4.0].into_dyn()).unwrap();
        let after = data.key();

        assert_eq!(before.id, after.id);
        assert!(after.version > before.version);
    }

    #[test]
    fn test_fresh_keys_do_not_collide_with_data() {
        let data = Data::new("points");
        let host = DatasetKey::fresh();

        assert_ne!(host.id, data.key().id);
        assert_eq!(host.version, 0);
        assert_eq!(host.bumped().id, host.id);
        assert_eq!(host.bumped().version, 1);
    }

    #[test]
    fn test_clone_gets_new_id() {
        let mut data = Data::new("points");
        data.add_component("x", array![1.0, 2.0].into_dyn()).unwrap();

        let copy = data.clone();
        assert_ne!(copy.key().id, data.key().id);
        assert_eq!(copy.shape(), data.shape());
    }
}
