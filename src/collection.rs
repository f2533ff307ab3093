//! Host container of datasets and named subset groups.

use crate::Mask;
use crate::dataset::{Data, Dataset};
use crate::error::{Error, Result};
use crate::subset::{SubsetState, View};
use std::sync::Arc;
use tracing::{debug, info};

/// A named subset state, applied to every dataset of the collection.
#[derive(Debug)]
pub struct SubsetGroup {
    label: String,
    state: Box<dyn SubsetState>,
}

impl SubsetGroup {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> &dyn SubsetState {
        &*self.state
    }

    pub fn to_mask(&self, data: &dyn Dataset, view: Option<&View>) -> Result<Arc<Mask>> {
        self.state.to_mask(data, view)
    }
}

#[derive(Debug, Default)]
pub struct DataCollection {
    data: Vec<Arc<Data>>,
    subset_groups: Vec<SubsetGroup>,
}

impl DataCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset and return the shared handle the collection keeps.
    pub fn append(&mut self, data: Data) -> Arc<Data> {
        let data = Arc::new(data);
        debug!(data = data.label(), shape = ?data.shape(), "appended data");
        self.data.push(Arc::clone(&data));
        data
    }

    /// First dataset labelled `label`.
    pub fn get(&self, label: &str) -> Result<Arc<Data>> {
        self.data
            .iter()
            .find(|d| d.label() == label)
            .cloned()
            .ok_or_else(|| Error::DataNotFound(label.to_string()))
    }

    pub fn labels(&self) -> Vec<&str> {
        self.data.iter().map(|d| d.label()).collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn new_subset_group(
        &mut self,
        label: impl Into<String>,
        state: Box<dyn SubsetState>,
    ) -> &SubsetGroup {
        let label = label.into();
        info!(subset = %label, attributes = ?state.attributes(), "new subset group");
        self.subset_groups.push(SubsetGroup { label, state });
        &self.subset_groups[self.subset_groups.len() - 1]
    }

    pub fn subset_groups(&self) -> &[SubsetGroup] {
        &self.subset_groups
    }

    pub fn subset_group(&self, label: &str) -> Option<&SubsetGroup> {
        self.subset_groups.iter().find(|g| g.label == label)
    }

    /// Remove the first subset group labelled `label`.
    pub fn remove_subset_group(&mut self, label: &str) -> Option<SubsetGroup> {
        let index = self.subset_groups.iter().position(|g| g.label == label)?;
        Some(self.subset_groups.remove(index))
    }
}
