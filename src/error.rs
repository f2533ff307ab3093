use thiserror::Error;

/// Errors returned by the clustering adapter and the bundled estimator.
#[derive(Debug, Error)]
pub enum Error {
    /// An attribute name or reference cannot be resolved against a dataset.
    #[error("attribute '{attribute}' cannot be resolved in data '{data}'")]
    AttributeResolution {
        /// Attribute name.
        attribute: String,
        /// Label of the dataset that was asked.
        data: String,
    },

    /// An attribute with this name already exists in the dataset.
    #[error("attribute '{attribute}' already exists in data '{data}'")]
    DuplicateAttribute {
        /// Attribute name.
        attribute: String,
        /// Dataset label.
        data: String,
    },

    /// Array shape does not match the dataset shape.
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Found shape.
        found: Vec<usize>,
    },

    /// Input is empty.
    #[error("empty input")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: String,
    },

    /// Requested cluster count is incompatible with the dataset.
    #[error("invalid cluster count: requested {requested}, but dataset has {n_items} items")]
    InvalidClusterCount {
        /// Requested number of clusters.
        requested: usize,
        /// Number of items in the dataset.
        n_items: usize,
    },

    /// Feature count differs from the one the estimator was fit with.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected number of features.
        expected: usize,
        /// Found number of features.
        found: usize,
    },

    /// The estimator was asked to predict before being fit.
    #[error("estimator is not fitted, call fit() first")]
    NotFitted,

    /// The estimator returned a label sequence of the wrong length.
    #[error("estimator returned {found} labels for {expected} elements")]
    LabelCountMismatch {
        /// Number of dataset elements.
        expected: usize,
        /// Number of labels returned.
        found: usize,
    },

    /// A label too large to derive a cluster count from.
    #[error("estimator returned label {label}, which leaves no room for a cluster count")]
    InvalidLabel {
        /// Offending label.
        label: usize,
    },

    /// A cluster index is not below the model's cluster count.
    #[error("cluster index {index} out of range for a model with {n_clusters} clusters")]
    ClusterIndexOutOfRange {
        /// Requested cluster index.
        index: usize,
        /// Number of clusters found at fit time.
        n_clusters: usize,
    },

    /// A view does not index into the mask it is applied to.
    #[error("invalid view: {0}")]
    InvalidView(String),

    /// No dataset with this label in the collection.
    #[error("no data labelled '{0}' in the collection")]
    DataNotFound(String),

    /// Failure raised by a third-party estimator.
    #[error("estimator error: {0}")]
    Estimator(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary estimator failure.
    pub fn estimator<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Estimator(err.into())
    }

    pub(crate) fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
