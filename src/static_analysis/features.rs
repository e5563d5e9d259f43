//! Feature vector construction.
//!
//! The classifier was trained over a fixed column layout. The position of every label in
//! [`FEATURE_SCHEMA`] is part of the model contract: reordering it silently changes every
//! prediction, so it must only change together with [`SCHEMA_VERSION`] and a retrained model.

use lazy_static::lazy_static;
use std::collections::BTreeSet;

/// Number of slots of the feature vector.
pub const FEATURE_COUNT: usize = 470;
/// Version of the feature schema the persisted models must have been trained with.
pub const SCHEMA_VERSION: u32 = 1;

lazy_static! {
    /// Column labels of the training data set, in training order.
    pub static ref FEATURE_SCHEMA: Vec<String> =
        (0..FEATURE_COUNT).map(|i| format!("f{}", i)).collect();
}

/// Binary indicator vector over [`FEATURE_SCHEMA`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    /// Gets the number of slots. Always [`FEATURE_COUNT`].
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false, as the vector has a fixed size.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets the slot values.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Gets the number of slots set to 1.
    pub fn count_ones(&self) -> usize {
        self.0.iter().filter(|&&v| v == 1).count()
    }
}

/// Maps a permission set onto the feature vector.
pub fn vectorize(permissions: &BTreeSet<String>) -> FeatureVector {
    FeatureVector(
        FEATURE_SCHEMA
            .iter()
            .map(|label| u8::from(permissions.contains(label)))
            .collect(),
    )
}
