use crate::errors::{Error, Result};
use crate::{Augment, Descriptor, Feature, Image, KeyPointRecord};
use serde::{Deserialize, Serialize};

/// The fewest features an entry may be committed with.
pub const MIN_ENTRY_FEATURES: usize = 10;

/// One database record: a reference image, its features and the augments drawn on it.
///
/// Entries are never changed after they are committed to a database. Replacing
/// one means building a new entry and upserting it under the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    name: String,
    group: Option<String>,
    image: Image,
    features: Vec<Feature>,
    augments: Vec<Augment>,
}

impl Entry {
    /// Fails with [`Error::InsufficientFeatures`] unless at least
    /// [`MIN_ENTRY_FEATURES`] features are given.
    pub fn new(name: impl Into<String>, image: Image, features: Vec<Feature>) -> Result<Self> {
        if features.len() < MIN_ENTRY_FEATURES {
            return Err(Error::InsufficientFeatures {
                found: features.len(),
                required: MIN_ENTRY_FEATURES,
            });
        }
        Ok(Self {
            name: name.into(),
            group: None,
            image,
            features,
            augments: Vec::new(),
        })
    }

    pub fn with_group(self, group: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            ..self
        }
    }

    /// Attaches augments after checking each one with [`Augment::validate`].
    pub fn with_augments(mut self, augments: impl IntoIterator<Item = Augment>) -> Result<Self> {
        for augment in augments {
            augment.validate()?;
            self.augments.push(augment);
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn augments(&self) -> &[Augment] {
        &self.augments
    }

    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.features.iter().map(|f| *f.descriptor()).collect()
    }

    pub fn key_points(&self) -> Vec<KeyPointRecord> {
        self.features.iter().map(|f| *f.key_point()).collect()
    }
}
