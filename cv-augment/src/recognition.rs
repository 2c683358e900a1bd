use crate::errors::Result;
use crate::{
    AugmentRenderer, Correspondence, Database, Entry, Feature, Image, Matcher, Registration,
};
use image::{imageops, DynamicImage, RgbaImage};
use log::*;

/// The outcome of recognizing a query image against a database.
#[derive(Debug, Clone)]
pub struct Recognition<'a> {
    pub entry: &'a Entry,
    /// The features extracted from the query, indexed by [`Correspondence::query`].
    pub features: Vec<Feature>,
    pub correspondences: Vec<Correspondence>,
    pub registration: Registration,
    /// The entry augments warped into the query frame, transparent elsewhere.
    pub overlay: RgbaImage,
}

impl<'a> Recognition<'a> {
    /// Draws the overlay on top of `query`.
    pub fn composite(&self, query: &Image) -> RgbaImage {
        let mut base = DynamicImage::ImageRgb8(query.rgb().clone()).into_rgba8();
        imageops::overlay(&mut base, &self.overlay, 0, 0);
        base
    }
}

impl Matcher {
    /// Runs the full pipeline on `query`: equalize, extract, find the first matching
    /// entry, register it and warp its augments into the query frame.
    ///
    /// `Ok(None)` means no entry matched. Registration failures are errors.
    pub fn recognize<'a>(
        &self,
        database: &'a Database,
        query: &Image,
        renderer: &AugmentRenderer,
    ) -> Result<Option<Recognition<'a>>> {
        let features = self.features(query);
        let found = match self.find_entry(database, &features) {
            Some(found) => found,
            None => return Ok(None),
        };
        let registration = self.register(found.entry, &features, &found.correspondences)?;
        let overlay = renderer.project(found.entry, &registration.homography, query.dimensions())?;
        debug!(
            "Projected {} augments of {:?}",
            found.entry.augments().len(),
            found.entry.name()
        );
        Ok(Some(Recognition {
            entry: found.entry,
            features,
            correspondences: found.correspondences,
            registration,
            overlay,
        }))
    }
}
