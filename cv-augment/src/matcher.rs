use crate::errors::{Error, Result};
use crate::{clahe, Database, Descriptor, Entry, Feature, Image, MatcherSettings};
use akaze::Akaze;
use arrsac::Arrsac;
use bitarray::Hamming;
use cv_core::sample_consensus::{Consensus, Estimator, Model};
use cv_core::{FeatureMatch, KeyPoint};
use float_ord::FloatOrd;
use four_point::{FourPoint, Homography};
use log::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use space::{Knn, LinearKnn};
use std::cmp::Reverse;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

type Match = FeatureMatch<KeyPoint>;

/// Images narrower or shorter than this have no room for a descriptor patch.
const MIN_EXTRACT_DIMENSION: u32 = 16;

/// A query descriptor paired with its nearest reference descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correspondence {
    /// Index into the query features.
    pub query: usize,
    /// Index into the reference (entry) features.
    pub reference: usize,
    /// Hamming distance between the two descriptors.
    pub distance: u32,
}

/// The entry a query was recognized as, with the correspondences that got it accepted.
#[derive(Debug, Clone)]
pub struct EntryMatch<'a> {
    pub entry: &'a Entry,
    pub correspondences: Vec<Correspondence>,
}

/// A homography from entry coordinates to query coordinates.
#[derive(Debug, Clone)]
pub struct Registration {
    pub homography: Homography,
    /// One flag per correspondence, `true` for consensus inliers.
    pub inliers: Vec<bool>,
}

impl Registration {
    pub fn inlier_count(&self) -> usize {
        count(&self.inliers)
    }
}

/// Extracts, matches and registers features with one fixed configuration.
///
/// The matcher holds no state besides its configuration, so one instance can be
/// shared by every caller.
#[derive(Debug, Clone)]
pub struct Matcher {
    akaze: Akaze,
    settings: MatcherSettings,
}

impl Matcher {
    pub fn new(settings: MatcherSettings) -> Self {
        Self {
            akaze: Akaze::new(settings.akaze_threshold),
            settings,
        }
    }

    pub fn settings(&self) -> &MatcherSettings {
        &self.settings
    }

    /// Adaptive histogram equalization of the grayscale view.
    ///
    /// This evens out illumination differences between reference and query images and
    /// runs before every extraction on the recognition path.
    pub fn histogram_equalization(&self, image: &Image) -> Image {
        let equalized = clahe::equalize(
            image.grayscale(),
            self.settings.clahe_clip_limit,
            self.settings.clahe_tile_grid,
        );
        Image::from(equalized)
    }

    /// Detects keypoints and computes their descriptors.
    ///
    /// At most `max_features` features are returned. When the detector finds more, the
    /// strongest responses are kept in their extraction order. A featureless image
    /// yields an empty vector.
    pub fn extract_features(&self, image: &Image) -> Vec<Feature> {
        let (width, height) = image.dimensions();
        if width < MIN_EXTRACT_DIMENSION || height < MIN_EXTRACT_DIMENSION {
            debug!("Image of {} x {} is too small to extract from", width, height);
            return Vec::new();
        }
        let gray = image.grayscale();
        let first = gray.as_raw().first().copied();
        if gray.as_raw().iter().all(|&value| Some(value) == first) {
            // The detector contrast factor is zero on a flat image.
            debug!("Image is uniform, skipping extraction");
            return Vec::new();
        }
        let (key_points, descriptors) = self.akaze.extract(image.src());
        let mut features: Vec<Feature> = key_points
            .into_iter()
            .zip(descriptors)
            .map(|(key_point, descriptor)| Feature::new(key_point.into(), descriptor))
            .collect();
        let found = features.len();
        if found > self.settings.max_features {
            let mut strongest: Vec<usize> = (0..found).collect();
            // Stable, so equal responses keep extraction order.
            strongest.sort_by_key(|&ix| Reverse(FloatOrd(features[ix].key_point().response)));
            let mut keep = vec![false; found];
            for ix in strongest.into_iter().take(self.settings.max_features) {
                keep[ix] = true;
            }
            let mut keep = keep.into_iter();
            features.retain(|_| keep.next().unwrap_or(false));
            debug!("Kept {} of {} features", features.len(), found);
        }
        info!("Found {} features", features.len());
        features
    }

    /// Equalizes and then extracts, the path both entries and queries go through.
    pub fn features(&self, image: &Image) -> Vec<Feature> {
        self.extract_features(&self.histogram_equalization(image))
    }

    /// Matches every query descriptor to its nearest reference descriptor.
    ///
    /// A match is kept only if it passes Lowe's ratio test, that is its distance is
    /// strictly below `lowes_ratio` times the distance of the second best candidate.
    /// Query descriptors with fewer than two candidates are skipped.
    pub fn match_descriptors(
        &self,
        query: &[Descriptor],
        reference: &[Descriptor],
    ) -> Vec<Correspondence> {
        let knn = LinearKnn {
            metric: Hamming,
            iter: reference.iter(),
        };
        query
            .iter()
            .enumerate()
            .filter_map(|(query_ix, descriptor)| {
                let neighbors = knn.knn(descriptor, 2);
                if neighbors.len() < 2 {
                    return None;
                }
                let (best, second) = (&neighbors[0], &neighbors[1]);
                ((best.distance as f32) < self.settings.lowes_ratio * second.distance as f32)
                    .then(|| Correspondence {
                        query: query_ix,
                        reference: best.index,
                        distance: best.distance,
                    })
            })
            .collect()
    }

    /// Scans the database in insertion order for the first entry with at least
    /// `min_match_count` correspondences to the query.
    ///
    /// The first passing entry wins even if a later one would match better.
    /// `None` means no entry matched, which is an ordinary outcome.
    pub fn find_entry<'a>(
        &self,
        database: &'a Database,
        query: &[Feature],
    ) -> Option<EntryMatch<'a>> {
        let query_descriptors: Vec<Descriptor> = query.iter().map(|f| *f.descriptor()).collect();
        let threshold = self.settings.min_match_count;
        let passes = |entry: &'a Entry| {
            debug!("Trying to match against {:?}", entry.name());
            let correspondences = self.match_descriptors(&query_descriptors, &entry.descriptors());
            debug!("Found {}/{} matches", correspondences.len(), threshold);
            (correspondences.len() >= threshold).then(|| EntryMatch {
                entry,
                correspondences,
            })
        };

        #[cfg(not(feature = "rayon"))]
        let found = database.entries().iter().find_map(passes);
        #[cfg(feature = "rayon")]
        let found = database.entries().par_iter().find_map_first(passes);

        match &found {
            Some(found) => info!("Found a match in the database! ({})", found.entry.name()),
            None => info!("Couldn't find a matching entry in the database"),
        }
        found
    }

    /// Estimates the homography from `entry` to the query image from accepted correspondences.
    pub fn register(
        &self,
        entry: &Entry,
        query: &[Feature],
        correspondences: &[Correspondence],
    ) -> Result<Registration> {
        let matches: Vec<Match> = correspondences
            .iter()
            .map(|c| {
                FeatureMatch(
                    KeyPoint::from(*entry.features()[c.reference].key_point()),
                    KeyPoint::from(*query[c.query].key_point()),
                )
            })
            .collect();
        self.estimate_homography(&matches)
    }

    /// Robustly fits a homography to `(reference, query)` point matches.
    ///
    /// ARRSAC finds the consensus model, which is then refit over all of its inliers.
    /// Fails with [`Error::HomographyEstimationFailed`] if there are fewer than four
    /// matches, the points are degenerate, or fewer than four inliers survive.
    pub fn estimate_homography(&self, matches: &[Match]) -> Result<Registration> {
        let failed = || Error::HomographyEstimationFailed {
            correspondences: matches.len(),
        };
        let minimum = <FourPoint as Estimator<Match>>::MIN_SAMPLES;
        if matches.len() < minimum {
            return Err(failed());
        }

        let estimator = FourPoint::new();
        let mut consensus = Arrsac::new(
            self.settings.consensus_threshold,
            Xoshiro256PlusPlus::seed_from_u64(self.settings.consensus_seed),
        );
        let (model, inliers) = consensus
            .model_inliers(&estimator, matches.iter().copied())
            .ok_or_else(failed)?;
        let inliers: Vec<usize> = inliers.into_iter().collect();
        debug!("Consensus kept {} of {} matches", inliers.len(), matches.len());
        if inliers.len() < minimum {
            return Err(failed());
        }

        // The refit only replaces the consensus model if it keeps at least as many inliers.
        let homography = estimator
            .from_matches(inliers.iter().map(|&ix| matches[ix]))
            .filter(|refit| count(&self.inlier_mask(refit, matches)) >= inliers.len())
            .unwrap_or(model);
        let mask = self.inlier_mask(&homography, matches);
        info!(
            "Registered with {} inliers out of {} matches",
            count(&mask),
            matches.len()
        );
        Ok(Registration {
            homography,
            inliers: mask,
        })
    }

    fn inlier_mask(&self, homography: &Homography, matches: &[Match]) -> Vec<bool> {
        matches
            .iter()
            .map(|m| homography.residual(m) < self.settings.consensus_threshold)
            .collect()
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MatcherSettings::default())
    }
}

fn count(mask: &[bool]) -> usize {
    mask.iter().filter(|&&inlier| inlier).count()
}
