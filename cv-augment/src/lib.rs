//! Recognize photographs of known images and draw their stored annotations onto them.
//!
//! A [`Database`] holds [`Entry`] records, each a reference image with its akaze
//! features and a list of [`Augment`]s. A [`Matcher`] equalizes a query image,
//! extracts its features, scans the database for the first entry with enough
//! ratio-tested matches, fits a homography with ARRSAC and hands it to an
//! [`AugmentRenderer`], which warps the entry's augments into the query frame.
//!
//! ```no_run
//! use cv_augment::{AugmentRenderer, Database, Image, Matcher};
//!
//! let database = Database::connect("augments.db").unwrap();
//! let query = Image::from_file("photo.jpg").unwrap();
//! let matcher = Matcher::default();
//! if let Some(recognition) = matcher
//!     .recognize(&database, &query, &AugmentRenderer::default())
//!     .unwrap()
//! {
//!     recognition.composite(&query).save("augmented.png").unwrap();
//! }
//! ```

mod augment;
mod clahe;
mod database;
mod entry;
mod errors;
mod feature;
pub mod filters;
mod image;
mod matcher;
mod recognition;
mod render;
mod settings;

pub use crate::image::Image;
pub use augment::Augment;
pub use clahe::equalize;
pub use database::Database;
pub use entry::{Entry, MIN_ENTRY_FEATURES};
pub use errors::{Error, Result};
pub use feature::{select_features, Descriptor, Feature, KeyPointRecord, Region};
pub use four_point::{FourPoint, Homography};
pub use matcher::{Correspondence, EntryMatch, Matcher, Registration};
pub use recognition::Recognition;
pub use render::AugmentRenderer;
pub use settings::MatcherSettings;
