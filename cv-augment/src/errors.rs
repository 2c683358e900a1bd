use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to decode image {}: {source}", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid image data: {0}")]
    InvalidImageData(String),
    #[error("an entry needs at least {required} features, but only {found} were selected")]
    InsufficientFeatures { found: usize, required: usize },
    #[error("no usable homography could be estimated from {correspondences} correspondences")]
    HomographyEstimationFailed { correspondences: usize },
    #[error("homography cannot be used for warping: {0}")]
    DegenerateHomography(String),
    #[error("an entry named {0:?} already exists in the database")]
    DuplicateEntryName(String),
    #[error("invalid augment: {0}")]
    InvalidAugment(String),
    #[error("failed to load a font from {}", .0.display())]
    Font(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("database snapshot could not be encoded or decoded: {0}")]
    Snapshot(#[from] bincode::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
