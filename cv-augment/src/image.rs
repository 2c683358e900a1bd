use crate::errors::{Error, Result};
use ::image::{DynamicImage, GrayImage, ImageBuffer, ImageOutputFormat, RgbImage};
use log::*;
use ndarray::ArrayViewD;
use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;

/// An immutable image with lazily derived grayscale and RGB views.
///
/// The source pixels never change after construction, so each view is computed at
/// most once and then served from its cache.
#[derive(Clone)]
pub struct Image {
    src: DynamicImage,
    grayscale: OnceLock<GrayImage>,
    rgb: OnceLock<RgbImage>,
}

impl Image {
    pub fn from_dynamic(src: DynamicImage) -> Self {
        Self {
            src,
            grayscale: OnceLock::new(),
            rgb: OnceLock::new(),
        }
    }

    /// Create an image from a raw pixel array.
    ///
    /// The array is indexed `[row, column]` for single channel data or
    /// `[row, column, channel]` with 1 (gray), 3 (RGB) or 4 (RGBA) channels.
    pub fn from_buffer(pixels: ArrayViewD<'_, u8>) -> Result<Self> {
        let (height, width, channels) = match pixels.shape() {
            &[height, width] => (height, width, 1),
            &[height, width, channels] => (height, width, channels),
            shape => {
                return Err(Error::InvalidImageData(format!(
                    "expected a 2 or 3 dimensional pixel array, found {} dimensions",
                    shape.len()
                )))
            }
        };
        if width == 0 || height == 0 {
            return Err(Error::InvalidImageData(format!(
                "image dimensions must be non-zero, found {}x{}",
                width, height
            )));
        }
        let width = u32::try_from(width)
            .map_err(|_| Error::InvalidImageData(format!("width {} is too large", width)))?;
        let height = u32::try_from(height)
            .map_err(|_| Error::InvalidImageData(format!("height {} is too large", height)))?;

        // Iteration follows the logical row-major order whatever the memory layout.
        let data: Vec<u8> = pixels.iter().copied().collect();
        let src = match channels {
            1 => ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageLuma8),
            3 => ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageRgb8),
            4 => ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageRgba8),
            channels => {
                return Err(Error::InvalidImageData(format!(
                    "unsupported channel count {}",
                    channels
                )))
            }
        }
        .ok_or_else(|| {
            Error::InvalidImageData("pixel buffer does not match its shape".to_owned())
        })?;
        Ok(Self::from_dynamic(src))
    }

    /// Load and decode an image file (any format the `image` crate was built with).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Trying to load image: {}", path.display());
        let src = ::image::open(path).map_err(|source| Error::ImageDecode {
            path: path.to_owned(),
            source,
        })?;
        info!(
            "Loaded a {} x {} image from {}",
            src.width(),
            src.height(),
            path.display()
        );
        Ok(Self::from_dynamic(src))
    }

    pub fn src(&self) -> &DynamicImage {
        &self.src
    }

    pub fn width(&self) -> u32 {
        self.src.width()
    }

    pub fn height(&self) -> u32 {
        self.src.height()
    }

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn channels(&self) -> u8 {
        self.src.color().channel_count()
    }

    pub fn grayscale(&self) -> &GrayImage {
        self.grayscale.get_or_init(|| self.src.to_luma8())
    }

    pub fn rgb(&self) -> &RgbImage {
        self.rgb.get_or_init(|| self.src.to_rgb8())
    }
}

impl From<DynamicImage> for Image {
    fn from(src: DynamicImage) -> Self {
        Self::from_dynamic(src)
    }
}

impl From<GrayImage> for Image {
    fn from(gray: GrayImage) -> Self {
        Self::from_dynamic(DynamicImage::ImageLuma8(gray))
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("color", &self.src.color())
            .finish()
    }
}

/// Images are stored as lossless PNG data.
impl Serialize for Image {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut png = Cursor::new(Vec::new());
        self.src
            .write_to(&mut png, ImageOutputFormat::Png)
            .map_err(ser::Error::custom)?;
        serializer.serialize_bytes(png.get_ref())
    }
}

impl<'de> Deserialize<'de> for Image {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let png = Vec::<u8>::deserialize(deserializer)?;
        ::image::load_from_memory(&png)
            .map(Self::from_dynamic)
            .map_err(de::Error::custom)
    }
}
