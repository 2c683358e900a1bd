use bitarray::BitArray;
use cv_core::nalgebra::Point2;
use cv_core::{ImagePoint, KeyPoint};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The binary descriptor produced by the akaze detector.
pub type Descriptor = BitArray<64>;

/// The stored geometry of a detected keypoint.
///
/// Follows the OpenCV conventions: `x` grows to the right and `y` grows downward,
/// both in pixels of the image the keypoint was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyPointRecord {
    pub x: f32,
    pub y: f32,
    /// The radius defining the extent of the keypoint, in pixel units
    pub size: f32,
    /// The orientation angle
    pub angle: f32,
    /// The magnitude of response from the detector
    pub response: f32,
    /// The level of scale space in which the keypoint was detected
    pub octave: usize,
    pub class_id: usize,
}

impl KeyPointRecord {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            size: 0.0,
            angle: 0.0,
            response: 0.0,
            octave: 0,
            class_id: 0,
        }
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

impl From<akaze::KeyPoint> for KeyPointRecord {
    fn from(kp: akaze::KeyPoint) -> Self {
        Self {
            x: kp.point.0,
            y: kp.point.1,
            size: kp.size,
            angle: kp.angle,
            response: kp.response,
            octave: kp.octave,
            class_id: kp.class_id,
        }
    }
}

impl ImagePoint for KeyPointRecord {
    fn image_point(&self) -> Point2<f64> {
        Point2::new(self.x as f64, self.y as f64)
    }
}

impl From<KeyPointRecord> for KeyPoint {
    fn from(record: KeyPointRecord) -> Self {
        KeyPoint(record.image_point())
    }
}

/// A keypoint together with its descriptor.
#[derive(Clone, Serialize, Deserialize)]
pub struct Feature {
    key_point: KeyPointRecord,
    #[serde(with = "descriptor_bytes")]
    descriptor: Descriptor,
}

impl Feature {
    pub fn new(key_point: KeyPointRecord, descriptor: Descriptor) -> Self {
        Self {
            key_point,
            descriptor,
        }
    }

    pub fn key_point(&self) -> &KeyPointRecord {
        &self.key_point
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn position(&self) -> (f32, f32) {
        self.key_point.position()
    }

    pub fn angle(&self) -> f32 {
        self.key_point.angle
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("key_point", &self.key_point)
            .field("descriptor", &self.descriptor.bytes())
            .finish()
    }
}

/// An axis-aligned rectangle in image pixels, used to pick out the features of a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    /// Builds the region spanned by two corners given in any order, like a drag selection.
    pub fn from_corners(a: (f32, f32), b: (f32, f32)) -> Self {
        Self {
            x: a.0.min(b.0),
            y: a.1.min(b.1),
            width: (a.0 - b.0).abs(),
            height: (a.1 - b.1).abs(),
        }
    }

    pub fn contains(&self, (x, y): (f32, f32)) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

/// Keeps the features whose keypoint lies inside `region`, in their original order.
pub fn select_features(features: &[Feature], region: &Region) -> Vec<Feature> {
    features
        .iter()
        .filter(|feature| region.contains(feature.position()))
        .cloned()
        .collect()
}

mod descriptor_bytes {
    use super::Descriptor;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        descriptor: &Descriptor,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(descriptor.bytes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Descriptor, D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        let len = bytes.len();
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| de::Error::invalid_length(len, &"a 64 byte descriptor"))?;
        Ok(Descriptor::new(bytes))
    }
}
