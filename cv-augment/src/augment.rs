use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// A user authored annotation, in the pixel coordinates of the entry image it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Augment {
    /// An outlined rectangle with its top-left corner at `(x, y)`.
    Box { x: f32, y: f32, w: f32, h: f32 },
    /// An arrow starting at `(x, y)` pointing `rotation` degrees clockwise from the +x axis.
    Arrow {
        x: f32,
        y: f32,
        length: f32,
        rotation: f32,
    },
    /// An outlined ellipse inscribed in the given bounding box.
    Ellipse { x: f32, y: f32, w: f32, h: f32 },
    /// A line of text with its top-left corner at `(x, y)` and a glyph height of `size` pixels.
    Text {
        x: f32,
        y: f32,
        size: f32,
        text: String,
    },
}

impl Augment {
    /// Rejects augments with non-finite coordinates or empty extents.
    pub fn validate(&self) -> Result<()> {
        let finite = |values: &[f32]| values.iter().all(|v| v.is_finite());
        match self {
            Augment::Box { x, y, w, h } | Augment::Ellipse { x, y, w, h } => {
                if !finite(&[*x, *y, *w, *h]) || *w < 1.0 || *h < 1.0 {
                    return Err(Error::InvalidAugment(format!(
                        "{} needs a finite extent of at least one pixel, found {}x{}",
                        self.kind(),
                        w,
                        h
                    )));
                }
            }
            Augment::Arrow {
                x,
                y,
                length,
                rotation,
            } => {
                if !finite(&[*x, *y, *length, *rotation]) || *length <= 0.0 {
                    return Err(Error::InvalidAugment(format!(
                        "arrow needs a finite positive length, found {}",
                        length
                    )));
                }
            }
            Augment::Text { x, y, size, text } => {
                if !finite(&[*x, *y, *size]) || *size <= 0.0 || text.is_empty() {
                    return Err(Error::InvalidAugment(
                        "text needs a finite positive size and a non-empty string".to_owned(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Augment::Box { .. } => "box",
            Augment::Arrow { .. } => "arrow",
            Augment::Ellipse { .. } => "ellipse",
            Augment::Text { .. } => "text",
        }
    }

    /// The tip of an arrow, or `None` for other augments.
    pub fn arrow_tip(&self) -> Option<(f32, f32)> {
        match *self {
            Augment::Arrow {
                x,
                y,
                length,
                rotation,
            } => {
                let radians = rotation.to_radians();
                Some((x + length * radians.cos(), y + length * radians.sin()))
            }
            _ => None,
        }
    }
}
