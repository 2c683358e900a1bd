use crate::errors::{Error, Result};
use crate::{Augment, Entry};
use four_point::Homography;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_hollow_ellipse_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::rect::Rect;
use log::*;
use rusttype::{Font, Scale};
use std::fs;
use std::path::Path;

/// Angle between the shaft and each barb of an arrow head, in degrees.
const ARROW_HEAD_ANGLE: f32 = 150.0;
const MAX_ARROW_HEAD: f32 = 20.0;
/// Homographies with `|h22|` or `|det|` at or below this cannot be warped with.
const MIN_COEFFICIENT: f64 = 1e-9;

/// Draws augments onto a transparent canvas and carries that canvas through a homography.
///
/// Augments are rasterized in entry coordinates first and the raster is warped
/// afterwards, so every augment kind follows a perspective change the same way.
#[derive(Clone)]
pub struct AugmentRenderer {
    pub color: Rgba<u8>,
    /// Stroke width in pixels.
    pub thickness: u32,
    font: Option<Font<'static>>,
}

impl AugmentRenderer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_font(self, font: Font<'static>) -> Self {
        Self {
            font: Some(font),
            ..self
        }
    }

    /// Loads the TrueType font used for text augments.
    pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let font = Font::try_from_vec(fs::read(path)?).ok_or_else(|| Error::Font(path.to_owned()))?;
        Ok(self.with_font(font))
    }

    /// Draws `augments` onto a transparent canvas of the given `(width, height)`.
    pub fn rasterize(&self, augments: &[Augment], (width, height): (u32, u32)) -> RgbaImage {
        let mut canvas = RgbaImage::new(width, height);
        for augment in augments {
            self.draw(&mut canvas, augment);
        }
        canvas
    }

    /// Warps an entry canvas into a query frame of the given `(width, height)`.
    ///
    /// Query pixels that map outside the canvas stay transparent. Fails with
    /// [`Error::DegenerateHomography`] for singular or non-finite homographies.
    pub fn warp(
        &self,
        canvas: &RgbaImage,
        homography: &Homography,
        (width, height): (u32, u32),
    ) -> Result<RgbaImage> {
        let matrix = homography.matrix();
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(Error::DegenerateHomography("non-finite coefficients".to_owned()));
        }
        if matrix[(2, 2)].abs() <= MIN_COEFFICIENT {
            return Err(Error::DegenerateHomography(format!(
                "h22 = {} is too small to normalize by",
                matrix[(2, 2)]
            )));
        }
        let determinant = matrix.determinant();
        if determinant.abs() <= MIN_COEFFICIENT {
            return Err(Error::DegenerateHomography(format!(
                "singular matrix with determinant {}",
                determinant
            )));
        }
        let projection = Projection::from_matrix(homography.to_row_major_f32()).ok_or_else(|| {
            Error::DegenerateHomography("not invertible in single precision".to_owned())
        })?;
        let mut warped = RgbaImage::new(width, height);
        warp_into(
            canvas,
            &projection,
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
            &mut warped,
        );
        Ok(warped)
    }

    /// Renders the augments of `entry` as they appear in a query frame of size `dimensions`.
    pub fn project(
        &self,
        entry: &Entry,
        homography: &Homography,
        dimensions: (u32, u32),
    ) -> Result<RgbaImage> {
        let canvas = self.rasterize(entry.augments(), entry.image().dimensions());
        self.warp(&canvas, homography, dimensions)
    }

    fn draw(&self, canvas: &mut RgbaImage, augment: &Augment) {
        match *augment {
            Augment::Box { x, y, w, h } => {
                for inset in 0..self.thickness {
                    let inset = inset as f32;
                    let (w, h) = (w - 2.0 * inset, h - 2.0 * inset);
                    if w < 1.0 || h < 1.0 {
                        break;
                    }
                    let rect = Rect::at((x + inset).round() as i32, (y + inset).round() as i32)
                        .of_size(w.round() as u32, h.round() as u32);
                    draw_hollow_rect_mut(canvas, rect, self.color);
                }
            }
            Augment::Ellipse { x, y, w, h } => {
                let center = ((x + w / 2.0).round() as i32, (y + h / 2.0).round() as i32);
                for inset in 0..self.thickness {
                    let inset = inset as f32;
                    let rx = (w / 2.0 - inset).round() as i32;
                    let ry = (h / 2.0 - inset).round() as i32;
                    if rx < 1 || ry < 1 {
                        break;
                    }
                    draw_hollow_ellipse_mut(canvas, center, rx, ry, self.color);
                }
            }
            Augment::Arrow {
                x,
                y,
                length,
                rotation,
            } => {
                let tip = augment.arrow_tip().unwrap_or((x, y));
                self.stroke(canvas, (x, y), tip);
                let barb = (length * 0.3).min(MAX_ARROW_HEAD);
                for side in [-1.0, 1.0] {
                    let angle = (rotation + side * ARROW_HEAD_ANGLE).to_radians();
                    let end = (tip.0 + barb * angle.cos(), tip.1 + barb * angle.sin());
                    self.stroke(canvas, tip, end);
                }
            }
            Augment::Text {
                x,
                y,
                size,
                ref text,
            } => match &self.font {
                Some(font) => draw_text_mut(
                    canvas,
                    self.color,
                    x.round() as i32,
                    y.round() as i32,
                    Scale::uniform(size),
                    font,
                    text,
                ),
                None => warn!("no font loaded, skipping text augment {:?}", text),
            },
        }
    }

    /// A line of `thickness` parallel one pixel segments centered on `a`-`b`.
    fn stroke(&self, canvas: &mut RgbaImage, a: (f32, f32), b: (f32, f32)) {
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let length = (dx * dx + dy * dy).sqrt();
        let normal = if length > 0.0 {
            (-dy / length, dx / length)
        } else {
            (0.0, 0.0)
        };
        let center = (self.thickness.max(1) - 1) as f32 / 2.0;
        for i in 0..self.thickness.max(1) {
            let offset = i as f32 - center;
            let shift = (normal.0 * offset, normal.1 * offset);
            draw_line_segment_mut(
                canvas,
                (a.0 + shift.0, a.1 + shift.1),
                (b.0 + shift.0, b.1 + shift.1),
                self.color,
            );
        }
    }
}

impl Default for AugmentRenderer {
    fn default() -> Self {
        Self {
            color: Rgba([0, 255, 255, 255]),
            thickness: 2,
            font: None,
        }
    }
}
