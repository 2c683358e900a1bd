use cv_augment::{Correspondence, Feature, Image};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use imageproc::{drawing, pixelops};

const INLIER: Rgba<u8> = Rgba([0, 255, 0, 255]);
const OUTLIER: Rgba<u8> = Rgba([255, 0, 0, 255]);

pub fn render_keypoints(image: &Image, features: &[Feature]) -> DynamicImage {
    let mut canvas = drawing::Blend(image.src().to_rgba8());
    for feature in features {
        let (x, y) = feature.position();
        drawing::draw_cross_mut(&mut canvas, Rgba([0, 255, 255, 128]), x as i32, y as i32);
    }
    DynamicImage::ImageRgba8(canvas.0)
}

/// Places the entry image left of the query image and joins every correspondence with a line.
///
/// Lines are green for inliers and red for outliers. Without a mask every line is green.
pub fn render_correspondences(
    entry: &Image,
    entry_features: &[Feature],
    query: &Image,
    query_features: &[Feature],
    correspondences: &[Correspondence],
    inliers: Option<&[bool]>,
) -> RgbaImage {
    let (entry_width, entry_height) = entry.dimensions();
    let (query_width, query_height) = query.dimensions();
    let mut canvas = RgbaImage::new(entry_width + query_width, entry_height.max(query_height));
    imageops::replace(&mut canvas, &entry.src().to_rgba8(), 0, 0);
    imageops::replace(&mut canvas, &query.src().to_rgba8(), entry_width as i64, 0);

    for (ix, correspondence) in correspondences.iter().enumerate() {
        let inlier = inliers.map_or(true, |mask| mask.get(ix).copied().unwrap_or(false));
        let color = if inlier { INLIER } else { OUTLIER };
        let (ex, ey) = entry_features[correspondence.reference].position();
        let (qx, qy) = query_features[correspondence.query].position();
        drawing::draw_antialiased_line_segment_mut(
            &mut canvas,
            (ex as i32, ey as i32),
            ((qx + entry_width as f32) as i32, qy as i32),
            color,
            pixelops::interpolate,
        );
    }
    canvas
}
