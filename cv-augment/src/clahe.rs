//! Contrast limited adaptive histogram equalization.
//!
//! The image is split into a grid of tiles. Each tile gets its own equalization
//! lookup table built from a clipped histogram, and every output pixel blends the
//! tables of the four nearest tile centers bilinearly so no tile seams appear.

use image::{GrayImage, ImageBuffer, Luma};
use std::ops::Range;

pub fn equalize(image: &GrayImage, clip_limit: f32, tile_grid: [u32; 2]) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let tiles_x = tile_grid[0].clamp(1, width);
    let tiles_y = tile_grid[1].clamp(1, height);

    // Floor division keeps every tile non-empty as long as there are no more tiles than pixels.
    let bounds = |tile: u32, tiles: u32, extent: u32| {
        let extent = u64::from(extent);
        let start = u64::from(tile) * extent / u64::from(tiles);
        let end = u64::from(tile + 1) * extent / u64::from(tiles);
        start as u32..end as u32
    };
    let luts: Vec<[u8; 256]> = (0..tiles_y)
        .flat_map(|ty| (0..tiles_x).map(move |tx| (tx, ty)))
        .map(|(tx, ty)| {
            tile_lut(
                image,
                bounds(tx, tiles_x, width),
                bounds(ty, tiles_y, height),
                clip_limit,
            )
        })
        .collect();

    let tile_width = width as f32 / tiles_x as f32;
    let tile_height = height as f32 / tiles_y as f32;
    let neighbors = |position: u32, tile_size: f32, tiles: u32| {
        let t = (position as f32 + 0.5) / tile_size - 0.5;
        let first = t.floor();
        let weight = t - first;
        let clamp = |t: f32| (t.max(0.0) as u32).min(tiles - 1);
        (clamp(first), clamp(first + 1.0), weight)
    };

    ImageBuffer::from_fn(width, height, |x, y| {
        let (tx0, tx1, ax) = neighbors(x, tile_width, tiles_x);
        let (ty0, ty1, ay) = neighbors(y, tile_height, tiles_y);
        let value = image.get_pixel(x, y)[0] as usize;
        let lut = |tx: u32, ty: u32| f32::from(luts[(ty * tiles_x + tx) as usize][value]);
        let top = lut(tx0, ty0) * (1.0 - ax) + lut(tx1, ty0) * ax;
        let bottom = lut(tx0, ty1) * (1.0 - ax) + lut(tx1, ty1) * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(image: &GrayImage, xs: Range<u32>, ys: Range<u32>, clip_limit: f32) -> [u8; 256] {
    let mut histogram = [0u32; 256];
    for y in ys.clone() {
        for x in xs.clone() {
            histogram[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = xs.len() * ys.len();

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in histogram.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }
        let batch = excess / 256;
        let residual = excess % 256;
        for bin in histogram.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let stride = (256 / residual).max(1) as usize;
            for bin in histogram.iter_mut().step_by(stride).take(residual as usize) {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u32;
    for (mapped, &count) in lut.iter_mut().zip(histogram.iter()) {
        cumulative += count;
        *mapped = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn low_contrast(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, _| Luma([100 + (x * 32 / width) as u8]))
    }

    fn range(image: &GrayImage) -> u8 {
        let max = image.pixels().map(|p| p[0]).max().unwrap();
        let min = image.pixels().map(|p| p[0]).min().unwrap();
        max - min
    }

    #[test]
    fn keeps_dimensions() {
        let image = low_contrast(37, 23);
        let equalized = equalize(&image, 2.0, [2, 2]);
        assert_eq!(equalized.dimensions(), (37, 23));
    }

    #[test]
    fn is_deterministic() {
        let image = low_contrast(64, 48);
        assert_eq!(
            equalize(&image, 2.0, [2, 2]).into_raw(),
            equalize(&image, 2.0, [2, 2]).into_raw()
        );
    }

    #[test]
    fn stretches_low_contrast() {
        let image = low_contrast(64, 64);
        let equalized = equalize(&image, 2.0, [2, 2]);
        assert!(range(&equalized) > range(&image));
    }

    #[test]
    fn more_tiles_than_pixels() {
        let image = low_contrast(3, 2);
        let equalized = equalize(&image, 2.0, [8, 8]);
        assert_eq!(equalized.dimensions(), (3, 2));
    }

    #[test]
    fn clipped_histogram_keeps_mass() {
        let image = GrayImage::from_pixel(16, 16, Luma([40]));
        let lut = tile_lut(&image, 0..16, 0..16, 2.0);
        // The cumulative histogram always ends at the tile area.
        assert_eq!(lut[255], 255);
    }
}
