//! Edge and detail emphasis filters for diagnostics and alternate preprocessing.
//!
//! Neither filter is part of the recognition path, which only equalizes.

use crate::Image;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::{filter3x3, gaussian_blur_f32};

const LAPLACIAN: [i32; 9] = [0, 1, 0, 1, -4, 1, 0, 1, 0];

/// Removes the low frequencies of the grayscale view.
///
/// Everything a Gaussian of standard deviation `sigma` would keep is subtracted,
/// leaving the magnitude of the fine detail. A non-positive `sigma` keeps nothing.
pub fn highpass_filter(image: &Image, sigma: f32) -> Image {
    let gray = image.grayscale();
    if !(sigma > 0.0) {
        return Image::from(GrayImage::new(gray.width(), gray.height()));
    }
    // Blurring in u8 would truncate and darken flat areas.
    let intensity: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
            Luma([f32::from(gray.get_pixel(x, y)[0])])
        });
    let low = gaussian_blur_f32(&intensity, sigma);
    let high: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let detail = intensity.get_pixel(x, y)[0] - low.get_pixel(x, y)[0];
        Luma([detail.abs().round().min(255.0) as u8])
    });
    Image::from(high)
}

/// Magnitude of the discrete Laplacian of the grayscale view.
pub fn laplacian_gradient(image: &Image) -> Image {
    let gray = image.grayscale();
    let laplacian = filter3x3::<Luma<u8>, i32, i16>(gray, &LAPLACIAN);
    let magnitude: GrayImage = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([laplacian.get_pixel(x, y)[0].unsigned_abs().min(255) as u8])
    });
    Image::from(magnitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(width: u32, height: u32) -> Image {
        Image::from(GrayImage::from_fn(width, height, |x, _| {
            Luma([if x < width / 2 { 40 } else { 200 }])
        }))
    }

    #[test]
    fn highpass_responds_at_edges_only() {
        let filtered = highpass_filter(&step(32, 8), 1.5);
        let gray = filtered.grayscale();
        assert!(gray.get_pixel(2, 4)[0] <= 1);
        assert!(gray.get_pixel(16, 4)[0] > 20);
    }

    #[test]
    fn highpass_is_unbiased_on_bright_flat_areas() {
        let filtered = highpass_filter(&step(32, 8), 1.5);
        let gray = filtered.grayscale();
        // Far enough from the step at x = 16 for the blur to see only one level.
        for x in (0..8).chain(25..32) {
            let detail = gray.get_pixel(x, 4)[0];
            assert!(detail <= 1, "detail {} at x = {}", detail, x);
        }
    }

    #[test]
    fn highpass_without_sigma_is_empty() {
        let filtered = highpass_filter(&step(16, 16), 0.0);
        assert!(filtered.grayscale().pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn laplacian_of_flat_image_is_zero() {
        let flat = Image::from(GrayImage::from_pixel(12, 12, Luma([77])));
        let filtered = laplacian_gradient(&flat);
        assert!(filtered.grayscale().pixels().all(|p| p[0] == 0));
        let edges = laplacian_gradient(&step(12, 12));
        assert_eq!(edges.grayscale().get_pixel(6, 6)[0], 160);
    }
}
