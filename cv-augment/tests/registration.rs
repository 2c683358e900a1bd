use cv_augment::{Augment, AugmentRenderer, Error, Homography, Matcher};
use cv_core::nalgebra::{Matrix3, Point2};
use cv_core::{FeatureMatch, KeyPoint};
use image::Rgba;

fn grid(n: usize, spacing: f64) -> Vec<Point2<f64>> {
    (0..n)
        .flat_map(|y| {
            (0..n).map(move |x| Point2::new(10.0 + x as f64 * spacing, 10.0 + y as f64 * spacing))
        })
        .collect()
}

fn matches_under(homography: &Homography, points: &[Point2<f64>]) -> Vec<FeatureMatch<KeyPoint>> {
    points
        .iter()
        .map(|&p| FeatureMatch(KeyPoint(p), KeyPoint(homography.project(p).unwrap())))
        .collect()
}

fn close(a: &Rgba<u8>, b: &Rgba<u8>) -> bool {
    a.0.iter().zip(b.0.iter()).all(|(&a, &b)| (a as i16 - b as i16).abs() <= 2)
}

fn translation(dx: f64, dy: f64) -> Homography {
    Homography::from_matrix(Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0))
}

#[test]
fn recovers_perspective_transform() {
    let _ = pretty_env_logger::try_init_timed();
    let truth = Homography::from_matrix(Matrix3::new(
        0.9, -0.1, 12.0, //
        0.08, 1.1, -4.0, //
        2e-4, -1e-4, 1.0,
    ));
    let points = grid(7, 30.0);
    let matches = matches_under(&truth, &points);

    let registration = Matcher::default().estimate_homography(&matches).unwrap();
    assert_eq!(registration.inlier_count(), matches.len());
    for &p in &points {
        let expected = truth.project(p).unwrap();
        let projected = registration.homography.project(p).unwrap();
        assert!((expected - projected).norm() < 1e-3, "{} vs {}", expected, projected);
    }
}

#[test]
fn outliers_are_flagged() {
    let _ = pretty_env_logger::try_init_timed();
    let truth = translation(15.0, -8.0);
    let points = grid(6, 25.0);
    let mut matches = matches_under(&truth, &points);
    let inliers = matches.len();
    for (i, p) in points.iter().take(6).enumerate() {
        let offset = 60.0 + 10.0 * i as f64;
        matches.push(FeatureMatch(
            KeyPoint(*p),
            KeyPoint(Point2::new(p.x - offset, p.y + offset)),
        ));
    }

    let registration = Matcher::default().estimate_homography(&matches).unwrap();
    assert_eq!(registration.inliers.len(), matches.len());
    assert!(registration.inliers[..inliers].iter().all(|&inlier| inlier));
    assert!(registration.inliers[inliers..].iter().all(|&inlier| !inlier));
}

#[test]
fn too_few_matches_fail() {
    let points = grid(2, 40.0);
    let matches = matches_under(&translation(1.0, 1.0), &points[..3]);
    match Matcher::default().estimate_homography(&matches) {
        Err(Error::HomographyEstimationFailed { correspondences }) => {
            assert_eq!(correspondences, 3)
        }
        other => panic!("expected estimation to fail, got {:?}", other),
    }
}

#[test]
fn collinear_matches_fail() {
    let points: Vec<Point2<f64>> = (0..12).map(|i| Point2::new(i as f64 * 10.0, 5.0)).collect();
    let matches = matches_under(&translation(3.0, 4.0), &points);
    assert!(matches!(
        Matcher::default().estimate_homography(&matches),
        Err(Error::HomographyEstimationFailed { .. })
    ));
}

#[test]
fn identity_warp_keeps_canvas() {
    let renderer = AugmentRenderer::default();
    let canvas = renderer.rasterize(
        &[Augment::Box {
            x: 0.0,
            y: 0.0,
            w: 10.0,
            h: 10.0,
        }],
        (64, 64),
    );
    assert_eq!(*canvas.get_pixel(0, 0), renderer.color);
    assert_eq!(*canvas.get_pixel(1, 1), renderer.color);
    assert_eq!(*canvas.get_pixel(5, 5), Rgba([0, 0, 0, 0]));

    let warped = renderer
        .warp(&canvas, &Homography::identity(), (64, 64))
        .unwrap();
    // Bilinear sampling needs a right and bottom neighbor, so the last row and column are skipped.
    for y in 0..63 {
        for x in 0..63 {
            assert!(close(warped.get_pixel(x, y), canvas.get_pixel(x, y)), "({}, {})", x, y);
        }
    }
}

#[test]
fn translation_moves_augments() {
    let renderer = AugmentRenderer::default();
    let canvas = renderer.rasterize(
        &[Augment::Box {
            x: 4.0,
            y: 4.0,
            w: 20.0,
            h: 20.0,
        }],
        (48, 48),
    );
    let warped = renderer
        .warp(&canvas, &translation(10.0, 5.0), (64, 64))
        .unwrap();
    assert_eq!(warped.dimensions(), (64, 64));
    // The top edge of the box at y = 4 lands on y = 9.
    assert!(close(warped.get_pixel(20, 9), &renderer.color));
    assert!(close(warped.get_pixel(20, 4), &Rgba([0, 0, 0, 0])));
    // Nothing maps onto the area beyond the source canvas.
    assert_eq!(*warped.get_pixel(62, 62), Rgba([0, 0, 0, 0]));
}

#[test]
fn degenerate_homographies_cannot_warp() {
    let renderer = AugmentRenderer::default();
    let canvas = renderer.rasterize(&[], (16, 16));
    let degenerate = [
        Matrix3::zeros(),
        // Rank one with a usable h22.
        Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 1.0, 2.0, 3.0),
        // Invertible, but h22 vanishes.
        Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1e-12),
        Matrix3::new(1.0, 0.0, f64::NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0),
    ];
    for matrix in degenerate {
        assert!(
            matches!(
                renderer.warp(&canvas, &Homography(matrix), (16, 16)),
                Err(Error::DegenerateHomography(_))
            ),
            "{} was accepted",
            matrix
        );
    }
}

#[test]
fn every_augment_kind_draws() {
    let renderer = AugmentRenderer::default();
    let augments = [
        Augment::Ellipse {
            x: 10.0,
            y: 10.0,
            w: 30.0,
            h: 20.0,
        },
        Augment::Arrow {
            x: 5.0,
            y: 50.0,
            length: 40.0,
            rotation: 0.0,
        },
    ];
    for augment in &augments {
        let canvas = renderer.rasterize(std::slice::from_ref(augment), (64, 64));
        assert!(
            canvas.pixels().any(|&p| p == renderer.color),
            "{} drew nothing",
            augment.kind()
        );
    }
    // Text is skipped without a font.
    let canvas = renderer.rasterize(
        &[Augment::Text {
            x: 1.0,
            y: 1.0,
            size: 12.0,
            text: "hi".to_owned(),
        }],
        (32, 32),
    );
    assert!(canvas.pixels().all(|&p| p == Rgba([0, 0, 0, 0])));
    // The arrow tip follows the rotation in degrees.
    let tip = augments[1].arrow_tip().unwrap();
    assert!((tip.0 - 45.0).abs() < 1e-4 && (tip.1 - 50.0).abs() < 1e-4);
}
