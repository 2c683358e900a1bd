use cv_core::{
    nalgebra::{Matrix3, Point2, SMatrix, SVector},
    sample_consensus::{Estimator, Model},
    FeatureMatch, ImagePoint,
};
use float_ord::FloatOrd;

/// A planar projective transform mapping reference image points to query image points.
///
/// The matrix is kept scaled so that its bottom-right element is `1` whenever that
/// element is not vanishingly small.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(pub Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    /// Creates a homography from a matrix, rescaling it so that `h[(2, 2)] == 1`.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        let scale = matrix[(2, 2)];
        if scale.abs() > f64::EPSILON {
            Self(matrix / scale)
        } else {
            Self(matrix)
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// Maps a reference point into the query frame.
    ///
    /// Returns `None` if the point maps to infinity.
    pub fn project(&self, point: Point2<f64>) -> Option<Point2<f64>> {
        let v = self.0 * point.to_homogeneous();
        if v.z.abs() < f64::EPSILON {
            None
        } else {
            Some(Point2::new(v.x / v.z, v.y / v.z))
        }
    }

    pub fn inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self::from_matrix)
    }

    /// Euclidean distance in pixels between the projected reference point and the query point.
    pub fn reprojection_error(&self, reference: Point2<f64>, query: Point2<f64>) -> f64 {
        self.project(reference)
            .map(|projected| (projected - query).norm())
            .unwrap_or(f64::INFINITY)
    }

    /// Row-major single precision coefficients, the layout expected by raster warping routines.
    pub fn to_row_major_f32(&self) -> [f32; 9] {
        let m = &self.0;
        [
            m[(0, 0)] as f32,
            m[(0, 1)] as f32,
            m[(0, 2)] as f32,
            m[(1, 0)] as f32,
            m[(1, 1)] as f32,
            m[(1, 2)] as f32,
            m[(2, 0)] as f32,
            m[(2, 1)] as f32,
            m[(2, 2)] as f32,
        ]
    }
}

impl<P> Model<FeatureMatch<P>> for Homography
where
    P: ImagePoint,
{
    fn residual(&self, data: &FeatureMatch<P>) -> f64 {
        let FeatureMatch(reference, query) = data;
        self.reprojection_error(reference.image_point(), query.image_point())
    }
}

/// Estimates a [`Homography`] with the normalized direct linear transform.
///
/// Four matches determine the transform exactly. Any larger set of matches is solved
/// in the least-squares sense, which is how a consensus winner gets refined over all
/// of its inliers.
#[derive(Copy, Clone, Debug)]
pub struct FourPoint {
    pub epsilon: f64,
    pub iterations: usize,
    /// Sine of the smallest angle a point triple may span before it counts as collinear.
    pub collinearity_epsilon: f64,
}

impl FourPoint {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_matches<I, P>(&self, data: I) -> Option<Homography>
    where
        I: Iterator<Item = FeatureMatch<P>>,
        P: ImagePoint,
    {
        let (reference, query): (Vec<_>, Vec<_>) = data
            .map(|FeatureMatch(a, b)| (a.image_point(), b.image_point()))
            .unzip();
        self.from_points(&reference, &query)
    }

    /// Solves for the homography mapping each `reference[i]` onto `query[i]`.
    pub fn from_points(
        &self,
        reference: &[Point2<f64>],
        query: &[Point2<f64>],
    ) -> Option<Homography> {
        if reference.len() < 4 || reference.len() != query.len() {
            return None;
        }
        if self.degenerate(reference) || self.degenerate(query) {
            return None;
        }
        let reference_transform = normalizing_transform(reference)?;
        let query_transform = normalizing_transform(query)?;

        // Accumulate AᵀA directly so any number of matches fits in a fixed-size system.
        let mut ata = SMatrix::<f64, 9, 9>::zeros();
        for (&a, &b) in reference.iter().zip(query) {
            let a = reference_transform * a.to_homogeneous();
            let b = query_transform * b.to_homogeneous();
            let (x, y) = (a.x / a.z, a.y / a.z);
            let (u, v) = (b.x / b.z, b.y / b.z);
            #[rustfmt::skip]
            let rows: [SVector<f64, 9>; 2] = [
                SVector::from_column_slice(&[-x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u]),
                SVector::from_column_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]),
            ];
            for row in &rows {
                ata += row * row.transpose();
            }
        }

        let eigens = ata.try_symmetric_eigen(self.epsilon, self.iterations)?;
        let h = eigens
            .eigenvalues
            .iter()
            .enumerate()
            .min_by_key(|&(_, &n)| FloatOrd(n))
            .map(|(ix, _)| eigens.eigenvectors.column(ix).into_owned())?;
        // `Matrix3::new` takes its arguments in row-major order.
        let normalized = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
        // The eigenvector has unit norm, so a vanishing determinant means a singular transform.
        if normalized.determinant().abs() < self.epsilon {
            return None;
        }
        let matrix = query_transform.try_inverse()? * normalized * reference_transform;
        Some(Homography::from_matrix(matrix))
    }

    /// A minimal sample is degenerate if any three of its points are collinear.
    /// Larger sets are degenerate only if all of their points lie on one line.
    fn degenerate(&self, points: &[Point2<f64>]) -> bool {
        if points.len() == 4 {
            let triples = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
            triples
                .iter()
                .any(|&[i, j, k]| self.collinear(points[i], points[j], points[k]))
        } else {
            let n = points.len() as f64;
            let centroid = points.iter().fold(Point2::origin(), |acc: Point2<f64>, p| {
                acc + p.coords / n
            });
            let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
            for p in points {
                let d = p - centroid;
                sxx += d.x * d.x;
                syy += d.y * d.y;
                sxy += d.x * d.y;
            }
            let mean = 0.5 * (sxx + syy);
            let spread = (0.25 * (sxx - syy) * (sxx - syy) + sxy * sxy).sqrt();
            let (major, minor) = (mean + spread, mean - spread);
            major <= f64::EPSILON
                || minor <= self.collinearity_epsilon * self.collinearity_epsilon * major
        }
    }

    fn collinear(&self, a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> bool {
        let ab = b - a;
        let ac = c - a;
        let cross = ab.x * ac.y - ab.y * ac.x;
        cross.abs() <= self.collinearity_epsilon * ab.norm() * ac.norm()
    }
}

impl Default for FourPoint {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            iterations: 1000,
            collinearity_epsilon: 1e-6,
        }
    }
}

impl<P> Estimator<FeatureMatch<P>> for FourPoint
where
    P: ImagePoint,
{
    type Model = Homography;
    type ModelIter = Option<Homography>;
    const MIN_SAMPLES: usize = 4;

    fn estimate<I>(&self, data: I) -> Self::ModelIter
    where
        I: Iterator<Item = FeatureMatch<P>> + Clone,
    {
        self.from_matches(data.take(<Self as Estimator<FeatureMatch<P>>>::MIN_SAMPLES))
    }
}

/// Hartley normalization: moves the centroid to the origin and scales the mean
/// distance from it to `sqrt(2)`.
fn normalizing_transform(points: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let centroid = points
        .iter()
        .fold(Point2::origin(), |acc: Point2<f64>, p| acc + p.coords / n);
    let mean_distance = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / n;
    if mean_distance <= f64::EPSILON {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_distance;
    Some(Matrix3::new(
        s,
        0.0,
        -s * centroid.x,
        0.0,
        s,
        -s * centroid.y,
        0.0,
        0.0,
        1.0,
    ))
}
