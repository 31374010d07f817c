use std::time::Instant;

use log::{debug, info};
use plinth_core::{
    containers::PointCloud,
    math::PlaneModel,
    nalgebra::{Matrix3, Vector3},
};
use rand::{rngs::SmallRng, seq::index, Rng, SeedableRng};
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};

/// Samples whose spanned area is below this fraction of the product of their edge lengths count as collinear
const COLLINEARITY_EPSILON: f64 = 1e-9;

/// Parameters of the RANSAC plane segmentation
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RansacParams {
    /// Maximum orthogonal distance of an inlier to the plane
    pub distance_threshold: f64,
    /// Number of points drawn per trial, at least 3
    pub ransac_n: usize,
    /// Number of random trials
    pub num_iterations: usize,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            distance_threshold: 0.02,
            ransac_n: 3,
            num_iterations: 1000,
        }
    }
}

impl RansacParams {
    pub fn with_distance_threshold(mut self, distance_threshold: f64) -> Self {
        self.distance_threshold = distance_threshold;
        self
    }

    pub fn with_ransac_n(mut self, ransac_n: usize) -> Self {
        self.ransac_n = ransac_n;
        self
    }

    pub fn with_num_iterations(mut self, num_iterations: usize) -> Self {
        self.num_iterations = num_iterations;
        self
    }
}

/// The dominant plane of a point cloud together with the indices of its inliers
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneSegmentation {
    /// Best plane, with a normal of unit length
    pub plane: PlaneModel,
    /// Indices of all points within `distance_threshold` of `plane`, in increasing order
    pub inliers: Vec<usize>,
}

impl PlaneSegmentation {
    /// Splits `cloud` into the inliers of the plane and all remaining points. `cloud` must be the cloud the
    /// segmentation was computed on
    pub fn floor_and_rest(&self, cloud: &PointCloud) -> Result<(PointCloud, PointCloud)> {
        let to_error = |e: anyhow::Error| {
            ProcessingError::InvalidParameter(format!(
                "inliers do not belong to the given cloud: {}",
                e
            ))
        };
        let floor = cloud.select_by_index(&self.inliers).map_err(to_error)?;
        let rest = cloud
            .select_by_index_inverted(&self.inliers)
            .map_err(to_error)?;
        Ok((floor, rest))
    }
}

/// Fits a plane through the sampled positions. Returns `None` if the sample is degenerate (collinear or
/// coincident points)
fn fit_plane(sample: &[Vector3<f64>]) -> Option<PlaneModel> {
    if sample.len() == 3 {
        // compute plane from the three positions
        let vec1 = sample[1] - sample[0];
        let vec2 = sample[2] - sample[0];
        let normal = vec1.cross(&vec2);
        if normal.norm() <= COLLINEARITY_EPSILON * vec1.norm() * vec2.norm() {
            return None;
        }
        return PlaneModel::from_normal_and_point(&normal, &sample[0]).normalized();
    }
    fit_plane_least_squares(sample)
}

/// Least squares plane through more than three points: the normal is the eigenvector of the smallest eigenvalue
/// of the covariance matrix
fn fit_plane_least_squares(sample: &[Vector3<f64>]) -> Option<PlaneModel> {
    let centroid = calc_centroid(sample);
    let covariance_matrix = calc_covariance_matrix(&centroid, sample);
    let eigen = covariance_matrix.symmetric_eigen();

    let mut order = [0, 1, 2];
    order.sort_unstable_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let (smallest, middle, largest) = (order[0], order[1], order[2]);

    let largest_eigenvalue = eigen.eigenvalues[largest];
    if !(largest_eigenvalue > 0.0)
        || eigen.eigenvalues[middle] <= COLLINEARITY_EPSILON * largest_eigenvalue
    {
        return None;
    }
    let normal: Vector3<f64> = eigen.eigenvectors.column(smallest).into_owned();
    PlaneModel::from_normal_and_point(&normal, &centroid).normalized()
}

fn calc_centroid(points: &[Vector3<f64>]) -> Vector3<f64> {
    let sum: Vector3<f64> = points.iter().sum();
    sum / (points.len() as f64)
}

fn calc_covariance_matrix(centroid: &Vector3<f64>, points: &[Vector3<f64>]) -> Matrix3<f64> {
    let unweighted_covariance_matrix: Matrix3<f64> = points
        .iter()
        .map(|v| {
            let diff: Vector3<f64> = v - centroid;
            diff * diff.transpose()
        })
        .sum();
    unweighted_covariance_matrix / (points.len() as f64)
}

/// Draws `ransac_n` distinct points and fits a plane through them
fn generate_rng_plane<R: Rng + ?Sized>(
    positions: &[Vector3<f64>],
    ransac_n: usize,
    rng: &mut R,
) -> Option<PlaneModel> {
    let sample = index::sample(rng, positions.len(), ransac_n)
        .into_iter()
        .map(|idx| positions[idx])
        .collect::<Vec<_>>();
    fit_plane(&sample)
}

fn count_inliers(positions: &[Vector3<f64>], plane: &PlaneModel, distance_threshold: f64) -> usize {
    positions
        .iter()
        .filter(|p| plane.distance(p) <= distance_threshold)
        .count()
}

fn collect_inliers(
    positions: &[Vector3<f64>],
    plane: &PlaneModel,
    distance_threshold: f64,
) -> Vec<usize> {
    positions
        .iter()
        .enumerate()
        .filter(|(_, p)| plane.distance(p) <= distance_threshold)
        .map(|(index, _)| index)
        .collect()
}

fn validate(cloud: &PointCloud, params: &RansacParams) -> Result<()> {
    if params.ransac_n < 3 {
        return Err(ProcessingError::InvalidParameter(format!(
            "ransac_n must be at least 3 to define a plane, got {}",
            params.ransac_n
        )));
    }
    if !(params.distance_threshold >= 0.0) {
        return Err(ProcessingError::InvalidParameter(format!(
            "distance_threshold must be >= 0, got {}",
            params.distance_threshold
        )));
    }
    if cloud.is_empty() {
        return Err(ProcessingError::EmptyInput);
    }
    if cloud.len() < params.ransac_n {
        return Err(ProcessingError::InsufficientPoints {
            required: params.ransac_n,
            available: cloud.len(),
        });
    }
    Ok(())
}

fn finish(
    cloud: &PointCloud,
    params: &RansacParams,
    best_plane: Option<PlaneModel>,
    t_start: Instant,
) -> Result<PlaneSegmentation> {
    let plane = best_plane.ok_or(ProcessingError::NoPlaneFound {
        iterations: params.num_iterations,
    })?;
    let inliers = collect_inliers(cloud.positions(), &plane, params.distance_threshold);
    info!("Plane equation: {}", plane);
    info!("Number of floor points: {}", inliers.len());
    info!(
        "Plane segmentation took {:.2}s",
        t_start.elapsed().as_secs_f64()
    );
    Ok(PlaneSegmentation { plane, inliers })
}

/// Ransac Plane Segmentation in serial.
/// Returns the plane with the most inliers and the indices of these inliers. Each of the
/// `num_iterations` trials draws `ransac_n` distinct points from `cloud` using `rng`. Trials on collinear
/// samples are skipped. Ties between trials keep the earlier trial.
///
/// # Examples
///
/// ```
/// # use plinth_core::{containers::PointCloud, nalgebra::Vector3};
/// # use plinth_algorithms::segmentation::{segment_plane, RansacParams};
/// # use rand::{rngs::StdRng, SeedableRng};
/// let mut positions = (0..200)
///     .map(|i| Vector3::new((i % 20) as f64, (i / 20) as f64, 1.0))
///     .collect::<Vec<_>>();
/// // an outlier
/// positions.push(Vector3::new(3.0, 3.0, 9.0));
/// let cloud = PointCloud::from_positions(positions);
/// let mut rng = StdRng::seed_from_u64(1);
/// let params = RansacParams::default().with_distance_threshold(0.01).with_num_iterations(50);
/// let segmentation = segment_plane(&cloud, &params, &mut rng).unwrap();
/// assert_eq!(segmentation.inliers, (0..200).collect::<Vec<_>>());
/// ```
///
/// # Errors
///
/// `InvalidParameter` if `ransac_n < 3` or the threshold is negative, `EmptyInput` for an empty cloud,
/// `InsufficientPoints` if the cloud has fewer than `ransac_n` points, `NoPlaneFound` if every trial was degenerate.
pub fn segment_plane<R: Rng + ?Sized>(
    cloud: &PointCloud,
    params: &RansacParams,
    rng: &mut R,
) -> Result<PlaneSegmentation> {
    validate(cloud, params)?;
    info!("Segmenting the dominant plane...");
    debug!("{:?}", params);
    let t_start = Instant::now();
    let positions = cloud.positions();

    let mut best: Option<(usize, PlaneModel)> = None;
    let mut degenerate_trials = 0;
    for _ in 0..params.num_iterations {
        let plane = match generate_rng_plane(positions, params.ransac_n, rng) {
            Some(plane) => plane,
            None => {
                degenerate_trials += 1;
                continue;
            }
        };
        let ranking = count_inliers(positions, &plane, params.distance_threshold);
        let is_better = match &best {
            Some((best_ranking, _)) => ranking > *best_ranking,
            None => true,
        };
        if is_better {
            best = Some((ranking, plane));
        }
    }
    debug!("{} degenerate trials skipped", degenerate_trials);

    finish(cloud, params, best.map(|(_, plane)| plane), t_start)
}

/// Ransac Plane Segmentation in parallel.
/// Same as [segment_plane], but the trials run on the rayon thread pool. Trial `i` draws its sample from an RNG
/// seeded with `seed` and `i`, and ties are resolved towards the lowest trial index, so the result only depends
/// on `seed` and not on the number of threads.
pub fn segment_plane_par(
    cloud: &PointCloud,
    params: &RansacParams,
    seed: u64,
) -> Result<PlaneSegmentation> {
    validate(cloud, params)?;
    info!("Segmenting the dominant plane...");
    debug!("{:?}, seed {}", params, seed);
    let t_start = Instant::now();
    let positions = cloud.positions();

    let best = (0..params.num_iterations)
        .into_par_iter()
        .filter_map(|trial| {
            let mut rng = SmallRng::seed_from_u64(trial_seed(seed, trial));
            let plane = generate_rng_plane(positions, params.ransac_n, &mut rng)?;
            let ranking = count_inliers(positions, &plane, params.distance_threshold);
            Some((ranking, trial, plane))
        })
        // highest ranking wins, on equal ranking the lower trial index
        .reduce_with(|a, b| {
            if b.0 > a.0 || (b.0 == a.0 && b.1 < a.1) {
                b
            } else {
                a
            }
        });

    finish(cloud, params, best.map(|(_, _, plane)| plane), t_start)
}

/// Derives an independent seed for every trial (splitmix64 finalizer)
fn trial_seed(seed: u64, trial: usize) -> u64 {
    let mut z = seed.wrapping_add((trial as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;

    /// 40x40 grid on z = 0 followed by 100 points at z = 10
    fn setup_point_cloud() -> PointCloud {
        let mut positions = (0..1600)
            .map(|i| Vector3::new((i % 40) as f64 * 0.05, (i / 40) as f64 * 0.05, 0.0))
            .collect::<Vec<_>>();
        positions.extend((0..100).map(|i| Vector3::new((i % 10) as f64, (i / 10) as f64, 10.0)));
        PointCloud::from_positions(positions)
    }

    fn assert_is_z_plane(plane: &PlaneModel, height: f64) {
        let [a, b, c, d] = plane.coefficients();
        assert_approx_eq!(a, 0.0);
        assert_approx_eq!(b, 0.0);
        assert_approx_eq!(c.abs(), 1.0);
        assert_approx_eq!(d / -c, height);
    }

    #[test]
    fn test_segment_plane_serial() {
        let cloud = setup_point_cloud();
        let mut rng = StdRng::seed_from_u64(17);
        let params = RansacParams::default().with_distance_threshold(0.01);
        let segmentation = segment_plane(&cloud, &params, &mut rng).unwrap();
        assert_eq!(segmentation.inliers, (0..1600).collect::<Vec<_>>());
        assert_is_z_plane(&segmentation.plane, 0.0);
    }

    #[test]
    fn test_segment_plane_par() {
        let cloud = setup_point_cloud();
        let params = RansacParams::default()
            .with_distance_threshold(0.01)
            .with_num_iterations(300);
        let segmentation = segment_plane_par(&cloud, &params, 5).unwrap();
        assert_eq!(segmentation.inliers, (0..1600).collect::<Vec<_>>());
        assert_is_z_plane(&segmentation.plane, 0.0);
    }

    #[test]
    fn test_segment_plane_par_is_deterministic() {
        let cloud = setup_point_cloud();
        let params = RansacParams::default()
            .with_distance_threshold(0.5)
            .with_num_iterations(64);
        let first = segment_plane_par(&cloud, &params, 99).unwrap();
        let second = segment_plane_par(&cloud, &params, 99).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_same_seed_same_result() {
        let cloud = setup_point_cloud();
        let params = RansacParams::default().with_num_iterations(20);
        let first = segment_plane(&cloud, &params, &mut StdRng::seed_from_u64(3)).unwrap();
        let second = segment_plane(&cloud, &params, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_least_squares_sample() {
        let cloud = setup_point_cloud();
        let mut rng = StdRng::seed_from_u64(23);
        let params = RansacParams::default()
            .with_distance_threshold(0.01)
            .with_ransac_n(5)
            .with_num_iterations(200);
        let segmentation = segment_plane(&cloud, &params, &mut rng).unwrap();
        assert_eq!(segmentation.inliers.len(), 1600);
        assert_is_z_plane(&segmentation.plane, 0.0);
    }

    #[test]
    fn test_tilted_plane() {
        // plane x + y + z = 1
        let positions = (0..400)
            .map(|i| {
                let x = (i % 20) as f64 * 0.1;
                let y = (i / 20) as f64 * 0.1;
                Vector3::new(x, y, 1.0 - x - y)
            })
            .collect::<Vec<_>>();
        let cloud = PointCloud::from_positions(positions);
        let mut rng = StdRng::seed_from_u64(0);
        let segmentation =
            segment_plane(&cloud, &RansacParams::default(), &mut rng).unwrap();
        assert_eq!(segmentation.inliers.len(), 400);
        let normal = segmentation.plane.normal();
        let expected = Vector3::new(1.0, 1.0, 1.0).normalize();
        assert_approx_eq!(normal.dot(&expected).abs(), 1.0);
    }

    #[test]
    fn test_collinear_cloud_has_no_plane() {
        let positions = (0..50)
            .map(|i| Vector3::new(i as f64, 2.0 * i as f64, 0.5))
            .collect::<Vec<_>>();
        let cloud = PointCloud::from_positions(positions);
        let mut rng = StdRng::seed_from_u64(1);
        let params = RansacParams::default().with_num_iterations(25);
        assert_eq!(
            segment_plane(&cloud, &params, &mut rng).unwrap_err(),
            ProcessingError::NoPlaneFound { iterations: 25 }
        );
        assert_eq!(
            segment_plane_par(&cloud, &params, 1).unwrap_err(),
            ProcessingError::NoPlaneFound { iterations: 25 }
        );
    }

    #[test]
    fn test_insufficient_points() {
        let cloud = PointCloud::from_positions(vec![Vector3::zeros(), Vector3::x()]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            segment_plane(&cloud, &RansacParams::default(), &mut rng).unwrap_err(),
            ProcessingError::InsufficientPoints {
                required: 3,
                available: 2
            }
        );
        assert_eq!(
            segment_plane(&PointCloud::new(), &RansacParams::default(), &mut rng).unwrap_err(),
            ProcessingError::EmptyInput
        );
    }

    #[test]
    fn test_invalid_ransac_n() {
        let cloud = setup_point_cloud();
        let mut rng = StdRng::seed_from_u64(1);
        let params = RansacParams::default().with_ransac_n(2);
        assert!(matches!(
            segment_plane(&cloud, &params, &mut rng),
            Err(ProcessingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_floor_and_rest() {
        let cloud = setup_point_cloud();
        let segmentation = PlaneSegmentation {
            plane: PlaneModel::new(0.0, 0.0, 1.0, 0.0),
            inliers: (0..1600).collect(),
        };
        let (floor, rest) = segmentation.floor_and_rest(&cloud).unwrap();
        assert_eq!(floor.len(), 1600);
        assert_eq!(rest.len(), 100);
        assert!(rest.positions().iter().all(|p| p.z == 10.0));

        let small = PointCloud::from_positions(vec![Vector3::zeros()]);
        assert!(segmentation.floor_and_rest(&small).is_err());
    }

    #[test]
    fn test_fit_plane_rejects_degenerate_samples() {
        let collinear = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(2.0, 2.0, 2.0),
        ];
        assert!(fit_plane(&collinear).is_none());
        let coincident = [Vector3::new(1.0, 2.0, 3.0); 3];
        assert!(fit_plane(&coincident).is_none());
        let coincident_many = [Vector3::new(1.0, 2.0, 3.0); 5];
        assert!(fit_plane(&coincident_many).is_none());
        let collinear_many = [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(3.0, 0.0, 0.0),
        ];
        assert!(fit_plane(&collinear_many).is_none());
    }
}
