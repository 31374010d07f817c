use std::time::Instant;

use log::{debug, info};
use plinth_core::{
    containers::PointCloud,
    math::PlaneModel,
    nalgebra::{Matrix3, Rotation3, Vector3},
};

use crate::error::{ProcessingError, Result};

/// Vectors whose cross product is shorter than this are treated as parallel
const PARALLEL_EPSILON: f64 = 1e-9;

/// Points closer to the floor plane than this count as lying on it when deciding which side is up
const SIDE_EPSILON: f64 = 1e-9;

/// Direction the floor normal is rotated onto
pub fn floor_normal_target() -> Vector3<f64> {
    Vector3::new(0.0, 0.0, -1.0)
}

/// Result of [correct_orientation]
#[derive(Debug, Clone)]
pub struct OrientationCorrection {
    /// The rotated and translated cloud, with the floor at `z = 0`
    pub cloud: PointCloud,
    /// Rotation that was applied around the origin, before the translation
    pub rotation: Rotation3<f64>,
    /// Mean z coordinate of the floor points before the rotation
    pub floor_zmean: f64,
    /// Mean z coordinate of the floor points after the rotation. The cloud was translated by the negative of this
    pub floor_zmean_rotated: f64,
}

/// Computes the rotation that turns the direction of `from` into the direction of `to`
///
/// Uses Rodrigues' formula. Equal directions give the identity, opposite directions a rotation by 180° around an
/// axis perpendicular to `from`. Returns `None` if either vector has (nearly) zero length.
///
/// ```
/// # use plinth_core::nalgebra::Vector3;
/// # use plinth_algorithms::orientation::rotation_between;
/// let rotation = rotation_between(&Vector3::x(), &Vector3::y()).unwrap();
/// assert!((rotation * Vector3::x() - Vector3::y()).norm() < 1e-12);
/// ```
pub fn rotation_between(from: &Vector3<f64>, to: &Vector3<f64>) -> Option<Rotation3<f64>> {
    let a = from.try_normalize(PARALLEL_EPSILON)?;
    let b = to.try_normalize(PARALLEL_EPSILON)?;

    let cos_angle = a.dot(&b);
    let axis = a.cross(&b);
    let sin_angle = axis.norm();

    if sin_angle < PARALLEL_EPSILON {
        if cos_angle > 0.0 {
            return Some(Rotation3::identity());
        }
        // Half turn: R = 2 * u * u^T - I for any unit u perpendicular to a
        let u = any_perpendicular(&a);
        let matrix = 2.0 * u * u.transpose() - Matrix3::identity();
        return Some(Rotation3::from_matrix_unchecked(matrix));
    }

    let k = axis.cross_matrix();
    let matrix =
        Matrix3::identity() + k + k * k * ((1.0 - cos_angle) / (sin_angle * sin_angle));
    Some(Rotation3::from_matrix_unchecked(matrix))
}

/// A unit vector perpendicular to the unit vector `v`
fn any_perpendicular(v: &Vector3<f64>) -> Vector3<f64> {
    let abs = v.abs();
    let least_aligned_axis = if abs.x <= abs.y && abs.x <= abs.z {
        Vector3::x()
    } else if abs.y <= abs.z {
        Vector3::y()
    } else {
        Vector3::z()
    };
    v.cross(&least_aligned_axis).normalize()
}

/// Mean z coordinate of all points in `cloud`. Fails with `EmptyInput` if the cloud has no points
pub fn calculate_zmean(cloud: &PointCloud) -> Result<f64> {
    let mean = cloud.mean_position().ok_or(ProcessingError::EmptyInput)?;
    Ok(mean.z)
}

/// Chooses the sign of the unit `normal` of `plane` so that the majority of `cloud` lies on the side the normal
/// points away from. If there is no majority, the normal is flipped into the hemisphere of the target direction
fn orient_normal(normal: Vector3<f64>, plane: &PlaneModel, cloud: &PointCloud) -> Vector3<f64> {
    let (above, below) = cloud
        .positions()
        .iter()
        .map(|p| plane.signed_distance(p))
        .fold((0usize, 0usize), |(above, below), distance| {
            if distance > SIDE_EPSILON {
                (above + 1, below)
            } else if distance < -SIDE_EPSILON {
                (above, below + 1)
            } else {
                (above, below)
            }
        });
    debug!(
        "{} points in front of the floor plane, {} behind it",
        above, below
    );
    let flip = if above != below {
        above > below
    } else {
        normal.dot(&floor_normal_target()) < 0.0
    };
    if flip {
        -normal
    } else {
        normal
    }
}

/// Rotates and translates `cloud` so that the floor described by `plane` becomes the plane `z = 0`
///
/// The floor normal is rotated onto `(0, 0, -1)` around the origin, with its sign chosen so that the bulk of the
/// cloud ends up above the floor. The same rotation is applied to the `floor` points, and the whole cloud is then
/// moved along z so that the mean height of the rotated floor points is zero.
///
/// # Errors
///
/// `DegenerateGeometry` if the normal of `plane` has (nearly) zero length, `EmptyInput` if `cloud` or `floor`
/// has no points
pub fn correct_orientation(
    cloud: &PointCloud,
    floor: &PointCloud,
    plane: &PlaneModel,
) -> Result<OrientationCorrection> {
    info!("Rotating the point cloud so that the floor is horizontal...");
    let t_start = Instant::now();

    let normal = plane.unit_normal().ok_or_else(|| {
        ProcessingError::DegenerateGeometry(format!(
            "plane normal of {} has zero length",
            plane
        ))
    })?;
    if cloud.is_empty() {
        return Err(ProcessingError::EmptyInput);
    }
    let floor_zmean = calculate_zmean(floor)?;

    let normal = orient_normal(normal, plane, cloud);
    let rotation = rotation_between(&normal, &floor_normal_target()).ok_or_else(|| {
        ProcessingError::DegenerateGeometry("could not rotate the floor normal".into())
    })?;
    debug!("Rotation matrix: {}", rotation.matrix());

    let rotated = cloud.rotated(&rotation);
    let floor_zmean_rotated = calculate_zmean(&floor.rotated(&rotation))?;
    let corrected = rotated.translated(&Vector3::new(0.0, 0.0, -floor_zmean_rotated));

    info!("Floor zmean after rotation: {}", floor_zmean_rotated);
    info!(
        "Orientation correction took {:.2}s",
        t_start.elapsed().as_secs_f64()
    );
    Ok(OrientationCorrection {
        cloud: corrected,
        rotation,
        floor_zmean,
        floor_zmean_rotated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn assert_vec_approx_eq(a: &Vector3<f64>, b: &Vector3<f64>) {
        assert!((a - b).norm() < 1e-9, "{} != {}", a, b);
    }

    fn assert_is_rotation(rotation: &Rotation3<f64>) {
        let m = rotation.matrix();
        assert!((m * m.transpose() - Matrix3::identity()).norm() < 1e-12);
        assert_approx_eq!(m.determinant(), 1.0);
    }

    #[test]
    fn test_rotation_between_generic() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let from = Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let to = Vector3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let rotation = rotation_between(&from, &to).unwrap();
            assert_is_rotation(&rotation);
            assert_vec_approx_eq(&(rotation * from.normalize()), &to.normalize());
        }
    }

    #[test]
    fn test_rotation_between_parallel_is_identity() {
        let rotation = rotation_between(&Vector3::new(0.0, 0.0, -3.0), &Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_eq!(rotation, Rotation3::identity());
    }

    #[test]
    fn test_rotation_between_anti_parallel() {
        for from in &[
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.3, -0.4, 0.5),
        ] {
            let to = -from;
            let rotation = rotation_between(from, &to).unwrap();
            assert_is_rotation(&rotation);
            assert_vec_approx_eq(&(rotation * from), &to);
        }
    }

    #[test]
    fn test_rotation_between_zero_vector() {
        assert!(rotation_between(&Vector3::zeros(), &Vector3::z()).is_none());
        assert!(rotation_between(&Vector3::z(), &Vector3::zeros()).is_none());
    }

    #[test]
    fn test_rotation_round_trip() {
        let mut rng = StdRng::seed_from_u64(8);
        let cloud: PointCloud = (0..200)
            .map(|_| {
                Vector3::new(
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                )
            })
            .collect();
        let rotation = rotation_between(&Vector3::new(0.2, 0.9, -0.4), &Vector3::z()).unwrap();
        let round_trip = cloud.rotated(&rotation).rotated(&rotation.inverse());
        for (original, restored) in cloud.positions().iter().zip(round_trip.positions()) {
            assert!((original - restored).norm() <= 1e-9 * original.norm().max(1.0));
        }
    }

    /// A floor at height `height` plus a box of points above it
    fn room(height: f64) -> (PointCloud, PointCloud) {
        let floor = (0..100)
            .map(|i| Vector3::new((i % 10) as f64 * 0.1, (i / 10) as f64 * 0.1, height))
            .collect::<Vec<_>>();
        let furniture = (0..20)
            .map(|i| Vector3::new(0.5, 0.5, height + 0.1 * (i + 1) as f64))
            .collect::<Vec<_>>();
        let floor_cloud = PointCloud::from_positions(floor.clone());
        let full = PointCloud::from_positions(floor.into_iter().chain(furniture).collect());
        (full, floor_cloud)
    }

    #[test]
    fn test_horizontal_floor_is_identity() {
        let (cloud, floor) = room(0.0);
        for plane in &[
            PlaneModel::new(0.0, 0.0, 1.0, 0.0),
            PlaneModel::new(0.0, 0.0, -1.0, 0.0),
        ] {
            let correction = correct_orientation(&cloud, &floor, plane).unwrap();
            assert_eq!(correction.rotation, Rotation3::identity());
            assert_approx_eq!(correction.floor_zmean, correction.floor_zmean_rotated);
            assert_eq!(correction.cloud, cloud);
        }
    }

    #[test]
    fn test_raised_floor_is_moved_to_zero() {
        let (cloud, floor) = room(2.5);
        let correction =
            correct_orientation(&cloud, &floor, &PlaneModel::new(0.0, 0.0, 2.0, -5.0)).unwrap();
        assert_approx_eq!(correction.floor_zmean, 2.5);
        assert_approx_eq!(correction.floor_zmean_rotated, 2.5);
        for p in correction.cloud.positions().iter().take(100) {
            assert_approx_eq!(p.z, 0.0);
        }
        assert!(correction.cloud.positions().iter().all(|p| p.z > -1e-9));
    }

    #[test]
    fn test_wall_as_floor_is_rotated_by_90_degrees() {
        // points on the plane x = 0, furniture in front of it at x > 0
        let wall = (0..100)
            .map(|i| Vector3::new(0.0, (i % 10) as f64 * 0.1, (i / 10) as f64 * 0.1 + 1.0))
            .collect::<Vec<_>>();
        let in_front = (1..=10)
            .map(|i| Vector3::new(0.1 * i as f64, 0.5, 1.5))
            .collect::<Vec<_>>();
        let floor = PointCloud::from_positions(wall.clone());
        let cloud = PointCloud::from_positions(wall.into_iter().chain(in_front).collect());

        let correction =
            correct_orientation(&cloud, &floor, &PlaneModel::new(1.0, 0.0, 0.0, 0.0)).unwrap();
        assert_approx_eq!(correction.rotation.angle(), std::f64::consts::FRAC_PI_2);
        assert_approx_eq!(correction.floor_zmean, 1.45);
        for p in correction.cloud.positions().iter().take(100) {
            assert!(p.z.abs() < 1e-9);
        }
        for (i, p) in correction.cloud.positions().iter().skip(100).enumerate() {
            assert_approx_eq!(p.z, 0.1 * (i + 1) as f64);
        }
    }

    #[test]
    fn test_floor_above_the_scene_is_flipped() {
        // a ceiling-like plane with everything below it
        let (cloud, floor) = room(0.0);
        let half_turn = rotation_between(&Vector3::z(), &-Vector3::z()).unwrap();
        let flipped = cloud.rotated(&half_turn);
        let flipped_floor = floor.rotated(&half_turn);
        let correction = correct_orientation(
            &flipped,
            &flipped_floor,
            &PlaneModel::new(0.0, 0.0, 1.0, 0.0),
        )
        .unwrap();
        assert!(correction.cloud.positions().iter().all(|p| p.z > -1e-9));
        assert_approx_eq!(correction.rotation.angle(), std::f64::consts::PI);
    }

    #[test]
    fn test_degenerate_plane() {
        let (cloud, floor) = room(0.0);
        assert!(matches!(
            correct_orientation(&cloud, &floor, &PlaneModel::new(0.0, 0.0, 0.0, 1.0)),
            Err(ProcessingError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_empty_floor() {
        let (cloud, _) = room(0.0);
        assert_eq!(
            correct_orientation(&cloud, &PointCloud::new(), &PlaneModel::new(0.0, 0.0, 1.0, 0.0))
                .unwrap_err(),
            ProcessingError::EmptyInput
        );
        assert_eq!(
            calculate_zmean(&PointCloud::new()).unwrap_err(),
            ProcessingError::EmptyInput
        );
    }
}
