use std::fmt;
use std::time::Instant;

use log::{debug, info, warn};
use plinth_core::containers::PointCloud;
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::acceleration_structures::KdTree;
use crate::error::{ProcessingError, Result};

/// Strategy used to decide which points are noise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OutlierMethod {
    /// Remove points whose mean distance to their nearest neighbours is far above the global average
    Statistical,
    /// Remove points that have too few neighbours within a fixed radius
    Radius,
}

impl OutlierMethod {
    /// Looks up a method by its name (`"statistical"` or `"radius"`, case-insensitive). Unknown names fall back
    /// to `Statistical` and emit a warning
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "statistical" => OutlierMethod::Statistical,
            "radius" => OutlierMethod::Radius,
            _ => {
                warn!(
                    "Unsupported noise removal method '{}', using statistical outlier removal",
                    name
                );
                OutlierMethod::Statistical
            }
        }
    }
}

impl Default for OutlierMethod {
    fn default() -> Self {
        OutlierMethod::Statistical
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutlierMethod::Statistical => write!(f, "statistical"),
            OutlierMethod::Radius => write!(f, "radius"),
        }
    }
}

/// Parameters of [remove_noise]
///
/// The two parameters are shared by both methods: for `Radius`, `nb_neighbors` is the minimal number of
/// neighbours a point needs and `std_ratio` is the search radius.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NoiseRemovalParams {
    pub method: OutlierMethod,
    pub nb_neighbors: usize,
    pub std_ratio: f64,
}

impl Default for NoiseRemovalParams {
    fn default() -> Self {
        Self {
            method: OutlierMethod::Statistical,
            nb_neighbors: 20,
            std_ratio: 2.0,
        }
    }
}

impl NoiseRemovalParams {
    pub fn with_method(mut self, method: OutlierMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_nb_neighbors(mut self, nb_neighbors: usize) -> Self {
        self.nb_neighbors = nb_neighbors;
        self
    }

    pub fn with_std_ratio(mut self, std_ratio: f64) -> Self {
        self.std_ratio = std_ratio;
        self
    }
}

/// Result of an outlier removal: the remaining points and their indices within the input cloud
#[derive(Debug, Clone)]
pub struct OutlierRemoval {
    pub cloud: PointCloud,
    pub kept_indices: Vec<usize>,
}

impl OutlierRemoval {
    /// Number of points that were removed from a cloud with `original_count` points
    pub fn removed_count(&self, original_count: usize) -> usize {
        original_count - self.kept_indices.len()
    }
}

/// Removes noise from `cloud` using the method and parameters in `params`
///
/// # Errors
///
/// `EmptyInput` if `cloud` has no points, `InvalidParameter` if the parameters are out of range for the chosen
/// method. An empty result is *not* an error here, callers have to check for it
pub fn remove_noise(cloud: &PointCloud, params: &NoiseRemovalParams) -> Result<OutlierRemoval> {
    info!("Removing noise using the {} method...", params.method);
    let t_start = Instant::now();

    let result = match params.method {
        OutlierMethod::Statistical => {
            remove_statistical_outliers(cloud, params.nb_neighbors, params.std_ratio)?
        }
        OutlierMethod::Radius => {
            remove_radius_outliers(cloud, params.nb_neighbors, params.std_ratio)?
        }
    };

    info!(
        "Removed {} noise points, {} remaining",
        result.removed_count(cloud.len()),
        result.cloud.len()
    );
    info!("Noise removal took {:.2}s", t_start.elapsed().as_secs_f64());
    Ok(result)
}

/// Statistical outlier removal
///
/// For every point, the mean distance to its `nb_neighbors` nearest neighbours (not counting the point itself)
/// is computed. With `mean` and `std` being the mean and standard deviation of these values over the whole
/// cloud, a point is kept if its mean neighbour distance is at most `mean + std_ratio * std`. Passing
/// `f64::INFINITY` as `std_ratio` keeps every point.
///
/// # Example
/// ```
/// # use plinth_core::{containers::PointCloud, nalgebra::Vector3};
/// # use plinth_algorithms::outlier_removal::remove_statistical_outliers;
/// let mut positions = (0..100)
///     .map(|i| Vector3::new((i % 10) as f64 * 0.1, (i / 10) as f64 * 0.1, 0.0))
///     .collect::<Vec<_>>();
/// positions.push(Vector3::new(50.0, 50.0, 50.0));
/// let filtered = remove_statistical_outliers(&PointCloud::from_positions(positions), 8, 1.0).unwrap();
/// assert!(!filtered.kept_indices.contains(&100));
/// ```
pub fn remove_statistical_outliers(
    cloud: &PointCloud,
    nb_neighbors: usize,
    std_ratio: f64,
) -> Result<OutlierRemoval> {
    if nb_neighbors == 0 {
        return Err(ProcessingError::InvalidParameter(
            "nb_neighbors must be at least 1".into(),
        ));
    }
    if std_ratio.is_nan() {
        return Err(ProcessingError::InvalidParameter(
            "std_ratio must not be NaN".into(),
        ));
    }
    let tree = KdTree::build(cloud)?;
    debug!(
        "Statistical outlier removal with nb_neighbors={} std_ratio={}",
        nb_neighbors, std_ratio
    );

    let mean_distances = (0..cloud.len())
        .into_par_iter()
        .map(|index| {
            let neighbours = tree.neighbours_of(index, nb_neighbors);
            if neighbours.is_empty() {
                0.0
            } else {
                neighbours.iter().map(|n| n.distance()).sum::<f64>() / neighbours.len() as f64
            }
        })
        .collect::<Vec<_>>();

    let (mean, std_dev) = mean_and_std_dev(&mean_distances);
    let tolerance = mean.abs() * 1e-12;
    let kept_indices = if std_ratio == f64::INFINITY {
        (0..cloud.len()).collect::<Vec<_>>()
    } else {
        let allowed_deviation = if std_dev == 0.0 {
            0.0
        } else {
            std_ratio * std_dev
        };
        mean_distances
            .iter()
            .enumerate()
            .filter(|&(_, &distance)| distance - mean <= allowed_deviation + tolerance)
            .map(|(index, _)| index)
            .collect::<Vec<_>>()
    };

    gather(cloud, kept_indices)
}

/// Radius outlier removal
///
/// A point is kept if at least `nb_points` *other* points lie within `radius` of it. With `radius == 0` only
/// points that have an exact duplicate survive.
pub fn remove_radius_outliers(
    cloud: &PointCloud,
    nb_points: usize,
    radius: f64,
) -> Result<OutlierRemoval> {
    if !(radius >= 0.0) {
        return Err(ProcessingError::InvalidParameter(format!(
            "radius must be >= 0, got {}",
            radius
        )));
    }
    let tree = KdTree::build(cloud)?;
    debug!(
        "Radius outlier removal with nb_points={} radius={}",
        nb_points, radius
    );

    let keep_mask = (0..cloud.len())
        .into_par_iter()
        .map(|index| {
            tree.neighbours_within_radius_of(index, radius)
                .map(|neighbours| neighbours.len() >= nb_points)
        })
        .collect::<Result<Vec<_>>>()?;

    let kept_indices = keep_mask
        .iter()
        .enumerate()
        .filter(|(_, keep)| **keep)
        .map(|(index, _)| index)
        .collect::<Vec<_>>();

    gather(cloud, kept_indices)
}

fn gather(cloud: &PointCloud, kept_indices: Vec<usize>) -> Result<OutlierRemoval> {
    let filtered = cloud
        .select_by_index(&kept_indices)
        .map_err(|e| ProcessingError::InvalidParameter(e.to_string()))?;
    Ok(OutlierRemoval {
        cloud: filtered,
        kept_indices,
    })
}

/// Mean and sample standard deviation. A single value has a standard deviation of zero
fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let squared_sum = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    (mean, (squared_sum / (count - 1.0)).sqrt())
}
