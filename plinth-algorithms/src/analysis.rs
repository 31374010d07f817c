use std::fmt;
use std::time::Instant;

use log::{debug, info};
use plinth_core::{containers::PointCloud, nalgebra::Vector3};
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::acceleration_structures::KdTree;
use crate::error::{ProcessingError, Result};

/// Parameters of [analyze_point_cloud]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisParams {
    /// Number of points, taken from the start of the cloud, whose neighbour distances are averaged
    pub sample_size: usize,
    /// Number of nearest neighbours per sampled point
    pub num_neighbours: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            sample_size: 1000,
            num_neighbours: 10,
        }
    }
}

impl AnalysisParams {
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_num_neighbours(mut self, num_neighbours: usize) -> Self {
        self.num_neighbours = num_neighbours;
        self
    }
}

/// Summary statistics of a point cloud
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisReport {
    pub num_points: usize,
    /// Extent of the bounding box along x, y and z
    pub dimensions: Vector3<f64>,
    /// Average distance of the sampled points to their nearest neighbours
    pub avg_point_distance: f64,
    /// Points per cubic unit of the bounding box, 0 if the box has no volume
    pub point_density: f64,
    pub min_bound: Vector3<f64>,
    pub max_bound: Vector3<f64>,
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of points: {}", self.num_points)?;
        writeln!(
            f,
            "Dimensions (x, y, z): {:.3} x {:.3} x {:.3}",
            self.dimensions.x, self.dimensions.y, self.dimensions.z
        )?;
        writeln!(f, "Average point distance: {:.5}", self.avg_point_distance)?;
        writeln!(f, "Point density: {:.2} points per cubic unit", self.point_density)?;
        writeln!(
            f,
            "Min bound: [{:.3}, {:.3}, {:.3}]",
            self.min_bound.x, self.min_bound.y, self.min_bound.z
        )?;
        write!(
            f,
            "Max bound: [{:.3}, {:.3}, {:.3}]",
            self.max_bound.x, self.max_bound.y, self.max_bound.z
        )
    }
}

/// Computes point count, bounding box, point spacing and density of `cloud`
///
/// The spacing is estimated from the first `params.sample_size` points only (or all points, if there are fewer):
/// for each of them the mean distance to its `params.num_neighbours` nearest neighbours is computed, and these
/// means are averaged. Sampled points without any neighbour are ignored; if no sampled point has a neighbour the
/// spacing is 0. The bounding box always covers the whole cloud.
///
/// # Errors
///
/// `EmptyInput` if `cloud` has no points, `InvalidParameter` if `params.sample_size` or `params.num_neighbours`
/// is zero
pub fn analyze_point_cloud(cloud: &PointCloud, params: &AnalysisParams) -> Result<AnalysisReport> {
    if params.sample_size == 0 || params.num_neighbours == 0 {
        return Err(ProcessingError::InvalidParameter(format!(
            "sample size and number of neighbours must be positive, got {:?}",
            params
        )));
    }
    let bounds = cloud.bounds().ok_or(ProcessingError::EmptyInput)?;
    info!("Analyzing the point cloud...");
    let t_start = Instant::now();

    let tree = KdTree::build(cloud)?;
    let sample_size = params.sample_size.min(cloud.len());
    debug!(
        "Sampling {} points with {} neighbours each",
        sample_size, params.num_neighbours
    );

    let sample_means = (0..sample_size)
        .into_par_iter()
        .filter_map(|index| {
            let neighbours = tree.neighbours_of(index, params.num_neighbours);
            if neighbours.is_empty() {
                return None;
            }
            let sum: f64 = neighbours.iter().map(|n| n.distance()).sum();
            Some(sum / neighbours.len() as f64)
        })
        .collect::<Vec<_>>();
    let avg_point_distance = if sample_means.is_empty() {
        0.0
    } else {
        sample_means.iter().sum::<f64>() / sample_means.len() as f64
    };

    let volume = bounds.volume();
    let point_density = if volume > 0.0 {
        cloud.len() as f64 / volume
    } else {
        0.0
    };

    let report = AnalysisReport {
        num_points: cloud.len(),
        dimensions: bounds.extent(),
        avg_point_distance,
        point_density,
        min_bound: bounds.min().coords,
        max_bound: bounds.max().coords,
    };
    info!("Analysis took {:.2}s", t_start.elapsed().as_secs_f64());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn grid(nx: usize, ny: usize, nz: usize, spacing: f64) -> PointCloud {
        let mut positions = vec![];
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    positions.push(Vector3::new(x as f64, y as f64, z as f64) * spacing);
                }
            }
        }
        PointCloud::from_positions(positions)
    }

    #[test]
    fn test_analyze_cube_grid() {
        let cloud = grid(5, 5, 5, 1.0);
        let params = AnalysisParams::default().with_num_neighbours(1);
        let report = analyze_point_cloud(&cloud, &params).unwrap();

        assert_eq!(report.num_points, 125);
        assert_eq!(report.dimensions, Vector3::new(4.0, 4.0, 4.0));
        assert_approx_eq!(report.avg_point_distance, 1.0);
        assert_approx_eq!(report.point_density, 125.0 / 64.0);
        assert_eq!(report.min_bound, Vector3::zeros());
        assert_eq!(report.max_bound, Vector3::new(4.0, 4.0, 4.0));
    }

    #[test]
    fn test_analyze_planar_cloud_has_zero_density() {
        let cloud = grid(10, 10, 1, 0.25);
        let report = analyze_point_cloud(&cloud, &AnalysisParams::default().with_num_neighbours(1))
            .unwrap();
        assert_approx_eq!(report.avg_point_distance, 0.25);
        assert_eq!(report.point_density, 0.0);
        assert_approx_eq!(report.dimensions.x, 2.25);
        assert_eq!(report.dimensions.z, 0.0);
    }

    #[test]
    fn test_analyze_default_neighbourhood() {
        // every point of a regular grid has its 4 direct neighbours at distance 1 in the interior
        let cloud = grid(20, 20, 1, 1.0);
        let report = analyze_point_cloud(&cloud, &AnalysisParams::default()).unwrap();
        assert!(report.avg_point_distance > 1.0);
        assert!(report.avg_point_distance < 2.0);
    }

    #[test]
    fn test_analyze_uses_only_the_sample() {
        // 10 points with spacing 1 at the start, then a sparse cluster far away
        let mut positions = (0..10)
            .map(|i| Vector3::new(i as f64, 0.0, 0.0))
            .collect::<Vec<_>>();
        positions.extend((0..10).map(|i| Vector3::new(100.0 + 7.0 * i as f64, 50.0, 50.0)));
        let cloud = PointCloud::from_positions(positions);

        let sampled = analyze_point_cloud(
            &cloud,
            &AnalysisParams::default()
                .with_sample_size(10)
                .with_num_neighbours(1),
        )
        .unwrap();
        assert_approx_eq!(sampled.avg_point_distance, 1.0);

        let everything = analyze_point_cloud(
            &cloud,
            &AnalysisParams::default().with_num_neighbours(1),
        )
        .unwrap();
        assert_approx_eq!(everything.avg_point_distance, 4.0);
        assert_eq!(everything.max_bound, Vector3::new(163.0, 50.0, 50.0));
    }

    #[test]
    fn test_analyze_single_point() {
        let cloud = PointCloud::from_positions(vec![Vector3::new(1.0, 2.0, 3.0)]);
        let report = analyze_point_cloud(&cloud, &AnalysisParams::default()).unwrap();
        assert_eq!(report.num_points, 1);
        assert_eq!(report.avg_point_distance, 0.0);
        assert_eq!(report.point_density, 0.0);
        assert_eq!(report.dimensions, Vector3::zeros());
        assert_eq!(report.min_bound, report.max_bound);
    }

    #[test]
    fn test_analyze_invalid_input() {
        assert_eq!(
            analyze_point_cloud(&PointCloud::new(), &AnalysisParams::default()).unwrap_err(),
            ProcessingError::EmptyInput
        );
        let cloud = grid(2, 2, 2, 1.0);
        assert!(matches!(
            analyze_point_cloud(&cloud, &AnalysisParams::default().with_num_neighbours(0)),
            Err(ProcessingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_report_display() {
        let report = analyze_point_cloud(
            &grid(2, 2, 2, 1.0),
            &AnalysisParams::default().with_num_neighbours(1),
        )
        .unwrap();
        let text = report.to_string();
        assert!(text.contains("Number of points: 8"));
        assert!(text.contains("Dimensions (x, y, z): 1.000 x 1.000 x 1.000"));
        assert!(text.ends_with("Max bound: [1.000, 1.000, 1.000]"));
        assert!(text.contains("Average point distance: 1.00000"));
        assert!(text.contains("Point density: 8.00"));
    }
}
