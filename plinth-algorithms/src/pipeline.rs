//! The complete processing chain: noise removal, floor segmentation, orientation correction and analysis
use std::fmt;
use std::time::Instant;

use log::{info, warn};
use plinth_core::{
    containers::PointCloud,
    math::PlaneModel,
    nalgebra::{Rotation3, Vector3},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{analyze_point_cloud, AnalysisParams, AnalysisReport},
    error::ProcessingError,
    orientation::correct_orientation,
    outlier_removal::{remove_noise, NoiseRemovalParams},
    segmentation::{segment_plane, segment_plane_par, RansacParams},
};

/// Color of the floor points in [ProcessingOutput::floor]
pub fn floor_color() -> Vector3<f64> {
    Vector3::new(1.0, 0.0, 0.0)
}

/// Color of the remaining points in [ProcessingOutput::rest]
pub fn rest_color() -> Vector3<f64> {
    Vector3::new(0.5, 0.5, 0.5)
}

/// Parameters of all pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProcessingParams {
    pub noise: NoiseRemovalParams,
    pub ransac: RansacParams,
    pub analysis: AnalysisParams,
    /// Seed for the plane segmentation. With `None`, the serial segmentation runs on the thread-local RNG and
    /// results vary between runs
    pub seed: Option<u64>,
}

impl ProcessingParams {
    pub fn with_noise(mut self, noise: NoiseRemovalParams) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_ransac(mut self, ransac: RansacParams) -> Self {
        self.ransac = ransac;
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisParams) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Pipeline stages, used to label errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NoiseRemoval,
    PlaneSegmentation,
    OrientationCorrection,
    Analysis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::NoiseRemoval => "noise removal",
            Stage::PlaneSegmentation => "plane segmentation",
            Stage::OrientationCorrection => "orientation correction",
            Stage::Analysis => "analysis",
        };
        f.write_str(name)
    }
}

/// A failed pipeline stage and the reason it failed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub source: ProcessingError,
}

impl PipelineError {
    fn at(stage: Stage) -> impl FnOnce(ProcessingError) -> Self {
        move |source| Self { stage, source }
    }
}

/// Everything the pipeline produces
#[derive(Debug, Clone)]
pub struct ProcessingOutput {
    /// The input cloud without noise
    pub filtered: PointCloud,
    /// Inliers of the floor plane, painted red
    pub floor: PointCloud,
    /// All filtered points that are not part of the floor, painted grey
    pub rest: PointCloud,
    /// The filtered cloud, rotated and translated so that the floor is the plane `z = 0`
    pub corrected: PointCloud,
    pub plane: PlaneModel,
    pub rotation: Rotation3<f64>,
    /// Mean z coordinate of the floor points before the rotation
    pub floor_zmean: f64,
    /// Analysis of the corrected cloud
    pub report: AnalysisReport,
}

/// Runs all stages on `cloud`
///
/// Any stage failure stops the pipeline, and the returned error names the stage. A noise removal that removes
/// every point fails with `EmptyInput` in the noise removal stage.
pub fn process_point_cloud(
    cloud: &PointCloud,
    params: &ProcessingParams,
) -> Result<ProcessingOutput, PipelineError> {
    info!("Processing {} points", cloud.len());
    let t_start = Instant::now();

    let filtered = remove_noise(cloud, &params.noise)
        .map_err(PipelineError::at(Stage::NoiseRemoval))?
        .cloud;
    if filtered.is_empty() {
        return Err(PipelineError::at(Stage::NoiseRemoval)(
            ProcessingError::EmptyInput,
        ));
    }

    let segmentation = match params.seed {
        Some(seed) => segment_plane_par(&filtered, &params.ransac, seed),
        None => segment_plane(&filtered, &params.ransac, &mut rand::thread_rng()),
    }
    .map_err(PipelineError::at(Stage::PlaneSegmentation))?;
    let (floor, rest) = segmentation
        .floor_and_rest(&filtered)
        .map_err(PipelineError::at(Stage::PlaneSegmentation))?;
    if rest.is_empty() {
        warn!("All points belong to the floor plane");
    }

    let correction = correct_orientation(&filtered, &floor, &segmentation.plane)
        .map_err(PipelineError::at(Stage::OrientationCorrection))?;
    info!("Floor zmean before rotation: {}", correction.floor_zmean);

    let report = analyze_point_cloud(&correction.cloud, &params.analysis)
        .map_err(PipelineError::at(Stage::Analysis))?;

    info!(
        "Processing took {:.2}s in total",
        t_start.elapsed().as_secs_f64()
    );
    Ok(ProcessingOutput {
        filtered,
        floor: floor.painted(floor_color()),
        rest: rest.painted(rest_color()),
        corrected: correction.cloud,
        plane: segmentation.plane,
        rotation: correction.rotation,
        floor_zmean: correction.floor_zmean,
        report,
    })
}
