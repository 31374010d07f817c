#![warn(clippy::all)]
//! Algorithms that operate on point clouds.
//!
//! Plinth removes noise from a point cloud, finds its floor and rotates the cloud so that the floor becomes
//! the plane `z = 0`. Each step is available on its own, [pipeline] chains them together.

// Spatial index for nearest neighbour and radius queries.
pub mod acceleration_structures;
// Point spacing, bounding box and density of a point cloud.
pub mod analysis;
pub mod error;
// Rotation of the floor normal onto the negative z axis and the matching translation.
pub mod orientation;
// Statistical and radius based noise removal.
pub mod outlier_removal;
pub mod pipeline;
// Ransac plane segmentation in serial and parallel that can be used to get the best plane-model and the
// corresponding inlier indices.
pub mod segmentation;

pub use error::{ProcessingError, Result};
