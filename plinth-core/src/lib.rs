#![warn(clippy::all)]

//! Core data structures for floor-aligned point cloud processing
//!
//! Plinth works on a single in-memory [PointCloud](crate::containers::PointCloud): an ordered list of 3D
//! positions with optional per-point colors. All operations on a cloud produce a new cloud, so a stage of a
//! processing pipeline never mutates the output of the previous stage. The geometric primitives shared by
//! the algorithms (bounding boxes, plane models) live in the [math](crate::math) module.

pub extern crate nalgebra;

pub mod containers;
/// Mathematical primitives for working with point cloud data
pub mod math;
