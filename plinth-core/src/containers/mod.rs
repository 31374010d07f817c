//! In-memory point cloud storage

mod point_cloud;
pub use self::point_cloud::*;
