use anyhow::Result;
use plinth_core::containers::PointCloud;

/// Base trait for all types that support reading point data
pub trait PointReader {
    /// Reads all remaining points from this `PointReader` into a new `PointCloud`
    fn read(&mut self) -> Result<PointCloud>;
}
