use anyhow::{Context, Result};
use log::info;
use plinth_core::containers::PointCloud;
use std::path::Path;

mod reader;
pub use self::reader::*;

mod writer;
pub use self::writer::*;

mod io_factory;
pub use self::io_factory::*;

/// Reads all points in the given point cloud file. The file format is determined from the file extension of
/// `path`, see [GenericPointReader] for the supported formats
pub fn read_point_cloud<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    info!("Reading point cloud from {}...", path.display());
    let mut reader = GenericPointReader::open_file(path).with_context(|| {
        format!(
            "Could not create appropriate reader for point cloud file {}",
            path.display()
        )
    })?;
    let cloud = reader
        .read()
        .with_context(|| format!("Failed to read points from {}", path.display()))?;
    info!("Point cloud has {} points", cloud.len());
    Ok(cloud)
}

/// Writes all points in the given `cloud` into the file at `path`. The file format is determined from the file
/// extension of `path`
pub fn write_point_cloud<P: AsRef<Path>>(cloud: &PointCloud, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = GenericPointWriter::create_file(path, cloud.has_colors()).with_context(|| {
        format!(
            "Could not create appropriate writer for point cloud file {}",
            path.display()
        )
    })?;
    writer.write(cloud).context("Failed to write points")?;
    writer.flush()?;
    info!("Wrote {} points to {}", cloud.len(), path.display());
    Ok(())
}
