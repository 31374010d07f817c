use std::path::PathBuf;

use anyhow::Result;
use plinth_core::{containers::PointCloud, nalgebra::Vector3};
use plinth_io::base::{read_point_cloud, write_point_cloud, GenericPointReader};
use scopeguard::defer;

fn temp_path(file_name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("{}_{}", std::process::id(), file_name))
}

fn test_cloud(with_colors: bool) -> Result<PointCloud> {
    let positions = (0..50)
        .map(|i| Vector3::new(i as f64 * 0.5, -(i as f64) * 0.25, (i % 7) as f64))
        .collect::<Vec<_>>();
    if with_colors {
        let colors = (0..50)
            .map(|i| match i % 3 {
                0 => Vector3::new(1.0, 0.0, 0.0),
                1 => Vector3::new(0.0, 1.0, 0.0),
                _ => Vector3::new(0.0, 0.0, 1.0),
            })
            .collect();
        PointCloud::from_positions_and_colors(positions, colors)
    } else {
        Ok(PointCloud::from_positions(positions))
    }
}

#[test]
fn test_round_trip_all_formats() -> Result<()> {
    for file_name in &["cloud.xyz", "cloud.txt", "cloud.pts", "cloud.ply"] {
        for with_colors in [false, true].iter().copied() {
            let path = temp_path(file_name);
            defer! {
                std::fs::remove_file(&path).expect("Could not remove test file");
            }
            let cloud = test_cloud(with_colors)?;
            write_point_cloud(&cloud, &path)?;
            let read_back = read_point_cloud(&path)?;
            assert_eq!(read_back, cloud, "{} with colors: {}", file_name, with_colors);
        }
    }
    Ok(())
}

#[test]
fn test_unsupported_extension() -> Result<()> {
    let cloud = test_cloud(false)?;
    assert!(write_point_cloud(&cloud, temp_path("cloud.las")).is_err());
    assert!(read_point_cloud(temp_path("cloud.las")).is_err());
    assert!(!GenericPointReader::is_supported_file("cloud.las")?);
    assert!(GenericPointReader::is_supported_file("CLOUD.PLY")?);
    Ok(())
}

#[test]
fn test_missing_file() {
    let error = read_point_cloud(temp_path("does_not_exist.ply")).unwrap_err();
    assert!(error
        .to_string()
        .starts_with("Could not create appropriate reader"));
}
