use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use plinth_core::{containers::PointCloud, nalgebra::Vector3};

use crate::base::PointWriter;

/// `PointWriter` implementation for ASCII PLY files. Positions are written as `double`, colors (if the cloud has
/// any) as `uchar`. A PLY file holds a single point cloud, so each `PlyWriter` accepts only one call to `write`
pub struct PlyWriter<W: Write> {
    writer: W,
    has_written: bool,
}

impl<W: Write> PlyWriter<W> {
    pub fn from_write(write: W) -> Self {
        Self {
            writer: write,
            has_written: false,
        }
    }

    fn write_header(&mut self, cloud: &PointCloud) -> Result<()> {
        writeln!(self.writer, "ply")?;
        writeln!(self.writer, "format ascii 1.0")?;
        writeln!(self.writer, "comment generated by plinth")?;
        writeln!(self.writer, "element vertex {}", cloud.len())?;
        for name in &["x", "y", "z"] {
            writeln!(self.writer, "property double {}", name)?;
        }
        if cloud.has_colors() {
            for name in &["red", "green", "blue"] {
                writeln!(self.writer, "property uchar {}", name)?;
            }
        }
        writeln!(self.writer, "end_header")?;
        Ok(())
    }
}

impl PlyWriter<BufWriter<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Ok(Self::from_write(file))
    }
}

/// Converts a color channel in `[0, 1]` to 8 bit, clamping values outside of the range
fn to_u8_channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn to_u8_color(color: &Vector3<f64>) -> [u8; 3] {
    [
        to_u8_channel(color.x),
        to_u8_channel(color.y),
        to_u8_channel(color.z),
    ]
}

impl<W: Write> PointWriter for PlyWriter<W> {
    fn write(&mut self, cloud: &PointCloud) -> Result<()> {
        if self.has_written {
            bail!("A PLY file can only hold a single point cloud");
        }
        self.has_written = true;
        self.write_header(cloud)?;

        match cloud.colors() {
            Some(colors) => {
                for (position, color) in cloud.positions().iter().zip(colors) {
                    let [r, g, b] = to_u8_color(color);
                    writeln!(
                        self.writer,
                        "{} {} {} {} {} {}",
                        position.x, position.y, position.z, r, g, b
                    )?;
                }
            }
            None => {
                for position in cloud.positions() {
                    writeln!(self.writer, "{} {} {}", position.x, position.y, position.z)?;
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Flush failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ascii::{test_data_colors, test_data_positions};
    use crate::base::PointReader;
    use crate::ply::PlyReader;
    use scopeguard::defer;

    #[test]
    fn test_write_read() -> Result<()> {
        let positions = vec![
            Vector3::new(0.1, -2.25, 1e-7),
            Vector3::new(123456.789, 0.0, -0.3),
        ];
        let cloud = PointCloud::from_positions(positions.clone());
        let mut buffer = Vec::<u8>::new();
        {
            let mut writer = PlyWriter::from_write(&mut buffer);
            writer.write(&cloud)?;
            writer.flush()?;
        }
        let read_back = PlyReader::from_read(buffer.as_slice())?.read()?;
        assert_eq!(read_back.positions(), positions.as_slice());
        assert!(!read_back.has_colors());
        Ok(())
    }

    #[test]
    fn test_write_read_file_with_colors() -> Result<()> {
        let cloud = PointCloud::from_positions_and_colors(test_data_positions(), test_data_colors())?;
        let out_path = "./test_ply_writer.ply";
        defer! {
            std::fs::remove_file(out_path).expect("Could not remove test file");
        }
        let mut writer = PlyWriter::from_path(out_path)?;
        writer.write(&cloud)?;
        writer.flush()?;
        assert!(writer.write(&cloud).is_err());

        let read_back = PlyReader::from_path(out_path)?.read()?;
        assert_eq!(read_back.positions(), cloud.positions());
        let expected_colors = test_data_colors()
            .iter()
            .map(|c| to_u8_color(c))
            .collect::<Vec<_>>();
        let read_colors = read_back
            .colors()
            .unwrap()
            .iter()
            .map(|c| to_u8_color(c))
            .collect::<Vec<_>>();
        assert_eq!(read_colors, expected_colors);
        Ok(())
    }

    #[test]
    fn test_to_u8_channel() {
        assert_eq!(to_u8_channel(0.0), 0);
        assert_eq!(to_u8_channel(0.5), 128);
        assert_eq!(to_u8_channel(1.0), 255);
        assert_eq!(to_u8_channel(1.7), 255);
        assert_eq!(to_u8_channel(-0.2), 0);
    }
}
