use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter},
    path::Path,
};

use anyhow::{anyhow, bail, Context, Result};
use plinth_core::containers::PointCloud;

use crate::{
    ascii::{AsciiReader, AsciiWriter},
    ply::{PlyReader, PlyWriter},
};

use super::{PointReader, PointWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SupportedFileExtensions {
    Xyz,
    Pts,
    Ply,
}

/// Returns a lookup value for the file extension of the given file path
fn get_extension_lookup(path: &Path) -> Result<Option<SupportedFileExtensions>> {
    let extension = match path.extension() {
        Some(ex) => ex,
        None => return Ok(None),
    };
    let extension_str = extension.to_str().ok_or_else(|| {
        anyhow!(
            "File extension of path {} is no valid Unicode string",
            path.display()
        )
    })?;
    match extension_str.to_lowercase().as_str() {
        "xyz" | "txt" => Ok(Some(SupportedFileExtensions::Xyz)),
        "pts" => Ok(Some(SupportedFileExtensions::Pts)),
        "ply" => Ok(Some(SupportedFileExtensions::Ply)),
        _ => Ok(None),
    }
}

/// Column layout of an ASCII point file, guessed from its first lines
#[derive(Debug, Clone, PartialEq)]
struct AsciiLayout {
    format: &'static str,
    delimiter: &'static str,
    header_lines: usize,
    color_range: f64,
}

/// Guesses the column layout of an ASCII point file. Lines with 3 to 5 values are read as positions, lines with
/// 6 or more values as positions followed by colors. A leading line with a single value (the point count of a
/// `.pts` file) is skipped, as are blank and `#` comment lines. `.pts` files store the intensity between position and color, and colors in `[0, 255]`
fn detect_ascii_layout<R: BufRead>(read: R, extension: SupportedFileExtensions) -> Result<AsciiLayout> {
    let mut header_lines = 0;
    for line in read.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            header_lines += 1;
            continue;
        }
        let delimiter = if line.contains(',') { "," } else { " " };
        let num_columns = if delimiter == "," {
            line.split(',').count()
        } else {
            line.split_whitespace().count()
        };
        let (format, color_range) = match (num_columns, extension) {
            (1, _) => {
                header_lines += 1;
                continue;
            }
            (3..=5, _) => ("xyz", 1.0),
            (6, SupportedFileExtensions::Pts) => ("xyzRGB", 255.0),
            (_, SupportedFileExtensions::Pts) if num_columns >= 7 => ("xyzsRGB", 255.0),
            (_, _) if num_columns >= 6 => ("xyzRGB", 1.0),
            _ => bail!(
                "Can't guess the column layout of a line with {} values",
                num_columns
            ),
        };
        return Ok(AsciiLayout {
            format,
            delimiter,
            header_lines,
            color_range,
        });
    }
    bail!("File contains no points")
}

/// Reader for all supported point cloud file formats. `.xyz`, `.txt` and `.pts` files are read as ASCII files
/// with one point per line, `.ply` files as ASCII PLY files
pub enum GenericPointReader {
    Ascii(AsciiReader<BufReader<File>>),
    Ply(PlyReader<BufReader<File>>),
}

impl GenericPointReader {
    pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = get_extension_lookup(path)?;
        match extension {
            Some(SupportedFileExtensions::Ply) => Ok(Self::Ply(PlyReader::from_path(path)?)),
            Some(ascii_extension) => {
                let layout = detect_ascii_layout(
                    BufReader::new(File::open(path)?),
                    ascii_extension,
                )
                .with_context(|| format!("Unrecognized ASCII point file {}", path.display()))?;
                let reader = AsciiReader::from_path(path, layout.format, layout.delimiter)?
                    .with_header_lines(layout.header_lines)
                    .with_color_range(layout.color_range);
                Ok(Self::Ascii(reader))
            }
            None => bail!("Unsupported file format of file {}", path.display()),
        }
    }

    /// Checks whether the given `path` is a point cloud file that can be read using a `GenericPointReader`. `Err`
    /// is returned only if the file extension of `path` is no valid Unicode string
    pub fn is_supported_file<P: AsRef<Path>>(path: P) -> Result<bool> {
        Ok(get_extension_lookup(path.as_ref())?.is_some())
    }

    /// Returns the total number of points in the underlying point cloud file. Returns `None` if the number of
    /// points is unknown (e.g. for ASCII files which don't have header information)
    pub fn point_count(&self) -> Option<usize> {
        match self {
            GenericPointReader::Ascii(_) => None,
            GenericPointReader::Ply(reader) => Some(reader.header().vertex_count()),
        }
    }
}

impl PointReader for GenericPointReader {
    fn read(&mut self) -> Result<PointCloud> {
        match self {
            GenericPointReader::Ascii(reader) => reader.read(),
            GenericPointReader::Ply(reader) => reader.read(),
        }
    }
}

/// Writer for all supported point cloud file formats, see [GenericPointReader]
pub enum GenericPointWriter {
    Ascii(AsciiWriter<BufWriter<File>>),
    Ply(PlyWriter<BufWriter<File>>),
}

impl GenericPointWriter {
    /// Creates the file at `path`. ASCII files get color columns if `with_colors` is set, PLY files decide this
    /// per written cloud. `.pts` files get an intensity column of zeros and 8-bit colors
    pub fn create_file<P: AsRef<Path>>(path: P, with_colors: bool) -> Result<Self> {
        let path = path.as_ref();
        match get_extension_lookup(path)? {
            Some(SupportedFileExtensions::Ply) => Ok(Self::Ply(PlyWriter::from_path(path)?)),
            Some(SupportedFileExtensions::Pts) => {
                let format = if with_colors { "xyzsRGB" } else { "xyz" };
                Ok(Self::Ascii(
                    AsciiWriter::from_path(path, format)?
                        .with_delimiter(" ")
                        .with_color_range(255.0),
                ))
            }
            Some(SupportedFileExtensions::Xyz) => {
                let format = if with_colors { "xyzRGB" } else { "xyz" };
                Ok(Self::Ascii(
                    AsciiWriter::from_path(path, format)?.with_delimiter(" "),
                ))
            }
            None => bail!("Unsupported file format of file {}", path.display()),
        }
    }
}

impl PointWriter for GenericPointWriter {
    fn write(&mut self, cloud: &PointCloud) -> Result<()> {
        match self {
            GenericPointWriter::Ascii(writer) => writer.write(cloud),
            GenericPointWriter::Ply(writer) => writer.write(cloud),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            GenericPointWriter::Ascii(writer) => writer.flush(),
            GenericPointWriter::Ply(writer) => writer.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_extension_lookup() -> Result<()> {
        assert_eq!(
            get_extension_lookup(Path::new("a/b.XYZ"))?,
            Some(SupportedFileExtensions::Xyz)
        );
        assert_eq!(
            get_extension_lookup(Path::new("cloud.ply"))?,
            Some(SupportedFileExtensions::Ply)
        );
        assert_eq!(get_extension_lookup(Path::new("cloud.las"))?, None);
        assert_eq!(get_extension_lookup(Path::new("cloud"))?, None);
        assert!(!GenericPointReader::is_supported_file("cloud.laz")?);
        Ok(())
    }

    #[test]
    fn test_detect_ascii_layout() -> Result<()> {
        let layout = detect_ascii_layout(
            Cursor::new("1.0 2.0 3.0\n"),
            SupportedFileExtensions::Xyz,
        )?;
        assert_eq!(layout.format, "xyz");
        assert_eq!(layout.delimiter, " ");

        let layout = detect_ascii_layout(
            Cursor::new("\n1.0, 2.0, 3.0, 0.1, 0.2, 0.3\n"),
            SupportedFileExtensions::Xyz,
        )?;
        assert_eq!(layout.format, "xyzRGB");
        assert_eq!(layout.delimiter, ",");
        assert_eq!(layout.header_lines, 1);

        let layout = detect_ascii_layout(
            Cursor::new("2\n1 2 3 -1204 10 20 30\n4 5 6 -900 40 50 60\n"),
            SupportedFileExtensions::Pts,
        )?;
        assert_eq!(
            layout,
            AsciiLayout {
                format: "xyzsRGB",
                delimiter: " ",
                header_lines: 1,
                color_range: 255.0,
            }
        );

        let layout = detect_ascii_layout(
            Cursor::new("# scanned with a handheld device, units in meters\n# x y\n1.0 2.0 3.0\n"),
            SupportedFileExtensions::Xyz,
        )?;
        assert_eq!(layout.format, "xyz");
        assert_eq!(layout.header_lines, 2);

        assert!(detect_ascii_layout(Cursor::new("1 2\n"), SupportedFileExtensions::Xyz).is_err());
        assert!(detect_ascii_layout(Cursor::new(""), SupportedFileExtensions::Xyz).is_err());
        Ok(())
    }
}
