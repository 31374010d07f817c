use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{bail, Context, Result};
use plinth_core::containers::PointCloud;

use super::{has_colors, PointDataType};
use crate::base::PointWriter;

/// `PointWriter` implementation for ascii files with one point per line
pub struct AsciiWriter<W: Write> {
    writer: W,
    delimiter: String,
    precision: usize,
    color_range: f64,
    parse_layout: Vec<PointDataType>,
}

impl<W: Write> AsciiWriter<W> {
    /// Creates a new `AsciiWriter` from the given `write`.
    /// The `format` string slice coordinates the content of each column, using the same literals as
    /// [AsciiReader](super::AsciiReader). Skipped columns are written as `0`. Values are separated by `", "`
    /// and written with 5 decimal places unless configured otherwise.
    ///
    /// # Errors
    ///
    /// If `format` contains unrecognized literals, or does not contain each coordinate exactly once
    pub fn from_write(write: W, format: &str) -> Result<Self> {
        Ok(Self {
            writer: write,
            delimiter: String::from(", "),
            precision: 5,
            color_range: 1.0,
            parse_layout: PointDataType::get_parse_layout(format)?,
        })
    }

    pub fn set_delimiter(&mut self, delimiter: &str) {
        self.delimiter = String::from(delimiter);
    }

    pub fn set_precision(&mut self, precision: usize) {
        self.precision = precision;
    }

    pub fn with_delimiter(mut self, delimiter: &str) -> Self {
        self.set_delimiter(delimiter);
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.set_precision(precision);
        self
    }

    /// Color values are multiplied by `color_range`, e.g. `255.0` for 8-bit colors
    pub fn with_color_range(mut self, color_range: f64) -> Self {
        self.color_range = color_range;
        self
    }

    fn format_value(&self, value: f64) -> String {
        trim_unnecessary_tailing_zeros(&format!("{:.1$}", value, self.precision)).to_string()
    }
}

impl AsciiWriter<BufWriter<File>> {
    /// Creates a new `AsciiWriter` by opening the file at the given `path`.
    /// This functions just wraps a `BufWriter` around a `File` and uses [`AsciiWriter::from_write`].
    ///
    /// # Examples
    /// ```no_run
    /// use std::path::Path;
    /// use anyhow::Result;
    /// use plinth_io::ascii::AsciiWriter;
    /// fn main() -> Result<()> {
    ///     let path = Path::new("output.txt");
    ///     let writer = AsciiWriter::from_path(path, "xyzRGB")?;
    ///     Ok(())
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// If `path` cannot be created or overwritten, an error is returned.
    pub fn from_path<P: AsRef<Path>>(path: P, format: &str) -> Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Self::from_write(file, format)
    }
}

impl<W: Write> PointWriter for AsciiWriter<W> {
    fn write(&mut self, cloud: &PointCloud) -> Result<()> {
        let colors = match (has_colors(&self.parse_layout), cloud.colors()) {
            (true, Some(colors)) => Some(colors),
            (true, None) => bail!("Format requires colors, but the point cloud has none"),
            (false, _) => None,
        };

        for (point_index, position) in cloud.positions().iter().enumerate() {
            let values = self
                .parse_layout
                .iter()
                .map(|format_literal| match (format_literal, colors) {
                    (PointDataType::Skip, _) => String::from("0"),
                    (PointDataType::CoordinateX, _) => self.format_value(position.x),
                    (PointDataType::CoordinateY, _) => self.format_value(position.y),
                    (PointDataType::CoordinateZ, _) => self.format_value(position.z),
                    (PointDataType::ColorR, Some(colors)) => {
                        self.format_value(colors[point_index].x * self.color_range)
                    }
                    (PointDataType::ColorG, Some(colors)) => {
                        self.format_value(colors[point_index].y * self.color_range)
                    }
                    (PointDataType::ColorB, Some(colors)) => {
                        self.format_value(colors[point_index].z * self.color_range)
                    }
                    (_, None) => String::from("0"),
                })
                .collect::<Vec<_>>();
            writeln!(self.writer, "{}", values.join(&self.delimiter))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Flush failed")
    }
}

fn trim_unnecessary_tailing_zeros(slice: &str) -> &str {
    if !slice.contains('.') {
        return slice;
    }
    let mut end = slice.len();
    while slice[..end].ends_with('0') && !slice[..end].ends_with(".0") {
        end -= 1;
    }
    &slice[..end]
}
