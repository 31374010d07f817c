use anyhow::{bail, Context, Result};
use itertools::{EitherOrBoth::*, Itertools};
use plinth_core::{containers::PointCloud, nalgebra::Vector3};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use super::{has_colors, PointDataType};
use crate::base::PointReader;

/// `PointReader` implementation for ascii files with one point per line
pub struct AsciiReader<R: BufRead> {
    reader: R,
    delimiter: String,
    parse_layout: Vec<PointDataType>,
    header_lines: usize,
    color_range: f64,
}

impl<R: BufRead> AsciiReader<R> {
    /// Creates a new `AsciiReader` from the given `read`.
    /// The `format` string slice coordinates the interpretation of each column, the following literals are
    /// supported:
    /// - s → skip this column
    /// - x → x coordinate
    /// - y → y coordinate
    /// - z → z coordinate
    /// - R → red channel of RGB color
    /// - G → green channel of RGB color
    /// - B → blue channel of RGB color
    ///
    /// Columns after the last literal are ignored. A `delimiter` consisting only of whitespace splits at any run
    /// of whitespace.
    ///
    /// # Errors
    ///
    /// If `format` contains unrecognized literals, or does not contain each coordinate exactly once
    pub fn from_read(read: R, format: &str, delimiter: &str) -> Result<Self> {
        Ok(Self {
            reader: read,
            delimiter: delimiter.to_string(),
            parse_layout: PointDataType::get_parse_layout(format)?,
            header_lines: 0,
            color_range: 1.0,
        })
    }

    /// Skip the first `header_lines` lines of the input
    pub fn with_header_lines(mut self, header_lines: usize) -> Self {
        self.header_lines = header_lines;
        self
    }

    /// Color values are divided by `color_range`, e.g. `255.0` for 8-bit colors
    pub fn with_color_range(mut self, color_range: f64) -> Self {
        self.color_range = color_range;
        self
    }

    fn split_line<'a>(&self, line: &'a str) -> Vec<&'a str> {
        if self.delimiter.trim().is_empty() {
            line.split_whitespace().collect()
        } else {
            line.split(self.delimiter.as_str()).map(str::trim).collect()
        }
    }

    fn get_point(&self, line: &str) -> Result<(Vector3<f64>, Vector3<f64>)> {
        let mut position = Vector3::zeros();
        let mut color = Vector3::zeros();
        for pair in self.split_line(line).into_iter().zip_longest(&self.parse_layout) {
            match pair {
                Both(value_str, data_type) => {
                    let (target, component) = match data_type {
                        PointDataType::Skip => continue,
                        PointDataType::CoordinateX => (&mut position, 0),
                        PointDataType::CoordinateY => (&mut position, 1),
                        PointDataType::CoordinateZ => (&mut position, 2),
                        PointDataType::ColorR => (&mut color, 0),
                        PointDataType::ColorG => (&mut color, 1),
                        PointDataType::ColorB => (&mut color, 2),
                    };
                    target[component] = parse_string::<f64>(value_str)
                        .with_context(|| generate_parse_error(data_type))?;
                }
                Left(_) => break,
                Right(data_type) => bail!(
                    "ParseError missing value for format literal '{}'.",
                    data_type.literal()
                ),
            }
        }
        Ok((position, color / self.color_range))
    }
}

impl AsciiReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P, format: &str, delimiter: &str) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        Self::from_read(file, format, delimiter)
    }
}

impl<R: BufRead> PointReader for AsciiReader<R> {
    fn read(&mut self) -> Result<PointCloud> {
        let with_colors = has_colors(&self.parse_layout);
        let mut positions = vec![];
        let mut colors = vec![];
        let mut lines = vec![];
        for line in (&mut self.reader).lines() {
            lines.push(line?);
        }
        //read line by line
        for (index, line) in lines.iter().enumerate().skip(self.header_lines) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (position, color) = self
                .get_point(line)
                .with_context(|| format!("ReadError in line {}.", index + 1))?;
            positions.push(position);
            if with_colors {
                colors.push(color);
            }
        }
        if with_colors {
            PointCloud::from_positions_and_colors(positions, colors)
        } else {
            Ok(PointCloud::from_positions(positions))
        }
    }
}

fn parse_string<V: FromStr>(value_str: &str) -> Result<V>
where
    V::Err: std::error::Error + Send + Sync + 'static,
{
    value_str
        .parse::<V>()
        .with_context(|| format!("ParseError can't parse '{}'.", value_str))
}

fn generate_parse_error(datatype: &PointDataType) -> String {
    format!(
        "ParseError at parsing {} for format literal '{}'.",
        datatype,
        datatype.literal()
    )
}
