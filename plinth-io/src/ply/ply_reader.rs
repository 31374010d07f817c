use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{anyhow, bail, Context, Result};
use plinth_core::{containers::PointCloud, nalgebra::Vector3};

use super::{PlyElement, PlyFormat, PlyHeader, PlyPropertyKind};
use crate::base::PointReader;

const MAX_PREALLOCATED_VERTICES: usize = 1 << 20;

/// Column indices of the vertex properties that make up a point
struct VertexLayout {
    num_properties: usize,
    position: [usize; 3],
    color: Option<([usize; 3], f64)>,
}

impl VertexLayout {
    fn from_element(element: &PlyElement) -> Result<Self> {
        if element
            .properties
            .iter()
            .any(|p| matches!(p.kind, PlyPropertyKind::List { .. }))
        {
            bail!("List properties on vertices are not supported");
        }
        let index_of = |name: &str| element.property_index(name);
        let position = match (index_of("x"), index_of("y"), index_of("z")) {
            (Some(x), Some(y), Some(z)) => [x, y, z],
            _ => bail!("Vertex element must have the properties x, y and z"),
        };
        let color = match (index_of("red"), index_of("green"), index_of("blue")) {
            (Some(r), Some(g), Some(b)) => {
                let range = match element.properties[r].kind {
                    PlyPropertyKind::Scalar(data_type) => data_type.color_range(),
                    PlyPropertyKind::List { .. } => None,
                }
                .ok_or_else(|| anyhow!("Unsupported data type for vertex colors"))?;
                Some(([r, g, b], range))
            }
            (None, None, None) => None,
            _ => bail!("Vertex element must have all or none of the properties red, green and blue"),
        };
        Ok(Self {
            num_properties: element.properties.len(),
            position,
            color,
        })
    }
}

/// `PointReader` implementation for ASCII PLY files. Reads the positions and, if present, the colors of the
/// vertex element. All other elements are skipped.
pub struct PlyReader<R: BufRead> {
    reader: R,
    header: PlyHeader,
}

impl<R: BufRead> PlyReader<R> {
    /// Creates a new `PlyReader` from the given `read`, parsing the PLY header immediately.
    ///
    /// # Errors
    ///
    /// If the header is malformed or the file is a binary PLY file
    pub fn from_read(mut read: R) -> Result<Self> {
        let header = PlyHeader::read_from(&mut read)?;
        if header.format != PlyFormat::Ascii {
            bail!(
                "Only ASCII PLY files are supported, this file is {:?}",
                header.format
            );
        }
        Ok(Self {
            reader: read,
            header,
        })
    }

    pub fn header(&self) -> &PlyHeader {
        &self.header
    }
}

impl PlyReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        Self::from_read(file)
    }
}

impl<R: BufRead> PointReader for PlyReader<R> {
    fn read(&mut self) -> Result<PointCloud> {
        let mut lines = (&mut self.reader)
            .lines()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()));

        for element in &self.header.elements {
            if element.name != "vertex" {
                for _ in 0..element.count {
                    lines
                        .next()
                        .ok_or_else(|| anyhow!("Unexpected end of file in element {}", element.name))?
                        .1?;
                }
                continue;
            }

            let layout = VertexLayout::from_element(element)?;
            // the count is only trusted as far as the body backs it up
            let capacity = element.count.min(MAX_PREALLOCATED_VERTICES);
            let mut positions = Vec::with_capacity(capacity);
            let mut colors = Vec::with_capacity(layout.color.map_or(0, |_| capacity));
            for vertex_index in 0..element.count {
                let (line_index, line) = lines.next().ok_or_else(|| {
                    anyhow!(
                        "Expected {} vertices, but the file ends after {}",
                        element.count,
                        vertex_index
                    )
                })?;
                let line = line?;
                let values = line
                    .split_whitespace()
                    .map(|v| v.parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .with_context(|| format!("ReadError in body line {}.", line_index + 1))?;
                if values.len() != layout.num_properties {
                    bail!(
                        "ReadError in body line {}: expected {} values, got {}.",
                        line_index + 1,
                        layout.num_properties,
                        values.len()
                    );
                }
                let [x, y, z] = layout.position;
                positions.push(Vector3::new(values[x], values[y], values[z]));
                if let Some(([r, g, b], range)) = layout.color {
                    colors.push(Vector3::new(values[r], values[g], values[b]) / range);
                }
            }

            return if layout.color.is_some() {
                PointCloud::from_positions_and_colors(positions, colors)
            } else {
                Ok(PointCloud::from_positions(positions))
            };
        }
        bail!("PLY file has no vertex element")
    }
}
