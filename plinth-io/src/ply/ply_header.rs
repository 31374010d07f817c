use std::fmt;
use std::io::BufRead;

use anyhow::{anyhow, bail, Context, Result};

/// Encoding of the body of a PLY file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

impl PlyFormat {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "ascii" => Ok(Self::Ascii),
            "binary_little_endian" => Ok(Self::BinaryLittleEndian),
            "binary_big_endian" => Ok(Self::BinaryBigEndian),
            _ => bail!("Unknown PLY format '{}'", name),
        }
    }
}

/// Scalar data types of PLY properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl PlyScalarType {
    /// Parses both the classic (`uchar`) and the sized (`uint8`) type names
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "char" | "int8" => Ok(Self::Char),
            "uchar" | "uint8" => Ok(Self::UChar),
            "short" | "int16" => Ok(Self::Short),
            "ushort" | "uint16" => Ok(Self::UShort),
            "int" | "int32" => Ok(Self::Int),
            "uint" | "uint32" => Ok(Self::UInt),
            "float" | "float32" => Ok(Self::Float),
            "double" | "float64" => Ok(Self::Double),
            _ => bail!("Unknown PLY property type '{}'", name),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::UChar => "uchar",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    /// The value that maps to full intensity if a property of this type stores a color channel. `None` for
    /// types that are not used for colors
    pub fn color_range(&self) -> Option<f64> {
        match self {
            Self::UChar => Some(255.0),
            Self::UShort => Some(65535.0),
            Self::Float | Self::Double => Some(1.0),
            _ => None,
        }
    }
}

impl fmt::Display for PlyScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyPropertyKind {
    Scalar(PlyScalarType),
    List {
        count_type: PlyScalarType,
        item_type: PlyScalarType,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyProperty {
    pub name: String,
    pub kind: PlyPropertyKind,
}

/// An element declaration, e.g. `element vertex 100` together with its properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyElement {
    pub name: String,
    pub count: usize,
    pub properties: Vec<PlyProperty>,
}

impl PlyElement {
    /// Index of the property with the given `name`
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }
}

/// Header of a PLY file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlyHeader {
    pub format: PlyFormat,
    pub comments: Vec<String>,
    pub elements: Vec<PlyElement>,
}

impl PlyHeader {
    /// Reads the header from `read`, leaving `read` positioned at the first line after `end_header`
    pub fn read_from<R: BufRead>(read: &mut R) -> Result<Self> {
        let mut lines = read.lines();
        let mut next_line = || -> Result<String> {
            lines
                .next()
                .ok_or_else(|| anyhow!("Unexpected end of file in PLY header"))?
                .context("Could not read PLY header")
        };

        if next_line()?.trim() != "ply" {
            bail!("File does not start with the PLY magic number");
        }

        let mut format = None;
        let mut comments = vec![];
        let mut elements: Vec<PlyElement> = vec![];
        loop {
            let line = next_line()?;
            let tokens = line.split_whitespace().collect::<Vec<_>>();
            match tokens.as_slice() {
                [] => continue,
                ["end_header"] => break,
                ["format", name, _version] => format = Some(PlyFormat::from_name(name)?),
                ["comment", ..] | ["obj_info", ..] => {
                    comments.push(line.trim_start()[tokens[0].len()..].trim().to_string())
                }
                ["element", name, count] => elements.push(PlyElement {
                    name: name.to_string(),
                    count: count
                        .parse()
                        .with_context(|| format!("Invalid element count '{}'", count))?,
                    properties: vec![],
                }),
                ["property", "list", count_type, item_type, name] => {
                    let kind = PlyPropertyKind::List {
                        count_type: PlyScalarType::from_name(count_type)?,
                        item_type: PlyScalarType::from_name(item_type)?,
                    };
                    Self::push_property(&mut elements, name, kind)?;
                }
                ["property", data_type, name] => {
                    let kind = PlyPropertyKind::Scalar(PlyScalarType::from_name(data_type)?);
                    Self::push_property(&mut elements, name, kind)?;
                }
                _ => bail!("Invalid line in PLY header: '{}'", line),
            }
        }

        Ok(Self {
            format: format.ok_or_else(|| anyhow!("PLY header has no format line"))?,
            comments,
            elements,
        })
    }

    fn push_property(elements: &mut [PlyElement], name: &str, kind: PlyPropertyKind) -> Result<()> {
        let element = elements
            .last_mut()
            .ok_or_else(|| anyhow!("PLY property '{}' is declared before any element", name))?;
        element.properties.push(PlyProperty {
            name: name.to_string(),
            kind,
        });
        Ok(())
    }

    pub fn vertex_element(&self) -> Option<&PlyElement> {
        self.elements.iter().find(|e| e.name == "vertex")
    }

    /// Number of vertices, 0 if there is no vertex element
    pub fn vertex_count(&self) -> usize {
        self.vertex_element().map(|e| e.count).unwrap_or(0)
    }
}
