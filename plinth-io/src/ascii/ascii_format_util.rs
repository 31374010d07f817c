use anyhow::{bail, Result};

// This enum maps the different entrys on an ascii file to later map these entries to the corresponding attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PointDataType {
    Skip,
    CoordinateX,
    CoordinateY,
    CoordinateZ,
    ColorR,
    ColorG,
    ColorB,
}

impl std::fmt::Display for PointDataType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl PointDataType {
    //s - skip this number
    //x - x coordinate
    //y - y coordinate
    //z - z coordinate
    //R - red channel of RGB color
    //G - green channel of RGB color
    //B - blue channel of RGB color
    pub(crate) fn get_parse_layout(format: &str) -> Result<Vec<PointDataType>> {
        let mut parse_layout = Vec::<PointDataType>::new();
        for character in format.chars() {
            match character {
                's' => parse_layout.push(PointDataType::Skip),
                'x' => parse_layout.push(PointDataType::CoordinateX),
                'y' => parse_layout.push(PointDataType::CoordinateY),
                'z' => parse_layout.push(PointDataType::CoordinateZ),
                'R' => parse_layout.push(PointDataType::ColorR),
                'G' => parse_layout.push(PointDataType::ColorG),
                'B' => parse_layout.push(PointDataType::ColorB),
                _ => {
                    bail!(
                        "FormatError can't interpret format literal '{}' in format string '{}'.",
                        character,
                        format
                    );
                }
            }
        }
        for required in &[
            PointDataType::CoordinateX,
            PointDataType::CoordinateY,
            PointDataType::CoordinateZ,
        ] {
            if parse_layout.iter().filter(|t| *t == required).count() != 1 {
                bail!(
                    "FormatError format string '{}' must contain the literal '{}' exactly once.",
                    format,
                    required.literal()
                );
            }
        }
        let color_counts = [
            PointDataType::ColorR,
            PointDataType::ColorG,
            PointDataType::ColorB,
        ]
        .iter()
        .map(|color| parse_layout.iter().filter(|t| *t == color).count())
        .collect::<Vec<_>>();
        if color_counts != [0, 0, 0] && color_counts != [1, 1, 1] {
            bail!(
                "FormatError format string '{}' must contain all of 'R', 'G' and 'B' once or none of them.",
                format
            );
        }
        Ok(parse_layout)
    }

    pub(crate) fn literal(&self) -> char {
        match self {
            PointDataType::Skip => 's',
            PointDataType::CoordinateX => 'x',
            PointDataType::CoordinateY => 'y',
            PointDataType::CoordinateZ => 'z',
            PointDataType::ColorR => 'R',
            PointDataType::ColorG => 'G',
            PointDataType::ColorB => 'B',
        }
    }
}

pub(crate) fn has_colors(parse_layout: &[PointDataType]) -> bool {
    parse_layout.contains(&PointDataType::ColorR)
}
