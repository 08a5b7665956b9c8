//! Point-cloud readers for PLY (ASCII or binary) and XYZ text files

use crate::types::Point;
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading a point cloud
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported file format: {0:?}")]
    UnsupportedFormat(String),

    #[error("invalid PLY file: {0}")]
    Ply(String),

    #[error("unsupported PLY content: {0}")]
    UnsupportedPly(String),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

/// Source of point sets
pub trait PointLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<Point>, LoadError>;
}

/// Reader that picks the format from the file extension (`.ply`, `.xyz`,
/// `.txt`, `.pts`)
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl PointLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<Vec<Point>, LoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let is_ply = match ext.as_str() {
            "ply" => true,
            "xyz" | "txt" | "pts" => false,
            _ => return Err(LoadError::UnsupportedFormat(ext)),
        };

        let reader = BufReader::new(File::open(path)?);
        let points = if is_ply {
            read_ply(reader)?
        } else {
            read_xyz(reader)?
        };

        log::info!("loaded {} points from {}", points.len(), path.display());
        Ok(points)
    }
}

fn parse_coord(token: Option<&str>, line: usize, axis: &str) -> Result<f64, LoadError> {
    let token = token.ok_or_else(|| LoadError::Parse {
        line,
        reason: format!("missing {axis}"),
    })?;
    token.parse().map_err(|_| LoadError::Parse {
        line,
        reason: format!("invalid {axis} value {token:?}"),
    })
}

/// Read a PLY stream in any of the `ascii`, `binary_little_endian` or
/// `binary_big_endian` encodings.
///
/// Points come from the `x`, `y`, `z` properties of the `vertex` element,
/// whatever their numeric type. Other elements and properties are ignored.
pub fn read_ply<R: Read>(mut reader: R) -> Result<Vec<Point>, LoadError> {
    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| LoadError::Ply(e.to_string()))?;

    let vertices = ply
        .payload
        .get("vertex")
        .ok_or_else(|| LoadError::UnsupportedPly("no vertex element".into()))?;

    vertices
        .iter()
        .enumerate()
        .map(|(i, vertex)| {
            Ok(Point::new(
                ply_coord(vertex, "x", i)?,
                ply_coord(vertex, "y", i)?,
                ply_coord(vertex, "z", i)?,
            ))
        })
        .collect()
}

fn ply_coord(vertex: &DefaultElement, axis: &str, index: usize) -> Result<f64, LoadError> {
    match vertex.get(axis) {
        Some(Property::Float(v)) => Ok(*v as f64),
        Some(Property::Double(v)) => Ok(*v),
        Some(Property::Int(v)) => Ok(*v as f64),
        Some(Property::UInt(v)) => Ok(*v as f64),
        Some(Property::Short(v)) => Ok(*v as f64),
        Some(Property::UShort(v)) => Ok(*v as f64),
        Some(Property::Char(v)) => Ok(*v as f64),
        Some(Property::UChar(v)) => Ok(*v as f64),
        Some(_) => Err(LoadError::UnsupportedPly(format!(
            "vertex {index}: {axis} is a list property"
        ))),
        None => Err(LoadError::UnsupportedPly(format!(
            "vertex {index} has no {axis} property"
        ))),
    }
}

/// Read whitespace-separated `x y z` lines. Blank lines and lines starting
/// with `#` are skipped; extra columns are ignored.
pub fn read_xyz<R: BufRead>(reader: R) -> Result<Vec<Point>, LoadError> {
    let mut points = Vec::new();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        points.push(Point::new(
            parse_coord(parts.next(), n + 1, "x")?,
            parse_coord(parts.next(), n + 1, "y")?,
            parse_coord(parts.next(), n + 1, "z")?,
        ));
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const PLY: &str = "ply
format ascii 1.0
comment made by hand
element vertex 3
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
element face 0
property list uchar int vertex_indices
end_header
0 0 0 255 0 0
1.5 0 -2 0 255 0
0 1 0.25 0 0 255
";

    #[test]
    fn test_read_ply() {
        let points = read_ply(Cursor::new(PLY)).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1], Point::new(1.5, 0.0, -2.0));
        assert_eq!(points[2], Point::new(0.0, 1.0, 0.25));
    }

    #[test]
    fn test_ply_property_order() {
        let ply = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float z\nproperty float x\nproperty float y\nend_header\n3 1 2\n";
        let points = read_ply(Cursor::new(ply)).unwrap();
        assert_eq!(points, vec![Point::new(1.0, 2.0, 3.0)]);
    }

    /// Binary PLY with `float x, float y, float z, uchar intensity` vertices
    fn binary_ply(points: &[[f32; 3]], big_endian: bool) -> Vec<u8> {
        let format = if big_endian {
            "binary_big_endian"
        } else {
            "binary_little_endian"
        };
        let mut bytes = format!(
            "ply\nformat {format} 1.0\nelement vertex {}\nproperty float x\nproperty float y\n\
             property float z\nproperty uchar intensity\nend_header\n",
            points.len()
        )
        .into_bytes();
        for p in points {
            for c in p {
                if big_endian {
                    bytes.extend_from_slice(&c.to_be_bytes());
                } else {
                    bytes.extend_from_slice(&c.to_le_bytes());
                }
            }
            bytes.push(200);
        }
        bytes
    }

    #[test]
    fn test_read_binary_little_endian_ply() {
        let bytes = binary_ply(&[[0.5, -1.0, 2.0], [3.0, 0.25, -0.75]], false);
        let points = read_ply(Cursor::new(bytes)).unwrap();
        assert_eq!(
            points,
            vec![Point::new(0.5, -1.0, 2.0), Point::new(3.0, 0.25, -0.75)]
        );
    }

    #[test]
    fn test_read_binary_big_endian_ply() {
        let bytes = binary_ply(&[[1.0, 2.0, 4.0]], true);
        let points = read_ply(Cursor::new(bytes)).unwrap();
        assert_eq!(points, vec![Point::new(1.0, 2.0, 4.0)]);
    }

    #[test]
    fn test_integer_and_double_coordinates() {
        let ply = "ply\nformat ascii 1.0\nelement vertex 2\nproperty double x\nproperty int y\nproperty short z\nend_header\n0.125 -3 7\n1e3 0 -2\n";
        let points = read_ply(Cursor::new(ply)).unwrap();
        assert_eq!(points[0], Point::new(0.125, -3.0, 7.0));
        assert_eq!(points[1], Point::new(1000.0, 0.0, -2.0));
    }

    #[test]
    fn test_ply_without_vertices() {
        let ply = "ply\nformat ascii 1.0\nelement face 0\nproperty list uchar int vertex_indices\nend_header\n";
        assert!(matches!(
            read_ply(Cursor::new(ply)),
            Err(LoadError::UnsupportedPly(_))
        ));

        let ply = "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nproperty float y\nend_header\n1 2\n";
        assert!(matches!(
            read_ply(Cursor::new(ply)),
            Err(LoadError::UnsupportedPly(msg)) if msg.contains("z")
        ));
    }

    #[test]
    fn test_not_a_ply() {
        assert!(matches!(
            read_ply(Cursor::new("solid cube\n")),
            Err(LoadError::Ply(_))
        ));
    }

    #[test]
    fn test_truncated_ply() {
        let ply = "ply\nformat ascii 1.0\nelement vertex 4\nproperty float x\nproperty float y\nproperty float z\nend_header\n0 0 0\n";
        assert!(read_ply(Cursor::new(ply)).is_err());
    }

    #[test]
    fn test_read_xyz() {
        let text = "# header\n0 0 0\n\n1 2 3 0.5\n  -1e-3 4 5\n";
        let points = read_xyz(Cursor::new(text)).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[2], Point::new(-1e-3, 4.0, 5.0));
    }

    #[test]
    fn test_xyz_parse_error_reports_line() {
        let err = read_xyz(Cursor::new("0 0 0\n1 two 3\n")).unwrap_err();
        match err {
            LoadError::Parse { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("y"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let err = FileLoader.load(Path::new("cloud.las")).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ext) if ext == "las"));
    }
}
