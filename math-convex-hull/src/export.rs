//! Export functions for convex hulls

use crate::types::ConvexHull3D;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Export a convex hull to OBJ format
///
/// Writes vertices (v), one normal per non-degenerate facet (vn) and the
/// faces (f). Degenerate facets are written without a normal reference.
pub fn export_obj<P: AsRef<Path>>(hull: &ConvexHull3D, path: P) -> std::io::Result<()> {
    let mut file = BufWriter::new(File::create(path)?);

    writeln!(file, "# Convex Hull OBJ Export")?;
    writeln!(file, "# Vertices: {}", hull.num_vertices())?;
    writeln!(file, "# Faces: {}", hull.num_faces())?;
    writeln!(file)?;

    for vertex in hull.vertices() {
        writeln!(file, "v {} {} {}", vertex.x, vertex.y, vertex.z)?;
    }

    writeln!(file)?;

    let facets = hull.facets();
    let mut normal_ids = Vec::with_capacity(facets.len());
    let mut next_id = 1;
    for facet in &facets {
        match facet {
            Ok(f) => {
                writeln!(file, "vn {} {} {}", f.normal.x, f.normal.y, f.normal.z)?;
                normal_ids.push(Some(next_id));
                next_id += 1;
            }
            Err(_) => normal_ids.push(None),
        }
    }

    writeln!(file)?;

    // OBJ uses 1-based indexing
    for (face, normal_id) in hull.faces().iter().zip(normal_ids) {
        match normal_id {
            Some(n) => writeln!(
                file,
                "f {}//{} {}//{} {}//{}",
                face.v0 + 1,
                n,
                face.v1 + 1,
                n,
                face.v2 + 1,
                n
            )?,
            None => writeln!(file, "f {} {} {}", face.v0 + 1, face.v1 + 1, face.v2 + 1)?,
        }
    }

    file.flush()
}
