//! Wavefront OBJ input.
//!
//! Only the vertex and triangular-face records matter for a shape model;
//! comments, normals, texcoords, materials and groups are ignored. The
//! format's 1-based indices become the crate's 0-based convention here, at
//! the boundary.

use std::path::Path;

use log::info;

use crate::error::{Error, Result};
use crate::mesh::ShapeModel;
use crate::{Float, Point3f};

/// Read `(nodes, faces)` from an OBJ file, applying a uniform `scale` to
/// every vertex.
///
/// Non-triangular faces and out-of-range face indices are format errors.
/// Multiple objects in one file are concatenated into a single mesh.
pub fn load_obj<P: AsRef<Path>>(path: P, scale: Float) -> Result<(Vec<Point3f>, Vec<[usize; 3]>)> {
    let path = path.as_ref();
    let parse_error = |message: String| Error::Parse {
        path: path.display().to_string(),
        message,
    };

    let options = tobj::LoadOptions {
        triangulate: false,
        single_index: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };
    let (models, _materials) =
        tobj::load_obj(path, &options).map_err(|e| parse_error(e.to_string()))?;

    let mut nodes: Vec<Point3f> = Vec::new();
    let mut faces: Vec<[usize; 3]> = Vec::new();
    for model in &models {
        let mesh = &model.mesh;
        if mesh.positions.len() % 3 != 0 {
            return Err(parse_error(format!(
                "object \"{}\" has a truncated vertex record",
                model.name
            )));
        }
        if !mesh.face_arities.is_empty() {
            if let Some(arity) = mesh.face_arities.iter().find(|&&a| a != 3) {
                return Err(parse_error(format!(
                    "object \"{}\" has a face with {} vertices; only triangles are supported",
                    model.name, arity
                )));
            }
        }
        if mesh.indices.len() % 3 != 0 {
            return Err(parse_error(format!(
                "object \"{}\" has a truncated face record",
                model.name
            )));
        }

        let base = nodes.len();
        nodes.extend(
            mesh.positions
                .chunks(3)
                .map(|p| Point3f::new(p[0] * scale, p[1] * scale, p[2] * scale)),
        );
        for idx in mesh.indices.chunks(3) {
            let f = [
                base + idx[0] as usize,
                base + idx[1] as usize,
                base + idx[2] as usize,
            ];
            if f.iter().any(|&v| v >= nodes.len()) {
                return Err(parse_error(format!(
                    "object \"{}\" references a vertex that does not exist",
                    model.name
                )));
            }
            faces.push(f);
        }
    }

    info!(
        "Loaded {} with {} nodes and {} faces (scale {})",
        path.display(),
        nodes.len(),
        faces.len(),
        scale
    );
    Ok((nodes, faces))
}

/// Load a shape model from an OBJ file and build the requested optional
/// subfields, in dependency order.
///
/// `with_face_max_elevations` needs the visibility graph, so requesting it
/// without `with_face_visibility` is rejected before the file is touched.
pub fn load_shape_obj<P: AsRef<Path>>(
    path: P,
    scale: Float,
    with_bvh: bool,
    with_face_visibility: bool,
    with_face_max_elevations: bool,
) -> Result<ShapeModel> {
    if with_face_max_elevations && !with_face_visibility {
        return Err(Error::invalid_argument(
            "face max elevations require the face visibility graph; \
             set with_face_visibility as well",
        ));
    }

    let (nodes, faces) = load_obj(path, scale)?;
    let mut shape = ShapeModel::new(nodes, faces)?;
    if with_bvh {
        shape.build_bvh();
    }
    if with_face_visibility {
        shape.build_face_visibility_graph();
    }
    if with_face_max_elevations {
        shape.compute_face_max_elevations()?;
    }
    Ok(shape)
}
