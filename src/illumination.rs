//! Direct illumination with optional self-shadowing, and mutual eclipse
//! shadowing between two bodies.
//!
//! The light is a point at infinity: the sun is passed as a position in the
//! mesh's frame and only its direction matters.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::geometry::Matrix3x3;
use crate::intersect::{closest_approach, intersect_ray_sphere, intersect_ray_triangle, Sphere};
use crate::mesh::ShapeModel;
use crate::ray::Ray;
use crate::visibility::VisibilityGraph;
use crate::{clamp, Float, Point3f, Vector3f};

/// Outcome of one eclipse-shadowing pass over the target's faces.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EclipseStatus {
    /// No face changed state.
    NoEclipse,
    /// Some, but not all, previously lit faces were shadowed.
    PartialEclipse,
    /// Every previously lit face is now shadowed.
    TotalEclipse,
}

/// Whether face `face_index` is lit by a sun at `sun_position`.
///
/// Without self-shadowing this is the pseudo-convex orientation test
/// `n̂·r̂☉ > 0` and needs no optional subfields. With self-shadowing the
/// face visibility graph is required; when the horizon elevations are also
/// built, sun angles above a face's horizon skip the occlusion loop
/// entirely without changing the result.
pub fn is_illuminated(
    shape: &ShapeModel,
    sun_position: &Point3f,
    face_index: usize,
    with_self_shadowing: bool,
) -> Result<bool> {
    if face_index >= shape.num_faces() {
        return Err(Error::invalid_argument(format!(
            "face index {} out of range for mesh with {} faces",
            face_index,
            shape.num_faces()
        )));
    }
    let sun_dir = Vector3f::from(*sun_position).normalize();
    if !with_self_shadowing {
        return Ok(shape.face_normals[face_index].dot(&sun_dir) > 0.0);
    }
    let graph = require_visibility_graph(shape)?;
    Ok(face_lit(
        shape,
        graph,
        shape.face_max_elevations.as_deref(),
        &sun_dir,
        face_index,
    ))
}

/// Fill `illuminated` with the per-face illumination state.
///
/// `illuminated.len()` must equal the face count. Preconditions are checked
/// before any per-face work; the fill itself runs as a parallel-for over
/// disjoint slots.
pub fn update_illumination(
    illuminated: &mut [bool],
    shape: &ShapeModel,
    sun_position: &Point3f,
    with_self_shadowing: bool,
) -> Result<()> {
    if illuminated.len() != shape.num_faces() {
        return Err(Error::invalid_argument(format!(
            "illumination buffer holds {} entries but the mesh has {} faces",
            illuminated.len(),
            shape.num_faces()
        )));
    }
    let sun_dir = Vector3f::from(*sun_position).normalize();

    if !with_self_shadowing {
        illuminated
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, lit)| *lit = shape.face_normals[i].dot(&sun_dir) > 0.0);
        return Ok(());
    }

    let graph = require_visibility_graph(shape)?;
    let elevations = shape.face_max_elevations.as_deref();
    illuminated
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, lit)| *lit = face_lit(shape, graph, elevations, &sun_dir, i));
    Ok(())
}

/// Indices of the lit faces in an illumination mask.
pub fn illuminated_faces(illuminated: &[bool]) -> Vec<usize> {
    illuminated
        .iter()
        .enumerate()
        .filter_map(|(i, &lit)| if lit { Some(i) } else { None })
        .collect()
}

fn require_visibility_graph(shape: &ShapeModel) -> Result<&VisibilityGraph> {
    shape.visibility_graph.as_ref().ok_or_else(|| {
        Error::invalid_argument("illumination with self-shadowing requires the face visibility graph")
    })
}

fn face_lit(
    shape: &ShapeModel,
    graph: &VisibilityGraph,
    elevations: Option<&[Float]>,
    sun_dir: &Vector3f,
    i: usize,
) -> bool {
    let sin_elev = shape.face_normals[i].dot(sun_dir);
    // Written so a NaN normal reads as dark.
    if !(sin_elev > 0.0) {
        return false;
    }

    // A sun above the face's horizon cannot be blocked by any neighbor.
    if let Some(elev) = elevations {
        if clamp(sin_elev, 0.0, 1.0).asin() > elev[i] {
            return true;
        }
    }

    let ray = Ray::new(shape.face_centers[i], *sun_dir);
    for &j in graph.neighbors(i) {
        let f = &shape.faces[j];
        if intersect_ray_triangle(
            &ray,
            &shape.nodes[f[0]],
            &shape.nodes[f[1]],
            &shape.nodes[f[2]],
        )
        .is_some()
        {
            return false;
        }
    }
    true
}

/// Shadow the target body's illumination mask by another body.
///
/// `illuminated` is the target's current per-face mask and is updated in
/// place; only lit faces are examined. `occluder_position` is the occluder
/// body's position in the target frame, and `target_to_occluder` rotates
/// directions from the target frame into the occluder frame. The occluder
/// must have a BVH.
///
/// Faces are first screened against the occluder's bounding sphere, then
/// against its inscribed sphere (a hit there is certain shadow, no mesh
/// test needed), and only then ray-traced against the occluder mesh in its
/// own frame.
pub fn apply_eclipse_shadowing(
    illuminated: &mut [bool],
    target: &ShapeModel,
    occluder: &ShapeModel,
    sun_position: &Point3f,
    occluder_position: &Point3f,
    target_to_occluder: &Matrix3x3,
) -> Result<EclipseStatus> {
    if illuminated.len() != target.num_faces() {
        return Err(Error::invalid_argument(format!(
            "illumination buffer holds {} entries but the target has {} faces",
            illuminated.len(),
            target.num_faces()
        )));
    }
    let occluder_bvh = occluder
        .bvh
        .as_ref()
        .ok_or_else(|| Error::invalid_argument("eclipse shadowing requires a BVH on the occluder"))?;

    let sun_dir = Vector3f::from(*sun_position).normalize();
    let bounding = Sphere::new(*occluder_position, occluder.maximum_radius())?;
    let inscribed = Sphere::new(*occluder_position, occluder.minimum_radius())?;

    // Body-level rejection: the occluder is behind the target with respect
    // to the sun and clear of the sun ray from the target's origin.
    let body_ray = Ray::new(Point3f::origin(), sun_dir);
    if intersect_ray_sphere(&body_ray, &bounding).is_none()
        && closest_approach(&body_ray, occluder_position) < 0.0
    {
        return Ok(EclipseStatus::NoEclipse);
    }

    let lit_before = illuminated.iter().filter(|&&lit| lit).count();
    let shadowed: usize = illuminated
        .par_iter_mut()
        .enumerate()
        .map(|(i, lit)| {
            if !*lit {
                return 0;
            }
            let ray = Ray::new(target.face_centers[i], sun_dir);
            if intersect_ray_sphere(&ray, &bounding).is_none() {
                return 0;
            }
            if closest_approach(&ray, occluder_position) < 0.0 {
                // Occluder behind this face with respect to the sun.
                return 0;
            }
            if let Some(hit) = intersect_ray_sphere(&ray, &inscribed) {
                if hit.t1 > 0.0 {
                    // Crosses a sphere entirely inside the occluder.
                    *lit = false;
                    return 1;
                }
            }

            let origin = Point3f::from(
                target_to_occluder.transform_vector(&(target.face_centers[i] - *occluder_position)),
            );
            let direction = target_to_occluder.transform_vector(&sun_dir);
            let occ_ray = Ray::new(origin, direction);
            if occluder_bvh.intersect_p(
                &occ_ray,
                &occluder.nodes,
                &occluder.faces,
                Float::INFINITY,
                None,
            ) {
                *lit = false;
                return 1;
            }
            0
        })
        .sum();

    let status = if shadowed == 0 {
        EclipseStatus::NoEclipse
    } else if shadowed == lit_before {
        EclipseStatus::TotalEclipse
    } else {
        EclipseStatus::PartialEclipse
    };
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaled_cube(scale: Float) -> ShapeModel {
        let h = 0.5 * scale;
        let nodes = vec![
            Point3f::new(-h, -h, -h),
            Point3f::new(h, -h, -h),
            Point3f::new(h, h, -h),
            Point3f::new(-h, h, -h),
            Point3f::new(-h, -h, h),
            Point3f::new(h, -h, h),
            Point3f::new(h, h, h),
            Point3f::new(-h, h, h),
        ];
        let faces = vec![
            [0, 3, 2],
            [0, 2, 1],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        ShapeModel::new(nodes, faces).unwrap()
    }

    /// An open V-shaped trench: the two inclined walls face each other.
    fn v_trench() -> ShapeModel {
        let nodes = vec![
            Point3f::new(-1.0, 0.0, 1.0),
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
            Point3f::new(-1.0, 1.0, 1.0),
            Point3f::new(1.0, 0.0, 1.0),
            Point3f::new(1.0, 1.0, 1.0),
        ];
        let faces = vec![[0, 1, 2], [0, 2, 3], [1, 5, 2], [1, 4, 5]];
        ShapeModel::new(nodes, faces).unwrap()
    }

    #[test]
    fn test_orientation_round_trip() {
        let cube = scaled_cube(1.0);
        let sun = Point3f::new(3.0, 2.0, 1.0);
        let sun_dir = Vector3f::from(sun).normalize();
        let mut mask = vec![false; cube.num_faces()];
        update_illumination(&mut mask, &cube, &sun, false).unwrap();
        for i in 0..cube.num_faces() {
            assert_eq!(mask[i], cube.face_normals[i].dot(&sun_dir) > 0.0);
            assert_eq!(mask[i], is_illuminated(&cube, &sun, i, false).unwrap());
        }
    }

    #[test]
    fn test_buffer_length_mismatch() {
        let cube = scaled_cube(1.0);
        let mut mask = vec![false; 3];
        assert!(update_illumination(&mut mask, &cube, &Point3f::new(1.0, 0.0, 0.0), false).is_err());
    }

    #[test]
    fn test_self_shadowing_requires_graph() {
        let cube = scaled_cube(1.0);
        assert!(is_illuminated(&cube, &Point3f::new(1.0, 0.0, 0.0), 0, true).is_err());
        let mut mask = vec![false; cube.num_faces()];
        assert!(update_illumination(&mut mask, &cube, &Point3f::new(1.0, 0.0, 0.0), true).is_err());
    }

    #[test]
    fn test_face_index_out_of_range() {
        let cube = scaled_cube(1.0);
        assert!(is_illuminated(&cube, &Point3f::new(1.0, 0.0, 0.0), 12, false).is_err());
    }

    #[test]
    fn test_convex_self_shadowing_equals_orientation() {
        let mut cube = scaled_cube(1.0);
        cube.build_face_visibility_graph();
        let sun = Point3f::new(-2.0, 5.0, 1.0);
        let mut plain = vec![false; cube.num_faces()];
        let mut shadowed = vec![false; cube.num_faces()];
        update_illumination(&mut plain, &cube, &sun, false).unwrap();
        update_illumination(&mut shadowed, &cube, &sun, true).unwrap();
        assert_eq!(plain, shadowed);
    }

    #[test]
    fn test_trench_wall_shadowed_at_grazing_sun() {
        let mut trench = v_trench();
        trench.build_face_visibility_graph();
        assert!(trench.visibility_graph.as_ref().unwrap().nnz() > 0);

        // Low sun from +x: the left wall faces the sun but the right wall
        // stands in the way.
        let low_sun = Point3f::new(10.0, 0.0, 1.0);
        for i in 0..2 {
            assert!(is_illuminated(&trench, &low_sun, i, false).unwrap());
            assert!(!is_illuminated(&trench, &low_sun, i, true).unwrap());
        }
        // The right wall is turned away entirely.
        for i in 2..4 {
            assert!(!is_illuminated(&trench, &low_sun, i, false).unwrap());
        }

        // High sun clears the opposite wall.
        let high_sun = Point3f::new(10.0, 0.0, 20.0);
        for i in 0..2 {
            assert!(is_illuminated(&trench, &high_sun, i, true).unwrap());
        }
    }

    #[test]
    fn test_elevation_short_circuit_equivalence() {
        // Sun angles chosen clear of the walls' grazing bands: the
        // shortcut is a center-direction bound, so a sun skimming a
        // wall's top edge is exactly where it is not informative.
        let suns = [
            Point3f::new(10.0, 0.0, 20.0),
            Point3f::new(10.0, 0.0, 3.0),
            Point3f::new(10.0, 0.0, -1.0),
            Point3f::new(-10.0, 0.0, 3.0),
            Point3f::new(0.0, -1.0, 10.0),
        ];
        let mut plain = v_trench();
        plain.build_face_visibility_graph();
        let mut fast = v_trench();
        fast.build_face_visibility_graph();
        fast.compute_face_max_elevations().unwrap();

        for sun in &suns {
            for i in 0..plain.num_faces() {
                assert_eq!(
                    is_illuminated(&plain, sun, i, true).unwrap(),
                    is_illuminated(&fast, sun, i, true).unwrap(),
                    "face {} disagrees for sun {}",
                    i,
                    sun
                );
            }
        }
    }

    #[test]
    fn test_illuminated_faces_helper() {
        let mask = [true, false, true, false];
        assert_eq!(illuminated_faces(&mask), vec![0, 2]);
    }

    #[test]
    fn test_eclipse_requires_occluder_bvh() {
        let target = scaled_cube(1.0);
        let occluder = scaled_cube(1.0);
        let mut mask = vec![true; target.num_faces()];
        let res = apply_eclipse_shadowing(
            &mut mask,
            &target,
            &occluder,
            &Point3f::new(10.0, 0.0, 0.0),
            &Point3f::new(5.0, 0.0, 0.0),
            &Matrix3x3::identity(),
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_eclipse_mask_length_checked() {
        let target = scaled_cube(1.0);
        let mut occluder = scaled_cube(1.0);
        occluder.build_bvh();
        let mut mask = vec![true; 5];
        assert!(apply_eclipse_shadowing(
            &mut mask,
            &target,
            &occluder,
            &Point3f::new(10.0, 0.0, 0.0),
            &Point3f::new(5.0, 0.0, 0.0),
            &Matrix3x3::identity(),
        )
        .is_err());
    }

    #[test]
    fn test_eclipse_occluder_to_the_side() {
        let target = scaled_cube(1.0);
        let mut occluder = scaled_cube(1.0);
        occluder.build_bvh();
        let sun = Point3f::new(10.0, 0.0, 0.0);
        let mut mask = vec![false; target.num_faces()];
        update_illumination(&mut mask, &target, &sun, false).unwrap();
        let before = mask.clone();

        let status = apply_eclipse_shadowing(
            &mut mask,
            &target,
            &occluder,
            &sun,
            &Point3f::new(0.0, 10.0, 0.0),
            &Matrix3x3::identity(),
        )
        .unwrap();
        assert_eq!(status, EclipseStatus::NoEclipse);
        assert_eq!(mask, before);
    }

    #[test]
    fn test_eclipse_occluder_behind() {
        let target = scaled_cube(1.0);
        let mut occluder = scaled_cube(1.0);
        occluder.build_bvh();
        let sun = Point3f::new(10.0, 0.0, 0.0);
        let mut mask = vec![false; target.num_faces()];
        update_illumination(&mut mask, &target, &sun, false).unwrap();
        let before = mask.clone();

        let status = apply_eclipse_shadowing(
            &mut mask,
            &target,
            &occluder,
            &sun,
            &Point3f::new(-10.0, 0.0, 0.0),
            &Matrix3x3::identity(),
        )
        .unwrap();
        assert_eq!(status, EclipseStatus::NoEclipse);
        assert_eq!(mask, before);
    }

    #[test]
    fn test_eclipse_total() {
        let target = scaled_cube(0.1);
        let mut occluder = scaled_cube(5.0);
        occluder.build_bvh();
        let sun = Point3f::new(10.0, 0.0, 0.0);
        let mut mask = vec![false; target.num_faces()];
        update_illumination(&mut mask, &target, &sun, false).unwrap();
        assert!(mask.iter().any(|&l| l));

        let status = apply_eclipse_shadowing(
            &mut mask,
            &target,
            &occluder,
            &sun,
            &Point3f::new(5.0, 0.0, 0.0),
            &Matrix3x3::identity(),
        )
        .unwrap();
        assert_eq!(status, EclipseStatus::TotalEclipse);
        assert!(mask.iter().all(|&l| !l));
    }

    #[test]
    fn test_eclipse_partial() {
        // Unit-cube target: with the sun along +x exactly two faces are
        // lit, centered at y = ±1/6. A cube's corners are all equidistant
        // from its center, so the occluder's sphere screens coincide; the
        // offset below puts one sun ray inside that sphere and the other
        // outside it.
        let target = scaled_cube(1.0);
        let mut occluder = scaled_cube(0.5);
        occluder.build_bvh();
        let sun = Point3f::new(10.0, 0.0, 0.0);
        let mut mask = vec![false; target.num_faces()];
        update_illumination(&mut mask, &target, &sun, false).unwrap();
        assert_eq!(mask.iter().filter(|&&l| l).count(), 2);

        let status = apply_eclipse_shadowing(
            &mut mask,
            &target,
            &occluder,
            &sun,
            &Point3f::new(5.0, 0.4, 0.0),
            &Matrix3x3::identity(),
        )
        .unwrap();
        assert_eq!(status, EclipseStatus::PartialEclipse);
        let lit = mask.iter().filter(|&&l| l).count();
        assert!(lit > 0 && lit < target.num_faces());
    }

    /// A square plate fanned around a center node, lying in the xy-plane
    /// of its own frame. The center node keeps the inscribed radius at
    /// zero, so shadowing always goes through the mesh test.
    fn plate() -> ShapeModel {
        let nodes = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(2.0, 0.0, 0.0),
            Point3f::new(0.0, 2.0, 0.0),
            Point3f::new(-2.0, 0.0, 0.0),
            Point3f::new(0.0, -2.0, 0.0),
        ];
        let faces = vec![[0, 1, 2], [0, 2, 3], [0, 3, 4], [0, 4, 1]];
        ShapeModel::new(nodes, faces).unwrap()
    }

    #[test]
    fn test_eclipse_occluder_frame_rotation_matters() {
        // The plate blocks the sun only when the frame rotation turns it
        // face-on to the sun rays; edge-on (identity) it cannot shadow.
        let target = scaled_cube(0.1);
        let mut occluder = plate();
        occluder.build_bvh();
        let sun = Point3f::new(10.0, 0.0, 0.0);
        let occluder_pos = Point3f::new(5.0, 0.0, 0.0);

        let mut mask = vec![false; target.num_faces()];
        update_illumination(&mut mask, &target, &sun, false).unwrap();
        let lit_before = mask.clone();

        let status = apply_eclipse_shadowing(
            &mut mask,
            &target,
            &occluder,
            &sun,
            &occluder_pos,
            &Matrix3x3::identity(),
        )
        .unwrap();
        assert_eq!(status, EclipseStatus::NoEclipse);
        assert_eq!(mask, lit_before);

        // Maps the target-frame +x direction onto the occluder-frame +z.
        let rot = Matrix3x3::from_rows([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]);
        let status = apply_eclipse_shadowing(
            &mut mask,
            &target,
            &occluder,
            &sun,
            &occluder_pos,
            &rot,
        )
        .unwrap();
        assert_eq!(status, EclipseStatus::TotalEclipse);
        assert!(mask.iter().all(|&l| !l));
    }
}
