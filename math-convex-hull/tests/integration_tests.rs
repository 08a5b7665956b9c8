//! Integration tests for convex hull and facet normal computation

use directories::ProjectDirs;
use math_convex_hull::{ConvexHull3D, ConvexHullError, Vertex, export_obj, testdata};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::PathBuf;

/// Get the output directory using the directories crate
fn get_data_dir() -> PathBuf {
    let proj_dirs = ProjectDirs::from("org", "planeseg", "math-plane-extraction")
        .expect("Failed to determine project directories");

    proj_dirs.cache_dir().join("convexhull3d")
}

/// Build a hull and check the properties every hull must satisfy
fn build_and_check(name: &str, vertices: &[Vertex], expected_min_faces: usize) -> ConvexHull3D {
    let hull = ConvexHull3D::build(vertices).expect("Failed to build convex hull");

    println!(
        "{}: {} input vertices -> {} hull vertices, {} faces, V={:.6}, A={:.6}",
        name,
        vertices.len(),
        hull.num_vertices(),
        hull.num_faces(),
        hull.volume(),
        hull.surface_area()
    );

    assert!(
        hull.num_faces() >= expected_min_faces,
        "Expected at least {} faces, got {}",
        expected_min_faces,
        hull.num_faces()
    );
    assert!(hull.volume() > 0.0, "Volume must be positive");
    assert!(hull.surface_area() > 0.0, "Surface area must be positive");

    // Euler: a closed triangulated sphere has F = 2V - 4
    assert_eq!(hull.num_faces(), 2 * hull.num_vertices() - 4);

    for p in vertices {
        assert!(
            hull.contains(p, 1e-9),
            "{}: point {} is {} outside the hull",
            name,
            p,
            hull.max_face_distance(p)
        );
    }

    let closure = hull.area_weighted_normal_sum();
    assert!(
        closure.magnitude() < 1e-9 * hull.surface_area().max(1.0),
        "{}: area-weighted normals sum to {}",
        name,
        closure
    );

    hull
}

#[test]
fn test_tetrahedron() {
    let hull = build_and_check("tetrahedron", &testdata::tetrahedron_vertices(), 4);
    assert_eq!(hull.num_faces(), 4);
}

#[test]
fn test_cube() {
    let hull = build_and_check("cube", &testdata::cube_vertices(2.0), 12);
    assert_eq!(hull.num_faces(), 12);
    assert!((hull.volume() - 8.0).abs() < 1e-9);
    assert!((hull.surface_area() - 24.0).abs() < 1e-9);
}

#[test]
fn test_fibonacci_sphere_840() {
    build_and_check("fib_sph_840", &testdata::fibonacci_sphere_points(840, 1.0), 500);
}

#[test]
fn test_box_with_interior_1000() {
    let mut rng = StdRng::seed_from_u64(5);
    let vertices = testdata::box_with_interior_points(2.0, 1000, &mut rng);
    let hull = build_and_check("box_interior_1000", &vertices, 12);
    assert_eq!(hull.num_vertices(), 8);
    assert!((hull.volume() - 8.0).abs() < 1e-9);
}

#[test]
fn test_planar_slab() {
    // The shape of a plane region's inliers: thin but with volume
    let mut rng = StdRng::seed_from_u64(11);
    let vertices = testdata::planar_slab_points(1000, 2.0, 1.0, 0.02, &mut rng);
    let hull = build_and_check("planar_slab", &vertices, 4);

    // Most of the outer surface faces straight up or down
    let facets: Vec<_> = hull.facets().into_iter().filter_map(Result::ok).collect();
    let flat_area: f64 = facets
        .iter()
        .filter(|f| f.normal.z.abs() > 0.8)
        .map(|f| f.area)
        .sum();
    assert!(flat_area > 0.8 * hull.surface_area());
}

#[test]
fn test_tilted_slab() {
    let tilt = 0.3_f64;
    let normal = Vertex::new(0.0, -tilt.sin(), tilt.cos());
    let mut rng = StdRng::seed_from_u64(12);
    let vertices = testdata::tilted_slab_points(800, 1.5, 1.0, 0.02, tilt, &mut rng);
    let hull = build_and_check("tilted_slab", &vertices, 4);

    // The two large faces carry most of the area and follow the slab normal
    let aligned_area: f64 = hull
        .facets()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|f| f.normal.dot(&normal).abs() > 0.8)
        .map(|f| f.area)
        .sum();
    assert!(aligned_area > 0.8 * hull.surface_area());
}

#[test]
fn test_facet_normals_point_outward() {
    let hull = build_and_check("fib_sph_120", &testdata::fibonacci_sphere_points(120, 1.5), 200);
    let inside = hull.interior_point();

    for facet in hull.facets() {
        let facet = facet.expect("sphere faces are not degenerate");
        assert!((facet.normal.magnitude() - 1.0).abs() < 1e-12);
        assert!(facet.normal.dot(&facet.centroid.sub(&inside)) > 0.0);
    }
}

#[test]
fn test_flat_input_is_rejected() {
    let vertices: Vec<Vertex> = (0..100)
        .map(|i| Vertex::new((i % 10) as f64 * 0.1, (i / 10) as f64 * 0.1, 0.5))
        .collect();

    let err = ConvexHull3D::build(&vertices).unwrap_err();
    assert!(matches!(err, ConvexHullError::DegenerateConfiguration));
    assert!(err.is_degenerate());
}

#[test]
fn test_export_obj() {
    let hull = build_and_check("cube", &testdata::cube_vertices(2.0), 12);

    let output_dir = get_data_dir();
    fs::create_dir_all(&output_dir).unwrap();
    let obj_path = output_dir.join("convhull_cube.obj");
    export_obj(&hull, &obj_path).expect("Failed to export OBJ");

    let contents = fs::read_to_string(&obj_path).unwrap();
    assert_eq!(contents.lines().filter(|l| l.starts_with("vn ")).count(), 12);
    assert_eq!(contents.lines().filter(|l| l.starts_with("f ")).count(), 12);

    let reloaded = testdata::load_obj_vertices(&obj_path).unwrap();
    assert_eq!(reloaded.len(), hull.num_vertices());
}
