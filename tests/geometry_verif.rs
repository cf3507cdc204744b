use std::f64::consts::FRAC_PI_2;

use approx::assert_abs_diff_eq;
use glam::DVec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use potflow_rs::discretization::{Geometry, GeometryError, Line, Rectangle};

#[test]
fn rectangle_samples_respect_sdf() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    // a rotated, shifted box still samples on its own boundary
    let rect = Rectangle::new((-0.3, -0.2), (0.3, 0.2))
        .unwrap()
        .rotate(0.4)
        .translate((1.0, -2.0));

    for b in rect.sample_boundary(&mut rng, 500).unwrap() {
        assert_abs_diff_eq!(rect.sdf(b.point), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b.normal.length(), 1.0, epsilon = 1e-12);
        // stepping along the outward normal leaves the box
        assert!(rect.sdf(b.point + 1e-3 * b.normal) > 0.0);
    }
    for p in rect.sample_interior(&mut rng, 500).unwrap() {
        assert!(rect.sdf(p) < 0.0);
    }
    assert_abs_diff_eq!(rect.area(), 0.24, epsilon = 1e-12);
    assert_abs_diff_eq!(rect.boundary_measure(), 2.0, epsilon = 1e-12);
}

#[test]
fn line_rotation_round_trip() {
    let line = Line::new((0.2, -0.1), (0.5, 0.7), -1.0).unwrap();
    let back = line.rotate(1.1).rotate(-1.1);

    let mut a = ChaCha8Rng::seed_from_u64(7);
    let mut b = ChaCha8Rng::seed_from_u64(7);
    let original = line.sample_boundary(&mut a, 100).unwrap();
    let restored = back.sample_boundary(&mut b, 100).unwrap();
    for (p, q) in original.iter().zip(&restored) {
        assert_abs_diff_eq!(p.point.distance(q.point), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.normal.distance(q.normal), 0.0, epsilon = 1e-12);
    }
}

#[test]
fn flat_plate_layout() {
    let l = 0.10;
    let obstacle = Line::new((0.0, 0.0), (0.0, l), 1.0).unwrap().rotate(FRAC_PI_2);
    let (start, end) = obstacle.endpoints();
    assert_abs_diff_eq!(start.distance(DVec2::ZERO), 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(end.distance(DVec2::new(-l, 0.0)), 0.0, epsilon = 1e-9);
    // the +x normal of the upright segment now points up
    assert_abs_diff_eq!(obstacle.normal().distance(DVec2::Y), 0.0, epsilon = 1e-12);

    assert!(obstacle.on_boundary(DVec2::new(-0.05, 0.0), 1e-9));
    assert!(!obstacle.on_boundary(DVec2::new(0.05, 0.0), 1e-9));
    assert_abs_diff_eq!(obstacle.sdf(DVec2::new(-0.05, 0.02)), 0.02, epsilon = 1e-12);
}

#[test]
fn degenerate_shapes_are_rejected() {
    assert!(matches!(
        Line::new((1.0, 1.0), (1.0, 1.0), 1.0),
        Err(GeometryError::ZeroLength { .. })
    ));
    assert!(matches!(
        Line::new((0.0, 0.0), (1.0, 0.0), 0.5),
        Err(GeometryError::InvalidNormalSign(_))
    ));
    assert!(matches!(
        Rectangle::new((0.0, 0.0), (1.0, 0.0)),
        Err(GeometryError::ZeroArea { .. })
    ));
    assert!(matches!(
        Rectangle::new((0.0, f64::NAN), (1.0, 1.0)),
        Err(GeometryError::NonFinite(_))
    ));
}

#[test]
fn boundary_points_spread_by_edge_length() {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let rect = Rectangle::new((-0.3, -0.1), (0.3, 0.1)).unwrap();
    let samples = rect.sample_boundary(&mut rng, 10_000).unwrap();

    // bottom, right, top, left
    let normals = [DVec2::NEG_Y, DVec2::X, DVec2::Y, DVec2::NEG_X];
    let mut counts = [0usize; 4];
    for b in &samples {
        let edge = normals
            .iter()
            .position(|n| n.distance(b.normal) < 1e-9)
            .unwrap_or_else(|| panic!("unexpected normal {:?}", b.normal));
        counts[edge] += 1;
    }

    let total = samples.len() as f64;
    for (count, expected) in counts.iter().zip([0.375, 0.125, 0.375, 0.125]) {
        assert_abs_diff_eq!(*count as f64 / total, expected, epsilon = 0.02);
    }
}
