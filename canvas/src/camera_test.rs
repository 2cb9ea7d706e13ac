#![allow(clippy::clone_on_copy, clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

fn cam(pan_x: f64, pan_y: f64, zoom: f64) -> Camera {
    Camera { pan_x, pan_y, zoom }
}

// =============================================================
// Point
// =============================================================

#[test]
fn point_sub_is_componentwise() {
    let d = Point::new(10.0, 4.0) - Point::new(3.0, 6.0);
    assert_eq!(d, Point::new(7.0, -2.0));
}

#[test]
fn point_distance_is_euclidean() {
    assert!(approx_eq(Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0));
}

// =============================================================
// Conversions
// =============================================================

#[test]
fn identity_camera_maps_points_unchanged() {
    let c = Camera::default();
    let p = Point::new(12.5, -40.0);
    assert_eq!(c.screen_to_world(p), p);
    assert_eq!(c.world_to_screen(p), p);
}

#[test]
fn screen_to_world_subtracts_pan_then_divides_by_zoom() {
    let c = cam(100.0, 50.0, 2.0);
    let w = c.screen_to_world(Point::new(300.0, 250.0));
    assert!(point_approx_eq(w, Point::new(100.0, 100.0)));
}

#[test]
fn world_to_screen_scales_then_adds_pan() {
    let c = cam(100.0, 50.0, 2.0);
    let s = c.world_to_screen(Point::new(100.0, 100.0));
    assert!(point_approx_eq(s, Point::new(300.0, 250.0)));
}

#[test]
fn round_trip_holds_across_pans_and_zooms() {
    let pans = [(0.0, 0.0), (120.0, -80.0), (-3000.5, 999.25)];
    let zooms = [0.25, 0.5, 1.0, 1.75, 3.0];
    let points = [Point::new(0.0, 0.0), Point::new(17.3, -42.9), Point::new(-1e4, 2e4)];
    for (px, py) in pans {
        for zoom in zooms {
            let c = cam(px, py, zoom);
            for p in points {
                assert!(point_approx_eq(c.screen_to_world(c.world_to_screen(p)), p));
                assert!(point_approx_eq(c.world_to_screen(c.screen_to_world(p)), p));
            }
        }
    }
}

#[test]
fn screen_dist_to_world_divides_by_zoom() {
    assert!(approx_eq(cam(0.0, 0.0, 2.0).screen_dist_to_world(40.0), 20.0));
    assert!(approx_eq(cam(0.0, 0.0, 0.5).screen_dist_to_world(40.0), 80.0));
}

// =============================================================
// Zoom and pan
// =============================================================

#[test]
fn set_zoom_clamps_to_range() {
    let mut c = Camera::default();
    c.set_zoom(10.0);
    assert_eq!(c.zoom, ZOOM_MAX);
    c.set_zoom(0.01);
    assert_eq!(c.zoom, ZOOM_MIN);
    c.set_zoom(f64::NAN);
    assert_eq!(c.zoom, 1.0);
}

#[test]
fn zoom_steps_stay_inside_range() {
    let mut c = Camera::default();
    for _ in 0..100 {
        c.zoom_in();
    }
    assert_eq!(c.zoom, ZOOM_MAX);
    for _ in 0..100 {
        c.zoom_out();
    }
    assert_eq!(c.zoom, ZOOM_MIN);
}

#[test]
fn zoom_at_keeps_anchor_fixed() {
    let mut c = cam(40.0, -20.0, 1.0);
    let screen = Point::new(400.0, 300.0);
    let before = c.screen_to_world(screen);
    c.zoom_at(screen, 2.5);
    assert!(approx_eq(c.zoom, 2.5));
    assert!(point_approx_eq(c.screen_to_world(screen), before));
}

#[test]
fn pan_by_moves_in_screen_pixels_regardless_of_zoom() {
    let mut c = cam(0.0, 0.0, 2.0);
    c.pan_by(10.0, -5.0);
    assert_eq!(c.pan(), Point::new(10.0, -5.0));
}

#[test]
fn reset_restores_identity() {
    let mut c = cam(10.0, 20.0, 2.0);
    c.reset();
    assert_eq!(c.pan(), Point::new(0.0, 0.0));
    assert_eq!(c.zoom, 1.0);
}
