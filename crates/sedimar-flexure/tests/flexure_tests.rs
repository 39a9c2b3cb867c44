//! Integration tests for the flexure kernel: the 1-D point-load
//! scenario plus translation-invariance and linearity of the response.

use sedimar_core::{Grid, G, RHO_MANTLE};
use sedimar_flexure::{flexure_parameter, Isostasy};

const EET: f64 = 25e3;
const YOUNGS: f64 = 7e10;

#[test]
fn point_load_on_a_profile() {
    // 101 nodes at 1 km spacing, 1e12 N at y = 50 km
    let iso = Isostasy::new(EET, YOUNGS).unwrap();
    let alpha = iso.alpha(1);
    let q = 1e12;
    let y: Vec<f64> = (0..101).map(|j| j as f64 * 1000.0).collect();
    let mut w = vec![0.0; 101];
    iso.point_load_1d(&mut w, &y, q, 50_000.0);

    let expected_peak = q * alpha / (2.0 * RHO_MANTLE * G);
    assert!(
        (w[50] - expected_peak).abs() / expected_peak < 1e-9,
        "peak {} expected {}",
        w[50],
        expected_peak
    );

    // symmetric about the load
    for k in 0..50 {
        assert!((w[50 - k] - w[50 + k]).abs() / expected_peak < 1e-9);
    }
}

#[test]
fn deflection_vanishes_far_from_the_load() {
    let iso = Isostasy::new(EET, YOUNGS).unwrap();
    let alpha = iso.alpha(1);
    let q = 1e12;
    // span ten flexure wavelengths either side of the load
    let y_load = 10.0 * alpha;
    let n = 2001;
    let dy = 20.0 * alpha / n as f64;
    let y: Vec<f64> = (0..n).map(|j| j as f64 * dy).collect();
    let mut w = vec![0.0; n];
    iso.point_load_1d(&mut w, &y, q, y_load);

    // the kernel e^{-r}(cos r + sin r) bottoms out near -2.6% of the
    // peak around r = 4 alpha and only falls under 1e-3 past r ~ 7.3
    let peak = q * alpha / (2.0 * RHO_MANTLE * G);
    for (&yj, &wj) in y.iter().zip(&w) {
        let r = (yj - y_load).abs() / alpha;
        if r >= 4.0 {
            assert!(
                wj.abs() <= 0.03 * peak,
                "deflection {} of peak at r = {} alpha",
                wj / peak,
                r
            );
        }
        if r >= 8.0 {
            assert!(
                wj.abs() <= 1e-3 * peak,
                "deflection {} of peak at r = {} alpha",
                wj / peak,
                r
            );
        }
    }
}

#[test]
fn response_is_translation_invariant() {
    let iso = Isostasy::new(EET, YOUNGS).unwrap();
    let y: Vec<f64> = (0..200).map(|j| j as f64 * 1000.0).collect();
    let q = 5e11;

    let mut w_a = vec![0.0; 200];
    iso.point_load_1d(&mut w_a, &y, q, 40_000.0);
    let mut w_b = vec![0.0; 200];
    iso.point_load_1d(&mut w_b, &y, q, 70_000.0);

    // w(load at 40 km, seen at 40 + r) == w(load at 70 km, seen at 70 + r)
    for k in 0..100 {
        assert!((w_a[40 + k] - w_b[70 + k]).abs() < 1e-12 * q);
    }
}

#[test]
fn response_is_linear_in_the_load() {
    let iso = Isostasy::new(EET, YOUNGS).unwrap();
    let y: Vec<f64> = (0..100).map(|j| j as f64 * 1000.0).collect();

    let mut w_single = vec![0.0; 100];
    iso.point_load_1d(&mut w_single, &y, 1e12, 50_000.0);

    let mut w_double = vec![0.0; 100];
    iso.point_load_1d(&mut w_double, &y, 1e12, 50_000.0);
    iso.point_load_1d(&mut w_double, &y, 1e12, 50_000.0);

    for (a, b) in w_single.iter().zip(&w_double) {
        assert!((2.0 * a - b).abs() <= 1e-9 * a.abs().max(1e-30));
    }
}

#[test]
fn grid_convolution_matches_point_superposition() {
    let iso = Isostasy::new(EET, YOUNGS).unwrap();
    let (n_x, n_y) = (8, 12);
    let (dx, dy) = (2000.0, 2000.0);

    let mut load: Grid<f64> = Grid::new(n_x, n_y);
    load[(3, 4)] = 2.5e6;
    load[(6, 9)] = 1.0e6;

    let mut w_grid: Grid<f64> = Grid::new(n_x, n_y);
    iso.grid_load(&mut w_grid, &load, dx, dy).unwrap();

    // superpose the two point responses by hand
    let x: Vec<f64> = (0..n_x).map(|i| i as f64 * dx).collect();
    let y: Vec<f64> = (0..n_y).map(|j| j as f64 * dy).collect();
    let mut w_ref: Grid<f64> = Grid::new(n_x, n_y);
    iso.point_load_2d(&mut w_ref, &x, &y, 2.5e6 * dx * dy, x[3], y[4]);
    iso.point_load_2d(&mut w_ref, &x, &y, 1.0e6 * dx * dy, x[6], y[9]);

    for i in 0..n_x {
        for j in 0..n_y {
            let (a, b) = (w_grid[(i, j)], w_ref[(i, j)]);
            assert!(
                (a - b).abs() <= 1e-9 * b.abs().max(1e-12),
                "mismatch at ({}, {}): {} vs {}",
                i,
                j,
                a,
                b
            );
        }
    }
}

#[test]
fn two_dimensional_peak_sits_under_the_load() {
    let iso = Isostasy::new(EET, YOUNGS).unwrap();
    let alpha = flexure_parameter(EET, YOUNGS, 2);
    let n = 21;
    let spacing = alpha / 4.0;
    let x: Vec<f64> = (0..n).map(|i| i as f64 * spacing).collect();
    let mut w: Grid<f64> = Grid::new(n, n);
    iso.point_load_2d(&mut w, &x, &x, 1e14, x[10], x[10]);

    let peak = w[(10, 10)];
    assert!(peak > 0.0);
    for i in 0..n {
        for j in 0..n {
            assert!(w[(i, j)] <= peak + 1e-12);
        }
    }
}
