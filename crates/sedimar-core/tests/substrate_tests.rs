//! Substrate invariants over mixed workloads: thickness bookkeeping,
//! fraction normalization, rebin idempotence and removal round-trips.

use sedimar_core::{Cell, Column, Cube, Facies, Sediment};

fn sediment() -> Sediment {
    Sediment::default_classes()
}

fn busy_column() -> Column {
    let mut col = Column::new(0.0, 0.0, -200.0, 0.5);
    let layers: [(f64, [f64; 4], f64, Facies); 5] = [
        (1.7, [0.7, 0.2, 0.1, 0.0], 10.0, Facies::RIVER),
        (0.3, [0.1, 0.5, 0.3, 0.1], 55.0, Facies::PLUME),
        (2.2, [0.0, 0.1, 0.4, 0.5], 120.0, Facies::TURBIDITE),
        (0.05, [0.25, 0.25, 0.25, 0.25], 121.0, Facies::TURBIDITE),
        (0.9, [0.9, 0.1, 0.0, 0.0], 300.0, Facies::BEDLOAD),
    ];
    for (t, f, age, facies) in layers {
        col.add_cell(Cell::with_fractions(t, f.to_vec(), age, facies));
    }
    col
}

#[test]
fn thickness_always_matches_height_difference() {
    let col = busy_column();
    let sum: f64 = col.cells().iter().map(Cell::thickness).sum();
    assert!((col.top_height() - col.base_height() - sum).abs() < 1e-6);
}

#[test]
fn fractions_stay_normalized_through_mutations() {
    let mut col = busy_column();
    col.remove_top(1.3).unwrap();
    col.add_cell(Cell::from_amounts(
        &[0.2, 0.0, 0.4, 0.1],
        400.0,
        Facies::DIFFUSED,
    ));
    col.rebin();

    for cell in col.cells() {
        let sum: f64 = cell.fraction().iter().sum();
        assert!((sum - 1.0).abs() <= 1e-9, "fraction sum {}", sum);
        for &f in cell.fraction() {
            assert!((0.0..=1.0).contains(&f));
        }
    }
}

#[test]
fn ages_never_decrease_upward() {
    let col = busy_column();
    let mut last_age = f64::NEG_INFINITY;
    for cell in col.cells() {
        assert!(cell.age() >= last_age);
        last_age = cell.age();
    }
}

#[test]
fn rebin_is_idempotent() {
    let sed = sediment();
    let mut col = busy_column();
    col.rebin();
    let once = col.clone();
    col.rebin();

    assert_eq!(col.len(), once.len());
    for (a, b) in col.cells().iter().zip(once.cells()) {
        assert_eq!(a.thickness(), b.thickness());
        assert_eq!(a.fraction(), b.fraction());
    }
    assert!((col.mass(&sed) - once.mass(&sed)).abs() < 1e-9);
}

#[test]
fn remove_and_restore_round_trips() {
    let mut col = busy_column();
    let thickness_before = col.thickness();
    let top_fractions: Vec<f64> = col.top_cell().unwrap().fraction().to_vec();

    let bundle = col.remove_top(0.4).unwrap();
    col.add_cell(bundle);

    assert!((col.thickness() - thickness_before).abs() < 1e-6);
    for (a, b) in top_fractions.iter().zip(col.top_cell().unwrap().fraction()) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn extract_into_caller_cell_matches_remove() {
    let mut a = busy_column();
    let mut b = busy_column();

    let removed = a.remove_top(1.1).unwrap();
    let mut out = Cell::new(4);
    b.extract_top(1.1, &mut out).unwrap();

    assert!((removed.thickness() - out.thickness()).abs() < 1e-9);
    for (x, y) in removed.fraction().iter().zip(out.fraction()) {
        assert!((x - y).abs() < 1e-9);
    }
    assert!((a.thickness() - b.thickness()).abs() < 1e-12);
}

#[test]
fn cube_mass_tracks_column_mass() {
    let sed = sediment();
    let mut cube = Cube::new_profile("mass", 8, 50.0, 0.5);
    let mut by_hand = 0.0;
    for j in 0..8 {
        let col = cube.col_1d_mut(j).unwrap();
        col.set_base_height(-10.0);
        col.add_cell(Cell::with_fractions(
            1.0 + j as f64 * 0.1,
            vec![0.25, 0.25, 0.25, 0.25],
            0.0,
            Facies::RIVER,
        ));
        by_hand += cube.col(0, j).unwrap().mass(&sed) * 50.0 * 50.0;
    }
    assert!((cube.mass(&sed) - by_hand).abs() / by_hand < 1e-12);
}

#[test]
fn suspension_grid_resets_to_zero_mass() {
    let sed = sediment();
    let mut cube = Cube::new_profile("susp", 6, 50.0, 0.5);
    cube.add_trunk(
        sedimar_core::River::new(
            "r",
            sedimar_core::Hydro::new(sed.n_suspended()),
            sedimar_core::HingePoint::new(0, 0),
        ),
        sed.len(),
    );

    let grid = cube.in_suspension_mut(0).unwrap();
    grid.cell_mut(0, -3)
        .unwrap()
        .add(&Cell::with_fractions(0.5, vec![0.25; 4], 0.0, Facies::PLUME));
    assert!(cube.mass_in_suspension(&sed) > 0.0);

    cube.in_suspension_mut(0).unwrap().reset();
    assert_eq!(cube.mass_in_suspension(&sed), 0.0);
}
