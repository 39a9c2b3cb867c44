//! Failure triggering on a profile with a localized high-relief patch:
//! the weakest arc fires, the removed mass matches the carved cube, and
//! the clay content routes the mass to the right flow process.

use sedimar_core::{Cell, Cube, Facies, Sediment};
use sedimar_failure::{
    run_failures, FailProfile, FailureConstants, FlowKind, PorePressureMode,
};

/// A shelf with an oversteepened sediment nose between columns 8 and 20.
fn steep_profile(fractions: Vec<f64>) -> Cube {
    let n = 40;
    let mut cube = Cube::new_profile("steep", n, 10.0, 0.5);
    for j in 0..n {
        let col = cube.col_1d_mut(j).unwrap();
        col.set_base_height(-60.0);
        let thickness = if j < 8 {
            40.0
        } else if j < 20 {
            40.0 - 3.2 * (j as f64 - 8.0)
        } else {
            1.6
        };
        col.add_cell(Cell::with_fractions(
            thickness,
            fractions.clone(),
            0.0,
            Facies::RIVER,
        ));
    }
    cube.set_sea_level(0.0);
    cube
}

fn scenario_constants() -> FailureConstants {
    // rapidly deposited, weakly consolidated sediment: the global pore
    // pressure model erases almost all frictional strength
    let mut consts = FailureConstants::new(1e-6, 1000.0, 30.0, 40.0).unwrap();
    consts.pore_pressure_mode = PorePressureMode::Global;
    consts
}

#[test]
fn weak_nose_fails_and_mass_is_conserved() {
    let sediment = Sediment::default_classes();
    let mut cube = steep_profile(vec![0.25, 0.25, 0.25, 0.25]);
    let mass_before = cube.mass(&sediment);

    let mut profile = FailProfile::new(&cube, &sediment, scenario_constants()).unwrap();
    let triggered = run_failures(&mut cube, &mut profile, &sediment).unwrap();

    assert!(!triggered.is_empty(), "the oversteepened nose must fail");
    for failure in &triggered {
        assert!(failure.factor_of_safety < 1.0);
        assert!(failure.len >= 5);
        assert!(failure.mass.mass(&sediment) > 0.0);
        assert!(failure.tsunami.amplitude.is_finite());
    }

    // the mass carved into failure cubes is exactly the mass that left
    // the profile
    let mass_after = cube.mass(&sediment);
    let removed: f64 = triggered.iter().map(|f| f.mass.mass(&sediment)).sum();
    assert!(
        ((mass_before - mass_after) - removed).abs() / mass_before < 1e-9,
        "removed {} vs profile change {}",
        removed,
        mass_before - mass_after
    );
}

#[test]
fn muddy_failures_run_as_debris_flows() {
    let sediment = Sediment::default_classes();
    // class 3 of the default table is clay-sized
    let mut cube = steep_profile(vec![0.1, 0.2, 0.2, 0.5]);
    let mut profile = FailProfile::new(&cube, &sediment, scenario_constants()).unwrap();
    let triggered = run_failures(&mut cube, &mut profile, &sediment).unwrap();

    assert!(!triggered.is_empty());
    for failure in &triggered {
        assert_eq!(failure.kind, FlowKind::DebrisFlow);
    }
}

#[test]
fn sandy_failures_run_as_turbidity_currents() {
    let sediment = Sediment::default_classes();
    let mut cube = steep_profile(vec![0.6, 0.3, 0.05, 0.05]);
    let mut profile = FailProfile::new(&cube, &sediment, scenario_constants()).unwrap();
    let triggered = run_failures(&mut cube, &mut profile, &sediment).unwrap();

    assert!(!triggered.is_empty());
    for failure in &triggered {
        assert_eq!(failure.kind, FlowKind::TurbidityCurrent);
    }
}

#[test]
fn stable_shelf_stays_put() {
    let sediment = Sediment::default_classes();
    // gentle uniform drape, local pore pressures: nothing to trigger
    let n = 40;
    let mut cube = Cube::new_profile("gentle", n, 10.0, 0.5);
    for j in 0..n {
        let col = cube.col_1d_mut(j).unwrap();
        col.set_base_height(-30.0 - 0.05 * j as f64);
        col.add_cell(Cell::with_fractions(
            2.0,
            vec![0.25, 0.25, 0.25, 0.25],
            0.0,
            Facies::RIVER,
        ));
    }
    cube.set_sea_level(0.0);

    let consts = FailureConstants::new(1e-6, 1000.0, 30.0, 40.0).unwrap();
    let mut profile = FailProfile::new(&cube, &sediment, consts).unwrap();
    let triggered = run_failures(&mut cube, &mut profile, &sediment).unwrap();
    assert!(triggered.is_empty());
}
