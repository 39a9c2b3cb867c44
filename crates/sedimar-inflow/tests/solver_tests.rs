//! The constant-slope discharge scenario: a single-class hyperpycnal
//! flow on a uniform 1:100 dipping bed, run for one day over bare rock.

use sedimar_inflow::{inflow, BathymetryLine, FloodPacket, InflowConstants, InflowSediment};

const DAY: f64 = 86_400.0;

fn scenario_bathymetry() -> BathymetryLine {
    let n = 10;
    let dx = 100.0;
    BathymetryLine {
        x: (0..n).map(|i| i as f64 * dx).collect(),
        slope: vec![-0.01; n],
        width: vec![1.0; n],
        dx,
        x_dep: 0.0,
    }
}

fn scenario_constants() -> InflowConstants {
    InflowConstants {
        ea: 0.00153,
        eb: 0.00204,
        sua: 30.0,
        sub: 0.2,
        cd: 0.004,
        internal_friction_angle: 32.0,
        mu: 1.3e-6,
        rho_sea_water: 1028.0,
        rho_river_water: 1000.0,
    }
}

fn scenario_sediment() -> InflowSediment {
    InflowSediment {
        diameter: vec![1000e-6],
        lambda: vec![1.0 / DAY],
        rho_sed: vec![1600.0],
        rho_grain: vec![2650.0],
    }
}

fn scenario_flood() -> FloodPacket {
    FloodPacket {
        duration: DAY,
        width: 100.0,
        depth: 2.0,
        velocity: 1.0,
        discharge: 100.0,
        fraction: vec![1.0],
        rho_river_water: 1000.0,
        rho_flow: 1050.0,
    }
}

#[test]
fn discharge_on_constant_slope() {
    let result = inflow(
        DAY,
        &scenario_bathymetry(),
        &scenario_flood(),
        &scenario_sediment(),
        &scenario_constants(),
        |query| {
            // bare rock: nothing to erode
            query.erode_depth = 0.0;
            query.fraction.fill(1.0);
        },
    )
    .unwrap();

    assert_eq!(result.nodes_run, 10);
    assert!(result.final_velocity >= 0.01);

    // deposit everywhere, thinning down-flow
    let deposit = &result.deposit[0];
    for (i, &d) in deposit.iter().enumerate() {
        assert!(d > 0.0, "no deposit at node {}", i);
    }
    for i in 1..deposit.len() {
        assert!(
            deposit[i] <= deposit[i - 1] * (1.0 + 1e-9),
            "deposit grew down-flow at node {}",
            i
        );
    }

    // the flow cannot drop more than it carried in
    assert!(result.mass_deposited <= result.mass_in * (1.0 + 1e-9));
    assert!(result.mass_eroded.abs() < 1e-12);
}

#[test]
fn flow_accelerates_down_the_dip() {
    // with a steady supply of negative slope the gravity term beats the
    // drag terms at these concentrations
    let result = inflow(
        DAY,
        &scenario_bathymetry(),
        &scenario_flood(),
        &scenario_sediment(),
        &scenario_constants(),
        |query| {
            query.erode_depth = 0.0;
            query.fraction.fill(1.0);
        },
    )
    .unwrap();
    assert!(result.final_velocity > 1.0);
}

#[test]
fn erodible_bed_feeds_the_flow() {
    let erodible = inflow(
        DAY,
        &scenario_bathymetry(),
        &scenario_flood(),
        &scenario_sediment(),
        &scenario_constants(),
        |query| {
            // the bed yields everything the shear stress asks for
            query.fraction.fill(1.0);
        },
    )
    .unwrap();

    assert!(erodible.mass_eroded > 0.0);
    for (i, &e) in erodible.erosion[0].iter().enumerate() {
        assert!(e >= 0.0, "negative erosion at node {}", i);
    }
}
