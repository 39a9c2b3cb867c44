//! Driving both models through the trait object surface, the way the
//! orchestrator does.

use sedimar_bmi::{avulsion_model, subside_model, AvulsionModel, BmiModel, SubsideModel};

fn init_tracing() {
    use std::sync::Once;
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .try_init();
    });
}

#[test]
fn models_drive_through_the_trait() {
    init_tracing();
    let mut models: Vec<Box<dyn BmiModel>> = vec![
        Box::new(AvulsionModel::initialize(None).unwrap()),
        Box::new(SubsideModel::initialize(None).unwrap()),
    ];

    for model in &mut models {
        assert_eq!(model.current_time(), model.start_time());
        model.update().unwrap();
        assert!(model.current_time() > model.start_time());
        assert!(model.end_time() > model.current_time());
        assert_eq!(model.time_units(), "d");

        for name in model.output_var_names() {
            assert_eq!(model.var_type(name).unwrap(), "double");
            let grid = model.var_grid(name).unwrap();
            assert!((0..=2).contains(&grid));
            let size = model.grid_size(name).unwrap();
            assert!(size >= 1);
            let mut buffer = vec![0.0; size];
            model.get_value(name, &mut buffer).unwrap();
        }

        model.finalize().unwrap();
    }
}

#[test]
fn bad_names_leave_state_untouched() {
    init_tracing();
    let mut model = AvulsionModel::initialize(None).unwrap();
    let before = model.current_time();

    assert!(model.get_value_ref("surface__temperature").is_err());
    assert!(model.set_value("surface__temperature", &[1.0]).is_err());
    assert_eq!(model.current_time(), before);
}

#[test]
fn grid_shape_convention_is_rows_then_cols() {
    init_tracing();
    let avulsion = AvulsionModel::initialize(None).unwrap();
    let shape = avulsion
        .grid_shape(avulsion_model::SURFACE_ELEVATION)
        .unwrap();
    // (rows, cols) = (n_x, n_y); the default grid is 30 x 40
    assert_eq!(shape, vec![30, 40]);

    let subside = SubsideModel::initialize(None).unwrap();
    let shape = subside.grid_shape(subside_model::DEFLECTION).unwrap();
    assert_eq!(shape, vec![100, 200]);
}

#[test]
fn subside_reads_key_value_configuration() {
    init_tracing();
    let dir = std::env::temp_dir();
    let path = dir.join("sedimar-subside-test.cfg");
    std::fs::write(
        &path,
        "effective elastic thickness : 10000\n\
         Youngs modulus : 7e10\n\
         relaxation time : 5000\n\
         grid shape : 10, 20\n\
         grid spacing : 500, 500\n",
    )
    .unwrap();

    let model = SubsideModel::initialize(Some(&path)).unwrap();
    assert_eq!(model.grid_shape(subside_model::DEFLECTION).unwrap(), vec![
        10, 20
    ]);
    assert_eq!(model.isostasy().eet, 10000.0);
    assert_eq!(model.isostasy().relaxation_time, 5000.0);

    let _ = std::fs::remove_file(&path);
}
