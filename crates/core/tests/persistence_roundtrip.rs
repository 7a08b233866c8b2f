mod common;

use casing_sim_core::simulation::SimulationFile;
use casing_sim_core::{
    Background, CasingParameters, CylMeshSpec, MeshGenerator, ParameterFile, PersistenceError,
    Physics, PhysicsKind, Simulation, SimulationParameters, SourceKind, SourceParameters,
    TensorMeshSpec, Vec3, Waveform,
};
use std::fs;
use std::sync::Arc;

fn layered_casing() -> CasingParameters {
    CasingParameters {
        casing_l: 500.0,
        sigma_back: 0.05,
        mur_casing: 100.0,
        src_a: Vec3::new(0.0, 0.0, -480.0),
        src_b: Vec3::new(800.0, 0.0, -480.0),
        freqs: vec![1.0, 10.0],
        time_steps: vec![(1e-5, 10), (1e-4, 10)],
        background: Background::Halfspace,
        ..Default::default()
    }
}

#[test]
fn test_casing_parameters_roundtrip() {
    let dir = common::scratch_dir("casing_roundtrip");
    let cp = layered_casing();

    let path = cp.save(&dir).unwrap();
    assert_eq!(path, dir.join("ModelParameters.json"));

    let back = CasingParameters::load(&path).unwrap();
    assert_eq!(back, cp);
    assert_eq!(back.casing_z(), cp.casing_z());
}

#[test]
fn test_mesh_generators_roundtrip() {
    let dir = common::scratch_dir("mesh_roundtrip");
    let cp = Arc::new(layered_casing());

    let mut cyl = MeshGenerator::cylindrical(Arc::clone(&cp), CylMeshSpec::default())
        .with_filename("CylMesh.json");
    cyl.set_hy(&[1.0, 1.0, 2.0]).unwrap();
    let tensor = MeshGenerator::tensor(Arc::clone(&cp), TensorMeshSpec::default())
        .with_filename("TensorMesh.json");

    for generator in [cyl, tensor] {
        let path = generator.save(&dir).unwrap();
        let back = MeshGenerator::load(&path).unwrap();
        assert_eq!(back, generator);
        assert!(!back.is_cached());
        assert_eq!(
            back.mesh().unwrap().shape(),
            generator.mesh().unwrap().shape()
        );
    }
}

#[test]
fn test_source_parameters_roundtrip() {
    let dir = common::scratch_dir("source_roundtrip");
    let source = SourceParameters {
        kind: SourceKind::DownHole,
        current: 2.5,
        waveform: Waveform::StepOn,
        ..SourceParameters::default()
    }
    .with_physics(PhysicsKind::Tdem);

    let path = source.save(&dir).unwrap();
    assert_eq!(SourceParameters::load(&path).unwrap(), source);

    let dipole = SourceParameters::dipole(Vec3::new(0.0, 0.0, -10.0), Vec3::new(50.0, 0.0, -10.0));
    let path = dipole.save(&dir).unwrap();
    assert_eq!(SourceParameters::load(&path).unwrap(), dipole);
}

#[test]
fn test_simulation_file_roundtrip() {
    let dir = common::scratch_dir("simulation_roundtrip");
    let casing = Arc::new(layered_casing());
    let mesh = MeshGenerator::tensor(Arc::clone(&casing), TensorMeshSpec::default());

    let mut parameters = SimulationParameters::in_directory(&dir);
    parameters.num_threads = 2;
    parameters.fields_filename = Some("efields.npy".to_string());

    let sim = Simulation::new(
        Physics::fdem(),
        casing,
        mesh,
        Some(SourceParameters::default()),
        parameters,
    )
    .unwrap();
    let path = sim.save().unwrap();

    let file = SimulationFile::load(&path).unwrap();
    assert_eq!(file, sim.to_file());
    assert_eq!(file.source.as_ref().and_then(|s| s.physics), Some(PhysicsKind::Fdem));

    let back = Simulation::load(&path).unwrap();
    assert_eq!(back.physics(), sim.physics());
    assert_eq!(back.fields_path(), dir.join("efields.npy"));
    assert_eq!(back.mesh_generator(), sim.mesh_generator());
}

#[test]
fn test_unknown_field_rejected() {
    let dir = common::scratch_dir("unknown_field");
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("ModelParameters.json");

    let mut value = serde_json::to_value(CasingParameters::default()).unwrap();
    value["casing_depth"] = serde_json::json!(12.0);
    fs::write(&path, value.to_string()).unwrap();

    assert!(matches!(
        CasingParameters::load(&path),
        Err(PersistenceError::ParseFailed { .. })
    ));
}

#[test]
fn test_missing_file_reports_load_failure() {
    let dir = common::scratch_dir("missing_file");
    assert!(matches!(
        SourceParameters::load(dir.join("nope.json")),
        Err(PersistenceError::LoadFailed { .. })
    ));
}
