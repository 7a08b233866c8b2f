mod common;

use casing_sim_core::io::npy::{self, NpyData};
use casing_sim_core::{
    CasingParameters, CylMeshSpec, MeshGenerator, Simulation, SimulationParameters,
    SimulationState, Vec3,
};
use std::fs;
use std::sync::Arc;

fn short_casing() -> Arc<CasingParameters> {
    Arc::new(CasingParameters {
        casing_l: 10.0,
        ..Default::default()
    })
}

#[test]
fn test_cyl_dc_dipole_end_to_end() {
    let dir = common::scratch_dir("dc_cyl");
    let casing = short_casing();
    let spec = CylMeshSpec::default();
    let mesh = MeshGenerator::cylindrical(Arc::clone(&casing), spec.clone());

    let mut sim = Simulation::dc(
        Arc::clone(&casing),
        mesh,
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(10.0, 0.0, 0.0),
        SimulationParameters::in_directory(&dir),
    )
    .unwrap();

    sim.validate().unwrap();
    assert_eq!(sim.state(), SimulationState::Validated);

    let n_cells = sim.mesh_generator().mesh().unwrap().n_cells();
    let [_, ny, nz] = sim.mesh_generator().mesh().unwrap().shape();
    assert_eq!(ny, 1);
    assert_eq!(nz, spec.ncz(&casing) + 2 * spec.npadz);

    let shape = sim.run().unwrap().shape();
    assert_eq!(shape, (n_cells, 1));
    assert_eq!(sim.state(), SimulationState::Persisted);

    let path = dir.join("fieldsDC.npy");
    assert_eq!(sim.fields_path(), path);
    let len = fs::metadata(&path).unwrap().len() as usize;
    assert!(len > 8 * n_cells);
    assert_eq!((len - 8 * n_cells) % 64, 0);
    assert!(!dir.join("fieldsDC.npy.partial").exists());
    assert!(dir.join("simulationParameters.json").exists());

    let array = npy::read(&path).unwrap();
    assert_eq!(array.shape, vec![n_cells, 1]);
    match array.data {
        NpyData::Float64(values) => {
            assert!(values.iter().all(|v| v.is_finite()));
            assert!(values.iter().any(|v| *v != 0.0));
        }
        NpyData::Complex128(_) => panic!("DC potential must be real"),
    }
}

#[test]
fn test_dc_rerun_from_saved_file() {
    let dir = common::scratch_dir("dc_resume");
    let casing = short_casing();
    let mesh = MeshGenerator::cylindrical(Arc::clone(&casing), CylMeshSpec::default());

    let mut parameters = SimulationParameters::in_directory(&dir);
    parameters.fields_filename = Some("first.npy".to_string());
    let sim = Simulation::dc(
        casing,
        mesh,
        Vec3::new(0.0, 0.0, -1.0),
        Vec3::new(10.0, 0.0, -1.0),
        parameters,
    )
    .unwrap();
    let saved = sim.save().unwrap();

    let mut again = Simulation::load(&saved).unwrap();
    assert_eq!(again.state(), SimulationState::Constructed);
    again.run().unwrap();
    assert!(dir.join("first.npy").exists());
}

#[test]
fn test_solve_before_validate_is_rejected() {
    let dir = common::scratch_dir("dc_order");
    let casing = short_casing();
    let mesh = MeshGenerator::cylindrical(Arc::clone(&casing), CylMeshSpec::default());
    let mut sim = Simulation::dc(
        casing,
        mesh,
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(10.0, 0.0, 0.0),
        SimulationParameters::in_directory(&dir),
    )
    .unwrap();

    assert!(sim.solve().is_err());
    assert!(sim.persist().is_err());
    assert_eq!(sim.state(), SimulationState::Constructed);
}

#[test]
fn test_electrode_outside_mesh_fails_validation() {
    let dir = common::scratch_dir("dc_outside");
    let casing = short_casing();
    let mesh = MeshGenerator::cylindrical(Arc::clone(&casing), CylMeshSpec::default());
    let mut sim = Simulation::dc(
        casing,
        mesh,
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1e7, 0.0, 0.0),
        SimulationParameters::in_directory(&dir),
    )
    .unwrap();

    assert!(sim.validate().is_err());
    assert_eq!(sim.state(), SimulationState::Failed);
    assert!(sim.run().is_err());
}
