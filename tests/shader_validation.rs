//! The WGSL update kernel must parse, validate, and agree with the CPU
//! integrator on struct layout and shared constants.

use std::fs;
use std::mem::size_of;
use std::path::Path;

use naga::{Expression, Literal, Module};
use snowglobe_sim::particles::compute::{SNOW_UPDATE_SHADER_PATH, SNOW_WORKGROUP_SIZE};
use snowglobe_sim::particles::config::DOME_COLLISION_MARGIN;
use snowglobe_sim::particles::simulation::{
    RESPAWN_CAP_RADIUS, RESPAWN_HEIGHT_MIN, RESPAWN_HEIGHT_SPAN, SALT_RESPAWN_ANGLE,
    SALT_RESPAWN_HEIGHT, SALT_RESPAWN_RADIUS, SALT_RESPAWN_ROLL,
};
use snowglobe_sim::particles::{Particle, SimulationParams};

fn load_module() -> Module {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(SNOW_UPDATE_SHADER_PATH);
    let source = fs::read_to_string(&path).unwrap();
    match naga::front::wgsl::parse_str(&source) {
        Ok(module) => module,
        Err(e) => panic!("Failed to parse {:?}:\n{}", path, e.emit_to_string(&source)),
    }
}

fn constant(module: &Module, name: &str) -> Literal {
    let (_, constant) = module
        .constants
        .iter()
        .find(|(_, c)| c.name.as_deref() == Some(name))
        .unwrap_or_else(|| panic!("constant {name} missing from shader"));
    match module.global_expressions[constant.init] {
        Expression::Literal(ref literal) => literal.clone(),
        ref other => panic!("constant {name} is not a literal: {other:?}"),
    }
}

fn struct_size(module: &Module, name: &str) -> u32 {
    let mut layouter = naga::proc::Layouter::default();
    layouter.update(module.to_ctx()).unwrap();
    let (handle, _) = module
        .types
        .iter()
        .find(|(_, ty)| ty.name.as_deref() == Some(name))
        .unwrap_or_else(|| panic!("struct {name} missing from shader"));
    layouter[handle].size
}

#[test]
fn snow_update_shader_validates() {
    let module = load_module();
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    if let Err(e) = validator.validate(&module) {
        panic!("Failed to validate {SNOW_UPDATE_SHADER_PATH}:\n{e:?}");
    }
}

#[test]
fn shader_structs_match_cpu_layout() {
    let module = load_module();
    assert_eq!(struct_size(&module, "Particle") as usize, size_of::<Particle>());
    assert_eq!(struct_size(&module, "SimParams") as usize, size_of::<SimulationParams>());
}

#[test]
fn shader_workgroup_matches_dispatch_plan() {
    let module = load_module();
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == "main")
        .expect("main entry point");
    assert_eq!(entry.workgroup_size, [SNOW_WORKGROUP_SIZE, 1, 1]);
}

#[test]
fn shader_constants_match_cpu_integrator() {
    let module = load_module();

    assert_eq!(constant(&module, "SALT_RESPAWN_ROLL"), Literal::U32(SALT_RESPAWN_ROLL));
    assert_eq!(constant(&module, "SALT_RESPAWN_ANGLE"), Literal::U32(SALT_RESPAWN_ANGLE));
    assert_eq!(constant(&module, "SALT_RESPAWN_RADIUS"), Literal::U32(SALT_RESPAWN_RADIUS));
    assert_eq!(constant(&module, "SALT_RESPAWN_HEIGHT"), Literal::U32(SALT_RESPAWN_HEIGHT));

    assert_eq!(constant(&module, "DOME_COLLISION_MARGIN"), Literal::F32(DOME_COLLISION_MARGIN));
    assert_eq!(constant(&module, "RESPAWN_CAP_RADIUS"), Literal::F32(RESPAWN_CAP_RADIUS));
    assert_eq!(constant(&module, "RESPAWN_HEIGHT_MIN"), Literal::F32(RESPAWN_HEIGHT_MIN));
    assert_eq!(constant(&module, "RESPAWN_HEIGHT_SPAN"), Literal::F32(RESPAWN_HEIGHT_SPAN));
}
