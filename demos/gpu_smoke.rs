use snowglobe_sim::logging::{init_logging, LoggingConfig};
use snowglobe_sim::particles::{
    request_compute_device, ParticleGpuSim, ParticleWorkgroup, PopulationConfig, SceneConfig,
    SimulationClock,
};

fn main() {
    init_logging(LoggingConfig::default());
    if let Err(err) = pollster::block_on(run()) {
        log::error!("gpu_smoke failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (device, queue) = request_compute_device().await?;

    let scene = SceneConfig {
        particle_count: 8192,
        ..SceneConfig::default()
    };
    let sim = ParticleGpuSim::init(
        &device,
        &queue,
        scene,
        PopulationConfig::default(),
        7,
        ParticleWorkgroup::default(),
    )?;

    let mut clock = SimulationClock::default();
    for _ in 0..240 {
        let timing = clock.advance(1.0 / 60.0);
        sim.step(
            &device,
            &queue,
            scene.params(timing.time, timing.delta_time, [0.0; 3]),
        );
    }

    let sample = sim.readback_debug_sample(&device, &queue, 256)?;
    let limit = scene.collision_radius() + 1e-4;
    let escaped = sample
        .iter()
        .filter(|p| {
            let dy = p.position[1] - scene.dome_center_y;
            let r = (p.position[0].powi(2) + dy * dy + p.position[2].powi(2)).sqrt();
            r > limit || p.position[1] < scene.floor_y - 1e-4
        })
        .count();

    if escaped > 0 {
        return Err(format!(
            "{escaped} of {} sampled particles left the dome or fell through the floor",
            sample.len()
        )
        .into());
    }

    log::info!(
        "gpu_smoke ok: particle_count={} sampled={} escaped={}",
        sim.particle_count(),
        sample.len(),
        escaped
    );

    Ok(())
}
