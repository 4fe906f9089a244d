use std::path::PathBuf;

use snowglobe_sim::logging::{init_logging, LoggingConfig};
use snowglobe_sim::particles::{
    ParticleState, PopulationConfig, SceneConfig, SimulationClock,
};
use snowglobe_sim::quality::QualityTier;
use snowglobe_sim::shake::ShakeController;

fn main() {
    init_logging(LoggingConfig::default());
    if let Err(err) = run() {
        log::error!("snowglobe-sim failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let seconds = parse_arg::<f32>(&args, "--seconds").unwrap_or(10.0);
    let fps = parse_arg::<f32>(&args, "--fps").unwrap_or(60.0).max(1.0);
    let shake_at = parse_arg::<f32>(&args, "--shake-at");
    let seed = parse_arg::<u32>(&args, "--seed").unwrap_or(1);

    let mut scene = match parse_arg::<PathBuf>(&args, "--scene") {
        Some(path) => {
            log::info!("loading scene from {}", path.display());
            SceneConfig::load_json(&path)?
        }
        None => SceneConfig::default(),
    };
    let tier = parse_arg::<String>(&args, "--tier").and_then(|name| QualityTier::parse(&name));
    let parallel = match tier {
        Some(tier) => {
            scene = tier.apply(scene);
            tier.budget().parallel_step
        }
        None => args.iter().any(|a| a == "--parallel"),
    };
    if let Some(count) = parse_arg::<u32>(&args, "--particles") {
        scene.particle_count = count;
    }

    let population = PopulationConfig::default();
    let mut state = ParticleState::seeded(&scene, &population, seed);
    let mut clock = SimulationClock::default();
    let mut shake = ShakeController::default();
    let frame_dt = 1.0 / fps;

    log::info!(
        "snow globe run: {:.1}s @ {:.1}fps particles={} parallel={}",
        seconds,
        fps,
        scene.particle_count,
        parallel
    );

    let mut shaken = false;
    let mut frame = 0u64;
    let report_every = (fps as u64).max(1);
    while clock.time_seconds() < seconds {
        if let Some(at) = shake_at {
            if !shaken && clock.time_seconds() >= at {
                shake.impulse([1.0, 0.6, 0.3], 6.0);
                shaken = true;
            }
        }

        let timing = clock.advance(frame_dt);
        let params = scene.params(timing.time, timing.delta_time, shake.sample(timing.delta_time));
        if parallel {
            state.step_parallel(&params);
        } else {
            state.step(&params);
        }

        frame += 1;
        if frame % report_every == 0 {
            let stats = state.stats(&params);
            log::info!(
                "t={:.2}s on_floor={} settled={} mean_speed={:.4} max_r={:.3}",
                timing.time,
                stats.on_floor,
                stats.settled,
                stats.mean_speed,
                stats.max_radial_distance
            );
        }
    }

    let params = scene.params(clock.time_seconds(), 0.0, [0.0; 3]);
    let stats = state.stats(&params);
    log::info!(
        "done after {frame} frames: on_floor={} settled={} (limit r={:.3}, observed max r={:.3})",
        stats.on_floor,
        stats.settled,
        scene.collision_radius(),
        stats.max_radial_distance
    );
    Ok(())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|v| v == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse::<T>().ok())
}
