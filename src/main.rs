//! Voxlume demo: a handful of voxel objects moving through the world

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use voxlume::core::types::{IVec3, Quat, UVec3, Vec3};
use voxlume::core::{logging, EngineConfig};
use voxlume::engine::{Engine, System};
use voxlume::entity::{Entity, Transform};
use voxlume::render::{HeadlessBackend, SharedBackend, WgpuBackend};
use voxlume::voxel::VoxelData;

const DEFAULT_FRAMES: u64 = 240;

/// Spins one object about Y through transform events and drifts a row of
/// crates through the batched path
struct DemoSystem {
    spinner: Option<Entity>,
    crates: Vec<Entity>,
    elapsed: f32,
}

impl DemoSystem {
    fn new() -> Self {
        Self {
            spinner: None,
            crates: Vec::new(),
            elapsed: 0.0,
        }
    }
}

/// Column heights following a sine ridge
fn ridge(size: UVec3, material: u8) -> voxlume::core::Result<VoxelData> {
    let mut data = VoxelData::new(size);
    for x in 0..size.x as i32 {
        for z in 0..size.z as i32 {
            let wave = ((x as f32 * 0.4).sin() + (z as f32 * 0.3).cos() + 2.0) / 4.0;
            let height = ((wave * size.y as f32) as i32).max(1);
            for y in 0..height {
                data.set_voxel(IVec3::new(x, y, z), material)?;
            }
        }
    }
    Ok(data)
}

impl System for DemoSystem {
    fn init(&mut self, engine: &mut Engine) -> voxlume::core::Result<()> {
        log::info!("DemoSystem::init()");

        let ground = engine.create_entity("ground", Transform::from_position(Vec3::new(0.0, 0.0, 0.0)));
        engine.add_voxel_component(ground, VoxelData::filled(UVec3::new(256, 1, 256), 1))?;

        let spinner = engine.create_entity("spinner", Transform::from_position(Vec3::new(64.0, 1.0, 64.0)));
        engine.add_voxel_component(spinner, ridge(UVec3::new(24, 16, 24), 7)?)?;
        self.spinner = Some(spinner);

        for i in 0..8 {
            let name = format!("crate_{i}");
            let position = Vec3::new(16.0 + i as f32 * 12.0, 1.0, 160.0);
            let entity = engine.create_entity(&name, Transform::from_position(position));
            engine.add_voxel_component(entity, VoxelData::filled(UVec3::splat(6), 20 + i as u8))?;
            self.crates.push(entity);
        }

        let camera = engine.create_entity("camera", Transform::from_position(Vec3::new(128.0, 60.0, 300.0)));
        engine.add_camera_component(camera, voxlume::entity::CameraComponent::new(60.0, 16.0 / 9.0))?;
        engine.set_current_camera(camera)?;
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> voxlume::core::Result<()> {
        self.elapsed += delta_time;

        if let Some(spinner) = self.spinner {
            engine.set_rotation(spinner, Quat::from_rotation_y(self.elapsed * 0.8))?;
        }

        let mut moved = Vec::with_capacity(self.crates.len());
        for (i, entity) in self.crates.iter().enumerate() {
            let mut transform = engine.transform(*entity)?;
            transform.position.z = 160.0 + (self.elapsed * 2.0 + i as f32).sin() * 20.0;
            moved.push((*entity, transform));
        }
        engine.set_transforms_batched(moved)
    }

    fn deinit(&mut self, _engine: &mut Engine) -> voxlume::core::Result<()> {
        log::info!("DemoSystem::deinit()");
        Ok(())
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let config = match parse_config_arg(&args) {
        Some(path) => match EngineConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    logging::init_with_filter(&config.log_filter);
    log::info!("Voxlume starting...");

    if let Err(e) = run(config, &args) {
        log::error!("Voxlume failed: {}", e);
        std::process::exit(1);
    }
}

fn run(config: EngineConfig, args: &[String]) -> voxlume::core::Result<()> {
    let backend: SharedBackend = if args.iter().any(|a| a == "--wgpu") {
        Rc::new(RefCell::new(WgpuBackend::new_headless()?))
    } else {
        log::info!("Using headless backend (pass --wgpu for a GPU device)");
        Rc::new(RefCell::new(HeadlessBackend::new()))
    };
    let frames = parse_frames_arg(args).unwrap_or(DEFAULT_FRAMES);

    let mut engine = Engine::new(config, backend)?;
    engine.add_system(DemoSystem::new())?;
    engine.run_frames(frames)?;

    let stats = engine.last_frame_stats();
    let state = engine.render_system().state();
    log::info!(
        "Ran {} frames: {} occupied voxels, {} objects drawn last frame, {} bytes uploaded",
        engine.frame_count(),
        state.world.occupied_count(),
        stats.objects_drawn,
        stats.uploaded_bytes
    );
    Ok(())
}

/// Parse --config argument (path to a JSON engine config)
fn parse_config_arg(args: &[String]) -> Option<PathBuf> {
    for i in 0..args.len() {
        if args[i] == "--config" || args[i] == "-c" {
            if let Some(path) = args.get(i + 1) {
                return Some(PathBuf::from(path));
            }
        }
    }
    None
}

/// Parse --frames argument (number of frames to run)
fn parse_frames_arg(args: &[String]) -> Option<u64> {
    for i in 0..args.len() {
        if args[i] == "--frames" || args[i] == "-f" {
            if let Some(count) = args.get(i + 1) {
                return count.parse().ok();
            }
        }
    }
    None
}
