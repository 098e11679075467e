//! Engine: registry, event buses, render system and the frame loop

mod camera_api;
mod entity_api;
mod voxel_api;
pub mod system;

use std::cell::RefCell;
use std::rc::Rc;

use hecs::Entity;
use winit::event::WindowEvent;

use crate::core::config::EngineConfig;
use crate::core::error::Error;
use crate::core::time::FrameTimer;
use crate::core::types::{Result, UVec2};
use crate::entity::{Registry, SharedRegistry};
use crate::event::{
    EngineEvent, EngineEventManager, EntityEventManager, VoxelComponentEventManager,
    VoxelContentEventManager, WindowResize,
};
use crate::render::{FrameStats, RenderSystem, SharedBackend};

pub use system::System;

/// Owns the scene and runs it frame by frame
pub struct Engine {
    config: EngineConfig,
    registry: SharedRegistry,
    engine_events: EngineEventManager,
    entity_events: EntityEventManager,
    voxel_component_events: VoxelComponentEventManager,
    voxel_content_events: VoxelContentEventManager,
    render_system: RenderSystem,
    systems: Vec<Box<dyn System>>,
    timer: FrameTimer,
    current_camera: Option<Entity>,
    resolution: UVec2,
    running: bool,
    last_frame: FrameStats,
}

impl Engine {
    /// Build the engine and its voxel world on `backend`
    pub fn new(config: EngineConfig, backend: SharedBackend) -> Result<Self> {
        let registry: SharedRegistry = Rc::new(RefCell::new(Registry::new()));
        let render_system = RenderSystem::new(&config, backend, Rc::clone(&registry))?;

        let mut engine_events = EngineEventManager::new();
        let mut entity_events = EntityEventManager::new();
        let mut voxel_component_events = VoxelComponentEventManager::new();
        let mut voxel_content_events = VoxelContentEventManager::new();
        render_system.register(
            &mut engine_events,
            &mut entity_events,
            &mut voxel_component_events,
            &mut voxel_content_events,
        );

        log::info!(
            "Engine created: {}x{} '{}'",
            config.window_width,
            config.window_height,
            config.window_title
        );

        Ok(Self {
            resolution: UVec2::new(config.window_width, config.window_height),
            config,
            registry,
            engine_events,
            entity_events,
            voxel_component_events,
            voxel_content_events,
            render_system,
            systems: Vec::new(),
            timer: FrameTimer::new(),
            current_camera: None,
            running: false,
            last_frame: FrameStats::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The shared registry; release any borrow before calling engine methods
    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn render_system(&self) -> &RenderSystem {
        &self.render_system
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn window_resolution(&self) -> UVec2 {
        self.resolution
    }

    pub fn fps(&self) -> f32 {
        self.timer.fps()
    }

    pub fn frame_count(&self) -> u64 {
        self.timer.frame_count()
    }

    pub fn last_frame_stats(&self) -> FrameStats {
        self.last_frame
    }

    /// Register a custom system; it is initialized now if the engine is running
    pub fn add_system(&mut self, mut system: impl System + 'static) -> Result<()> {
        if self.running {
            system.init(self)?;
        }
        self.systems.push(Box::new(system));
        Ok(())
    }

    /// Initialize systems and make sure a camera exists
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            log::error!("Engine is already running");
            return Ok(());
        }

        self.for_each_system(|system, engine| system.init(engine))?;
        self.ensure_camera()?;
        self.running = true;
        self.timer = FrameTimer::new();
        log::info!("Engine started with {} systems", self.systems.len());
        Ok(())
    }

    /// Request the loop to end after the current frame
    pub fn stop(&mut self) {
        if !self.running {
            log::error!("Engine is not running");
            return;
        }
        self.running = false;
        log::info!("Engine stopping after {} frames", self.timer.frame_count());
    }

    /// Run one frame: custom systems, then the render system
    pub fn frame(&mut self) -> Result<FrameStats> {
        self.ensure_camera()?;
        self.timer.tick();
        let delta_time = self.timer.delta_secs();

        self.for_each_system(|system, engine| system.update(engine, delta_time))?;

        // Systems may have destroyed the camera
        self.ensure_camera()?;
        let (viewer, view_projection) = self.camera_view()?;
        let stats = self.render_system.update(viewer, view_projection)?;
        self.last_frame = stats;
        Ok(stats)
    }

    /// Start, run `count` frames (or until stopped), then shut systems down
    pub fn run_frames(&mut self, count: u64) -> Result<()> {
        self.start()?;
        let mut result = Ok(());
        for _ in 0..count {
            if !self.running {
                break;
            }
            if let Err(err) = self.frame() {
                result = Err(err);
                break;
            }
        }
        self.shutdown()?;
        result
    }

    /// Start and run frames until [`Engine::stop`] is called
    pub fn run(&mut self) -> Result<()> {
        self.start()?;
        let mut result = Ok(());
        while self.running {
            if let Err(err) = self.frame() {
                result = Err(err);
                break;
            }
        }
        self.shutdown()?;
        result
    }

    fn shutdown(&mut self) -> Result<()> {
        self.running = false;
        self.for_each_system(|system, engine| system.deinit(engine))
    }

    /// Subscribe to window/engine events
    pub fn subscribe_engine<F>(&mut self, kind: EngineEvent, listener: F)
    where
        F: FnMut(EngineEvent, &WindowResize) -> Result<()> + 'static,
    {
        self.engine_events.subscribe(kind, listener);
    }

    /// Record the new resolution, update the camera aspect and publish `OnWindowResize`
    pub fn set_window_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        self.resolution = UVec2::new(width, height);
        if let Some(camera) = self.current_camera {
            self.with_camera_mut(camera, |c| c.set_aspect(width, height))?;
        }
        log::debug!("Window resized to {}x{}", width, height);
        self.engine_events
            .publish(EngineEvent::OnWindowResize, &WindowResize { width, height })
    }

    /// Forward a winit window event: resizes update the resolution, close stops the engine
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> Result<()> {
        match event {
            WindowEvent::Resized(size) => self.set_window_resolution(size.width, size.height),
            WindowEvent::CloseRequested => {
                self.stop();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Run `f` over every custom system with the systems taken out of the engine
    fn for_each_system<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Box<dyn System>, &mut Engine) -> Result<()>,
    {
        let mut systems = std::mem::take(&mut self.systems);
        let mut result = Ok(());
        for system in systems.iter_mut() {
            result = f(system, self);
            if result.is_err() {
                break;
            }
        }
        // Keep systems added while running
        systems.append(&mut self.systems);
        self.systems = systems;
        result
    }

    fn component_error(entity: Entity, component: &'static str) -> impl FnOnce(hecs::ComponentError) -> Error {
        move |err| Error::from_component(entity, component, err)
    }
}
