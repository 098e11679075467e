//! Application systems driven by the engine loop

use crate::core::types::Result;
use super::Engine;

/// Custom per-frame logic.
///
/// Systems run in the order they were added, before the render system,
/// and get full access to the engine while they run.
pub trait System {
    fn init(&mut self, _engine: &mut Engine) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<()>;

    fn deinit(&mut self, _engine: &mut Engine) -> Result<()> {
        Ok(())
    }
}
