//! Entity components and registry handles

pub mod components;

use std::cell::RefCell;
use std::rc::Rc;

pub use components::{Name, Pose, Transform, VoxelComponent};
pub use crate::core::camera::CameraComponent;
pub use hecs::Entity;

/// The entity/component registry
pub type Registry = hecs::World;

/// Registry shared between the engine and event listeners.
///
/// Publishers release their borrow before publishing so listeners can
/// borrow it again.
pub type SharedRegistry = Rc<RefCell<Registry>>;
