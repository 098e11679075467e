//! Event buses decoupling scene mutations from the render system

pub mod manager;
pub mod events;

pub use manager::{EventCategory, EventManager, Listener};
pub use events::*;
