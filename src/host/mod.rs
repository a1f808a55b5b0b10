//! Collaborators the core drives but does not own: the scene renderer and
//! the location lookup

pub mod location;
pub mod render;

pub use location::{CityDirectory, LocationResolver};
pub use render::{LogRenderer, NullRenderer, RenderError, Renderer};
