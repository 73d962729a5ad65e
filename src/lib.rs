//! Software rasterizer with programmable shaders and two-pass shadow mapping.

pub mod app;
pub mod camera;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod model;
pub mod scene;
pub mod texture;

pub use error::{RenderError, Result};
