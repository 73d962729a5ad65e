//! Everything that turns a mesh into pixels: target buffers, the rasterizer, shaders and the
//! shadow-mapping driver built from them.

pub mod buffer;
pub mod raster;
pub mod shader;
pub mod shaders;
pub mod shadow;

pub use buffer::{Color, DepthBuffer, FrameBuffer};
pub use raster::{draw_triangle, render, render_tiled, RasterStats};
pub use shader::{Shader, Uniforms, Varying};
pub use shadow::{render_shadowed, shadow_matrix, ShadowSetup, ShadowedFrame};
