//! Two-pass shadow mapping.
//!
//! The first pass renders the mesh from the light into a depth buffer, the second renders it
//! from the camera and asks that buffer, through `Mshadow`, whether each pixel sees the light.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use threadpool::ThreadPool;

use super::buffer::{DepthBuffer, FrameBuffer};
use super::raster::{render_tiled, RasterStats};
use super::shader::Uniforms;
use super::shaders::{DepthShader, ShadowShader};
use crate::camera::{default_viewport, Camera, RenderContext};
use crate::error::{RenderError, Result};
use crate::geometry::{cross, invert, Matrix4f, Vec3f};
use crate::model::Model;

/// Camera, light and viewport shared by both passes.
#[derive(Debug, Clone, Copy)]
pub struct ShadowSetup {
    pub camera: Camera,
    /// Direction from the scene towards the light.
    pub light_dir: Vec3f,
    pub viewport: Matrix4f,
}

impl ShadowSetup {
    pub fn new(camera: Camera, light_dir: Vec3f, width: u32, height: u32) -> Self {
        return Self { camera, light_dir, viewport: default_viewport(width, height) };
    }

    /// Orthographic view from the light onto the camera's target.
    pub fn light_context(&self) -> RenderContext {
        let light = Camera {
            eye: self.camera.center + self.light_dir,
            center: self.camera.center,
            up: usable_up(self.camera.up, self.light_dir),
        };
        return RenderContext::orthographic(&light, self.viewport);
    }

    pub fn main_context(&self) -> RenderContext {
        return RenderContext::perspective(&self.camera, self.viewport);
    }
}

/// `up` unless it is (nearly) parallel to `dir`, then the world axis least aligned with `dir`.
fn usable_up(up: Vec3f, dir: Vec3f) -> Vec3f {
    if cross(up, dir).norm() > 1e-3 * up.norm() * dir.norm() {
        return up;
    }
    let axes = [Vec3f::x(), Vec3f::y(), Vec3f::z()];
    let mut best = axes[0];
    for axis in axes {
        if axis.dot(&dir).abs() < best.dot(&dir).abs() {
            best = axis;
        }
    }
    return best;
}

/// Maps main-pass screen coordinates to shadow-buffer screen coordinates.
pub fn shadow_matrix(light: &RenderContext, main: &RenderContext) -> Result<Matrix4f> {
    return Ok(light.screen_transform() * invert(&main.screen_transform())?);
}

/// Output of `render_shadowed`.
pub struct ShadowedFrame {
    pub frame: FrameBuffer,
    pub depth: DepthBuffer,
    /// Depth seen from the light.
    pub shadow_buffer: Arc<DepthBuffer>,
    /// Grey rendering of the light pass.
    pub shadow_view: FrameBuffer,
    pub light_stats: RasterStats,
    pub main_stats: RasterStats,
}

/// Depth pass from the light. Returns the shadow buffer and its grey visualization.
pub fn render_shadow_buffer(
    pool: &ThreadPool,
    setup: &ShadowSetup,
    model: Arc<Model>,
    width: u32,
    height: u32,
) -> Result<(DepthBuffer, FrameBuffer, RasterStats)> {
    let light = setup.light_context();
    debug!("light pass transform: {}", light.screen_transform());

    let start = Instant::now();
    let mut view = FrameBuffer::new(width, height);
    let mut shadow_buffer = DepthBuffer::new(width, height);
    let faces = model.nfaces();
    let shader = DepthShader::new(model, light.screen_transform());
    let stats = render_tiled(pool, faces, &shader, &mut view, &mut shadow_buffer)?;
    info!("shadow pass: {} fragments in {:.2?}", stats.fragments, start.elapsed());
    return Ok((shadow_buffer, view, stats));
}

/// Color pass from the camera, darkened where `shadow_buffer` says the light is blocked.
pub fn render_lit(
    pool: &ThreadPool,
    setup: &ShadowSetup,
    model: Arc<Model>,
    shadow_buffer: Arc<DepthBuffer>,
    width: u32,
    height: u32,
) -> Result<(FrameBuffer, DepthBuffer, RasterStats)> {
    let main = setup.main_context();
    let m_shadow = shadow_matrix(&setup.light_context(), &main)?;
    debug!("main pass transform: {}", main.screen_transform());
    debug!("shadow matrix: {}", m_shadow);

    let start = Instant::now();
    let mut frame = FrameBuffer::new(width, height);
    let mut depth = DepthBuffer::new(width, height);
    let faces = model.nfaces();
    let uniforms = Uniforms::new(&main, setup.light_dir)?;
    let shader = ShadowShader::new(model, uniforms, shadow_buffer, m_shadow);
    let stats = render_tiled(pool, faces, &shader, &mut frame, &mut depth)?;
    info!("color pass: {} fragments in {:.2?}", stats.fragments, start.elapsed());
    return Ok((frame, depth, stats));
}

/// Both passes over the same mesh. The shadow buffer is complete before the color pass starts.
pub fn render_shadowed(
    pool: &ThreadPool,
    setup: &ShadowSetup,
    model: Arc<Model>,
    width: u32,
    height: u32,
) -> Result<ShadowedFrame> {
    if setup.light_dir.norm() == 0.0 {
        return Err(RenderError::InvalidArgument("light direction is zero".to_string()));
    }
    let (shadow_buffer, shadow_view, light_stats) =
        render_shadow_buffer(pool, setup, model.clone(), width, height)?;
    let shadow_buffer = Arc::new(shadow_buffer);
    let (frame, depth, main_stats) = render_lit(pool, setup, model, shadow_buffer.clone(), width, height)?;
    return Ok(ShadowedFrame { frame, depth, shadow_buffer, shadow_view, light_stats, main_stats });
}
