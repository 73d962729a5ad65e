use std::cmp::{max, min};
use std::mem;
use std::sync::mpsc;

use log::{debug, trace};
use threadpool::ThreadPool;

use super::buffer::{DepthBuffer, FrameBuffer};
use super::shader::Shader;
use crate::error::{RenderError, Result};
use crate::geometry::{cross, round_to_pixel, Vec2f, Vec2i, Vec3f, Vec4f};

/// Counters of one pass over a mesh.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RasterStats {
    pub triangles: usize,
    /// Triangles dropped before any pixel was looked at.
    pub degenerate: usize,
    /// Pixels that passed the depth test and were not discarded.
    pub fragments: usize,
}

/// Simple bounding box of pixel coordinates, both corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub ll: Vec2i, // lower left corner
    pub ur: Vec2i, // upper right corner
}

impl BoundingBox {
    pub fn of_triangle(pts: &[Vec2i; 3]) -> Self {
        return Self {
            ll: Vec2i::new(
                min(min(pts[0].x, pts[1].x), pts[2].x),
                min(min(pts[0].y, pts[1].y), pts[2].y),
            ),
            ur: Vec2i::new(
                max(max(pts[0].x, pts[1].x), pts[2].x),
                max(max(pts[0].y, pts[1].y), pts[2].y),
            ),
        };
    }

    /// Intersection with an inclusive pixel rectangle, `None` if they don't overlap.
    pub fn clamp(&self, bounds: (i32, i32, i32, i32)) -> Option<Self> {
        let (x_min, y_min, x_max, y_max) = bounds;
        let clamped = Self {
            ll: Vec2i::new(max(self.ll.x, x_min), max(self.ll.y, y_min)),
            ur: Vec2i::new(min(self.ur.x, x_max), min(self.ur.y, y_max)),
        };
        if clamped.ll.x > clamped.ur.x || clamped.ll.y > clamped.ur.y {
            return None;
        }
        return Some(clamped);
    }
}

/// Barycentric coordinates of `p` with respect to the triangle `pts`.
///
/// Any negative component means `p` is outside. A triangle with (near) zero area at pixel
/// resolution reports every point as outside.
pub fn barycentric(pts: &[Vec2i; 3], p: Vec2i) -> Vec3f {
    let raw_cross = cross(
        Vec3f::new(
            pts[1].x as f32 - pts[0].x as f32,
            pts[2].x as f32 - pts[0].x as f32,
            pts[0].x as f32 - p.x as f32,
        ),
        Vec3f::new(
            pts[1].y as f32 - pts[0].y as f32,
            pts[2].y as f32 - pts[0].y as f32,
            pts[0].y as f32 - p.y as f32,
        ),
    );
    // Integer corners make |z| twice the area, so below 1 it is zero.
    if raw_cross.z.abs() < 1.0 {
        return Vec3f::new(-1.0, 1.0, 1.0);
    }
    return Vec3f::new(
        1.0 - (raw_cross.x + raw_cross.y) / raw_cross.z,
        raw_cross.x / raw_cross.z,
        raw_cross.y / raw_cross.z,
    );
}

/// Screen bary weights to weights of the undivided attributes, given each corner's w.
fn perspective_correct(bar: Vec3f, w: &[f32; 3]) -> Option<Vec3f> {
    let corrected = Vec3f::new(bar.x / w[0], bar.y / w[1], bar.z / w[2]);
    let sum = corrected.x + corrected.y + corrected.z;
    let corrected = corrected / sum;
    if !corrected.iter().all(|c| c.is_finite()) {
        return None;
    }
    return Some(corrected);
}

/// Rasterizes one triangle given in homogeneous screen space.
///
/// Returns the number of pixels written, or `None` when the triangle was dropped as degenerate
/// (non-finite corners or all corners on one row). Dropped triangles leave both buffers alone.
pub fn draw_triangle<S: Shader + ?Sized>(
    clip: &[Vec4f; 3],
    shader: &S,
    frame: &mut FrameBuffer,
    depth: &mut DepthBuffer,
) -> Option<usize> {
    let mut pts = [Vec2i::zeros(); 3];
    let mut z = Vec3f::zeros();
    let mut w = [1.0f32; 3];
    for i in 0..3 {
        let v = clip[i] / clip[i].w;
        if !v.iter().all(|c| c.is_finite()) {
            return None;
        }
        pts[i] = round_to_pixel(Vec2f::new(v.x, v.y));
        z[i] = v.z;
        w[i] = clip[i].w;
    }
    if pts[0].y == pts[1].y && pts[0].y == pts[2].y {
        return None;
    }

    let bbox = match BoundingBox::of_triangle(&pts).clamp(frame.pixel_bounds()) {
        Some(bbox) => bbox,
        None => return Some(0),
    };

    let mut written = 0;
    for x in bbox.ll.x..=bbox.ur.x {
        for y in bbox.ll.y..=bbox.ur.y {
            let bar = barycentric(&pts, Vec2i::new(x, y));
            if bar.x < 0.0 || bar.y < 0.0 || bar.z < 0.0 {
                // If any of the coordinates are negative, point is not in the triangle, so skipping it.
                continue;
            }
            let frag_depth = bar.dot(&z);
            if !depth.test(x, y, frag_depth) {
                continue;
            }
            let Some(bar_clip) = perspective_correct(bar, &w) else {
                continue;
            };
            if let Some(color) = shader.fragment(bar_clip) {
                frame.set(x, y, color);
                depth.set(x, y, frag_depth);
                written += 1;
            }
        }
    }
    return Some(written);
}

/// Runs the shader over every face in order, single threaded.
pub fn render<S: Shader + ?Sized>(
    faces: usize,
    shader: &mut S,
    frame: &mut FrameBuffer,
    depth: &mut DepthBuffer,
) -> RasterStats {
    let mut stats = RasterStats::default();
    for face in 0..faces {
        let mut clip = [Vec4f::zeros(); 3];
        for (nth, corner) in clip.iter_mut().enumerate() {
            *corner = shader.vertex(face, nth);
        }
        stats.triangles += 1;
        match draw_triangle(&clip, &*shader, frame, depth) {
            Some(written) => stats.fragments += written,
            None => {
                trace!("skipping degenerate face {}", face);
                stats.degenerate += 1;
            }
        }
    }
    return stats;
}

/// Same result as `render`, with the frame cut into horizontal bands drawn on the pool.
///
/// Every band gets its own copy of the shader and walks all faces in order, but only touches
/// its own rows, so no pixel is shared between workers.
pub fn render_tiled<S>(
    pool: &ThreadPool,
    faces: usize,
    shader: &S,
    frame: &mut FrameBuffer,
    depth: &mut DepthBuffer,
) -> Result<RasterStats>
where
    S: Shader + Clone + Send + 'static,
{
    let (width, height) = (frame.width(), frame.height());
    let workers = pool.max_count().max(1) as u32;
    let rows = ((height + workers - 1) / workers).max(1);

    let frame_bands = mem::replace(frame, FrameBuffer::new(width, 0)).split_rows(rows);
    let depth_bands = mem::replace(depth, DepthBuffer::new(width, 0)).split_rows(rows);
    let band_count = frame_bands.len();
    debug!("rendering {} faces in {} bands of {} rows", faces, band_count, rows);

    let (tx, rx) = mpsc::channel();
    for (mut band_frame, mut band_depth) in frame_bands.into_iter().zip(depth_bands) {
        let tx = tx.clone();
        let mut shader = shader.clone();
        pool.execute(move || {
            let stats = render(faces, &mut shader, &mut band_frame, &mut band_depth);
            // The receiver outlives every job, a failed send only means it already gave up.
            let _ = tx.send((band_frame, band_depth, stats));
        });
    }
    drop(tx);

    let mut frames = Vec::with_capacity(band_count);
    let mut depths = Vec::with_capacity(band_count);
    let mut stats = RasterStats { triangles: faces, ..Default::default() };
    for (band_frame, band_depth, band_stats) in rx.iter().take(band_count) {
        frames.push(band_frame);
        depths.push(band_depth);
        stats.fragments += band_stats.fragments;
        stats.degenerate = max(stats.degenerate, band_stats.degenerate);
    }
    if frames.len() != band_count {
        *frame = FrameBuffer::new(width, height);
        *depth = DepthBuffer::new(width, height);
        return Err(RenderError::WorkerFailed(format!(
            "{} of {} bands came back",
            frames.len(),
            band_count
        )));
    }

    *frame = FrameBuffer::join_rows(frames).unwrap_or_else(|| FrameBuffer::new(width, height));
    *depth = DepthBuffer::join_rows(depths).unwrap_or_else(|| DepthBuffer::new(width, height));
    return Ok(stats);
}
