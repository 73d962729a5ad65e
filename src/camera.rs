use nalgebra as na;
use na::matrix;

use crate::geometry::{cross, embed, normalize_to, Matrix4f, Vec3f, Vec4f};

/// View matrix for a camera at `eye` looking at `center`.
/// Rows of the rotation block are the new basis x, y, z, translation moves `center` to the origin.
pub fn look_at(eye: Vec3f, center: Vec3f, up: Vec3f) -> Matrix4f {
    let z = normalize_to(eye - center, 1.0);
    let x = normalize_to(cross(up, z), 1.0);
    let y = cross(z, x);
    let rotation = matrix![x.x, x.y, x.z, 0.0;
                           y.x, y.y, y.z, 0.0;
                           z.x, z.y, z.z, 0.0;
                           0.0, 0.0, 0.0, 1.0];
    let translation = matrix![1.0, 0.0, 0.0, -center.x;
                              0.0, 1.0, 0.0, -center.y;
                              0.0, 0.0, 1.0, -center.z;
                              0.0, 0.0, 0.0, 1.0];
    return rotation * translation;
}

/// Identity with `coeff` in row 3, column 2.
/// `coeff = -1 / distance(eye, center)` gives perspective, `0` an orthographic transform.
pub fn projection(coeff: f32) -> Matrix4f {
    let mut m = Matrix4f::identity();
    m[(3, 2)] = coeff;
    return m;
}

/// Maps the [-1, 1] cube onto `[x, x + w] x [y, y + h]` with depth in `[0, depth]`.
pub fn viewport(x: f32, y: f32, w: f32, h: f32, depth: f32) -> Matrix4f {
    return matrix![w / 2.0, 0.0,     0.0,         x + w / 2.0;
                   0.0,     h / 2.0, 0.0,         y + h / 2.0;
                   0.0,     0.0,     depth / 2.0, depth / 2.0;
                   0.0,     0.0,     0.0,         1.0];
}

/// Depth resolution of the frame, the z range the viewport maps onto.
pub const DEPTH: f32 = 255.0;

/// Viewport with an eighth of the frame as margin on each side.
pub fn default_viewport(width: u32, height: u32) -> Matrix4f {
    let (w, h) = (width as f32, height as f32);
    return viewport(w / 8.0, h / 8.0, w * 3.0 / 4.0, h * 3.0 / 4.0, DEPTH);
}

#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub eye: Vec3f,
    pub center: Vec3f,
    pub up: Vec3f,
}

impl Default for Camera {
    fn default() -> Self {
        return Self {
            eye: Vec3f::new(1.0, 1.0, 3.0),
            center: Vec3f::zeros(),
            up: Vec3f::new(0.0, 1.0, 0.0),
        };
    }
}

impl Camera {
    pub fn view(&self) -> Matrix4f {
        return look_at(self.eye, self.center, self.up);
    }

    pub fn perspective_coeff(&self) -> f32 {
        return -1.0 / (self.eye - self.center).norm();
    }
}

/// The three matrices of one render pass. Built once per pass, read-only while rasterizing.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub view: Matrix4f,
    pub projection: Matrix4f,
    pub viewport: Matrix4f,
}

impl RenderContext {
    pub fn perspective(camera: &Camera, viewport: Matrix4f) -> Self {
        return Self {
            view: camera.view(),
            projection: projection(camera.perspective_coeff()),
            viewport,
        };
    }

    pub fn orthographic(camera: &Camera, viewport: Matrix4f) -> Self {
        return Self {
            view: camera.view(),
            projection: projection(0.0),
            viewport,
        };
    }

    /// Projection * View, everything before the viewport.
    pub fn projection_view(&self) -> Matrix4f {
        return self.projection * self.view;
    }

    /// Viewport * Projection * View, world to (homogeneous) screen space.
    pub fn screen_transform(&self) -> Matrix4f {
        return self.viewport * self.projection * self.view;
    }

    /// Homogeneous screen-space position of a world point, not divided by w yet.
    pub fn transform_point(&self, world: Vec3f) -> Vec4f {
        return self.screen_transform() * embed::<4, 3>(world, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::proj;

    const EPS: f32 = 1e-5;

    fn rotation_rows(m: &Matrix4f) -> [Vec3f; 3] {
        let mut rows = [Vec3f::zeros(); 3];
        for (i, row) in rows.iter_mut().enumerate() {
            *row = Vec3f::new(m[(i, 0)], m[(i, 1)], m[(i, 2)]);
        }
        return rows;
    }

    #[test]
    fn look_at_basis_is_orthonormal() {
        let triples = [
            (Vec3f::new(1.0, 1.0, 3.0), Vec3f::zeros(), Vec3f::new(0.0, 1.0, 0.0)),
            (Vec3f::new(-4.0, 2.0, 0.5), Vec3f::new(1.0, -1.0, 2.0), Vec3f::new(0.3, 1.0, 0.1)),
            (Vec3f::new(0.0, 0.0, 1.0), Vec3f::zeros(), Vec3f::new(1.0, 0.0, 0.0)),
        ];
        for (eye, center, up) in triples {
            let rows = rotation_rows(&look_at(eye, center, up));
            for i in 0..3 {
                assert!((rows[i].norm() - 1.0).abs() < EPS);
                for j in (i + 1)..3 {
                    assert!(rows[i].dot(&rows[j]).abs() < EPS);
                }
            }
            // The third row points from center towards the eye.
            let z = (eye - center).normalize();
            assert!((rows[2] - z).norm() < EPS);
        }
    }

    #[test]
    fn look_at_moves_center_to_origin() {
        let center = Vec3f::new(1.0, 2.0, 3.0);
        let m = look_at(Vec3f::new(4.0, 2.0, 3.0), center, Vec3f::new(0.0, 1.0, 0.0));
        let p = m * embed::<4, 3>(center, 1.0);
        assert!(proj::<3, 4>(p).norm() < EPS);
    }

    #[test]
    fn orthographic_projection_is_identity() {
        assert_eq!(projection(0.0), Matrix4f::identity());
        let m = projection(-0.25);
        let p = m * Vec4f::new(1.0, 2.0, -2.0, 1.0);
        assert!((p.w - 1.5).abs() < EPS);
    }

    #[test]
    fn viewport_maps_cube_corners() {
        let m = viewport(10.0, 20.0, 100.0, 50.0, 255.0);
        let low = m * Vec4f::new(-1.0, -1.0, -1.0, 1.0);
        let high = m * Vec4f::new(1.0, 1.0, 1.0, 1.0);
        assert!((low - Vec4f::new(10.0, 20.0, 0.0, 1.0)).norm() < EPS);
        assert!((high - Vec4f::new(110.0, 70.0, 255.0, 1.0)).norm() < EPS);
    }

    #[test]
    fn context_composes_in_order() {
        let camera = Camera::default();
        let ctx = RenderContext::perspective(&camera, default_viewport(800, 800));
        let expected = ctx.viewport * ctx.projection * ctx.view;
        assert_eq!(ctx.screen_transform(), expected);
        assert_eq!(ctx.projection_view(), ctx.projection * ctx.view);
        // The look-at target lands in the middle of the frame.
        let p = ctx.transform_point(camera.center);
        assert!((p.x / p.w - 400.0).abs() < 1e-3);
        assert!((p.y / p.w - 400.0).abs() < 1e-3);
    }
}
