use nalgebra as na;
use na::SMatrix;

use super::buffer::Color;
use crate::camera::RenderContext;
use crate::error::Result;
use crate::geometry::{embed, invert_transpose, normalize_to, proj, Matrix4f, Vec3f, Vec4f};

/// Per-triangle storage of K interpolable values, one column per triangle corner.
pub type Varying<const K: usize> = SMatrix<f32, K, 3>;

/// The two programmable stages the rasterizer drives.
///
/// For every face `vertex` is called for corners 0, 1 and 2, in that order, before the face is
/// rasterized; it returns the corner in homogeneous screen space (viewport applied, not yet divided
/// by w) and stores whatever the fragment stage needs in the shader's own varyings.
/// `fragment` then gets the barycentric weights of a covered pixel and returns its color,
/// or `None` to discard it.
pub trait Shader {
    fn vertex(&mut self, face: usize, nth: usize) -> Vec4f;
    fn fragment(&self, bar: Vec3f) -> Option<Color>;
}

/// Frame constants shared by the lit shaders of one pass.
#[derive(Debug, Clone, Copy)]
pub struct Uniforms {
    pub vpmv_matrix: Matrix4f,     // Viewport * Projection * View, applied to vertices.
    pub viewport_matrix: Matrix4f, // Kept apart for shaders that need NDC positions.
    pub m_matrix: Matrix4f,        // Projection * View, applied to the light direction.
    pub it_m_matrix: Matrix4f,     // Inverse-transpose of m_matrix, applied to normals.
    pub t_light_direction: Vec3f,  // Unit light direction with m_matrix applied.
}

impl Uniforms {
    /// `light_direction` points from the scene towards the light and must not be zero.
    pub fn new(ctx: &RenderContext, light_direction: Vec3f) -> Result<Self> {
        let m_matrix = ctx.projection_view();
        let it_m_matrix = invert_transpose(&m_matrix)?;
        let t_light_direction = normalize_to(proj::<3, 4>(m_matrix * embed::<4, 3>(light_direction, 0.0)), 1.0);
        return Ok(Self {
            vpmv_matrix: ctx.screen_transform(),
            viewport_matrix: ctx.viewport,
            m_matrix,
            it_m_matrix,
            t_light_direction,
        });
    }

    /// Homogeneous screen position of a model vertex.
    pub fn to_screen(&self, v: Vec3f) -> Vec4f {
        return self.vpmv_matrix * embed::<4, 3>(v, 1.0);
    }

    /// Model normal in the frame the light direction lives in.
    pub fn transform_normal(&self, n: Vec3f) -> Vec3f {
        return normalize_to(proj::<3, 4>(self.it_m_matrix * embed::<4, 3>(n, 0.0)), 1.0);
    }
}

/// Barycentric blend of the three corner values.
pub fn interpolate<const K: usize>(varying: &Varying<K>, bar: Vec3f) -> na::SVector<f32, K> {
    return varying * bar;
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::matrix;

    #[test]
    fn light_is_unit_and_normals_stay_perpendicular() {
        use crate::camera::{default_viewport, Camera};

        let camera = Camera::default();
        let ctx = RenderContext::perspective(&camera, default_viewport(100, 100));
        let uniforms = Uniforms::new(&ctx, Vec3f::new(1.0, 1.0, 1.0)).unwrap();
        assert!((uniforms.t_light_direction.norm() - 1.0).abs() < 1e-5);

        // A tangent of the plane y = 0 against that plane's normal, both through the pipeline.
        let tangent = proj::<3, 4>(uniforms.m_matrix * embed::<4, 3>(Vec3f::new(1.0, 0.0, 2.0), 0.0));
        let normal = uniforms.transform_normal(Vec3f::new(0.0, 1.0, 0.0));
        assert!((normal.norm() - 1.0).abs() < 1e-5);
        assert!(tangent.dot(&normal).abs() < 1e-4);
    }

    #[test]
    fn interpolation_weights_columns() {
        let uv: Varying<2> = matrix![0.0, 1.0, 0.0;
                                     0.0, 0.0, 1.0];
        let mid = interpolate(&uv, Vec3f::new(0.5, 0.25, 0.25));
        assert_eq!(mid, na::Vector2::new(0.25, 0.25));
        let corner = interpolate(&uv, Vec3f::new(0.0, 1.0, 0.0));
        assert_eq!(corner, na::Vector2::new(1.0, 0.0));
    }
}
