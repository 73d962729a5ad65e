//! Concrete shading strategies.
//!
//! Each shader owns its varyings, filled by `vertex` for the triangle currently being drawn and
//! read by `fragment`. Mesh data is shared through `Arc<Model>` so shaders are cheap to clone,
//! which the tiled renderer does once per band.

use std::sync::Arc;

use super::buffer::{Color, DepthBuffer};
use super::shader::{interpolate, Shader, Uniforms, Varying};
use crate::camera::DEPTH;
use crate::geometry::{embed, invert, normalize_to, proj, round_to_pixel, Matrix3f, Matrix4f, Vec2f, Vec3f, Vec4f};
use crate::model::Model;

/// Depth units a surface may sit below the shadow buffer and still count as lit.
pub const SHADOW_BIAS: f32 = 1.0;

/// Added to every channel by the specular shader.
const SPECULAR_AMBIENT: f32 = 5.0;
/// Floor of the shadow shader, so shadowed regions are never fully black.
pub const SHADOW_AMBIENT: f32 = 20.0;
const SPECULAR_WEIGHT: f32 = 0.6;

/// Normal used for lighting: the global normal map when the model has one,
/// the interpolated vertex normal otherwise. Both in the light's frame.
fn shading_normal(model: &Model, uniforms: &Uniforms, uv: Vec2f, interpolated: Vec3f) -> Vec3f {
    return match model.normal_map(uv) {
        Some(n) => uniforms.transform_normal(n),
        None => normalize_to(interpolated, 1.0),
    };
}

/// Lambert and Phong terms for a unit normal `n` and unit light `l`.
/// The view direction is +z in the transformed frame, so only r.z matters.
fn phong_terms(n: Vec3f, l: Vec3f, exponent: f32) -> (f32, f32) {
    let r = normalize_to(n * (n.dot(&l) * 2.0) - l, 1.0);
    let spec = r.z.max(0.0).powf(exponent);
    let diff = n.dot(&l).max(0.0);
    return (diff, spec);
}

/// One intensity per face from the face normal, back faces discarded.
#[derive(Clone)]
pub struct FlatShader {
    model: Arc<Model>,
    uniforms: Uniforms,
    face_intensity: f32,
    varying_uv: Varying<2>,
}

impl FlatShader {
    pub fn new(model: Arc<Model>, uniforms: Uniforms) -> Self {
        return Self { model, uniforms, face_intensity: 0.0, varying_uv: Varying::<2>::zeros() };
    }
}

impl Shader for FlatShader {
    fn vertex(&mut self, face: usize, nth: usize) -> Vec4f {
        if nth == 0 {
            let normal = self.uniforms.transform_normal(self.model.face_normal(face));
            self.face_intensity = normal.dot(&self.uniforms.t_light_direction);
        }
        self.varying_uv.set_column(nth, &self.model.uv(face, nth));
        return self.uniforms.to_screen(self.model.vert(face, nth));
    }

    fn fragment(&self, bar: Vec3f) -> Option<Color> {
        // NaN (degenerate face normal) fails this as well.
        if !(self.face_intensity > 0.0) {
            return None;
        }
        let color = self.model.diffuse(interpolate(&self.varying_uv, bar));
        return Some(Color::blend(color, Color::BLACK, self.face_intensity));
    }
}

/// Per-vertex lighting interpolated across the face.
/// With `bands` set the intensity is quantized for a cel-shaded look.
#[derive(Clone)]
pub struct GouraudShader {
    model: Arc<Model>,
    uniforms: Uniforms,
    bands: Option<u32>,
    varying_intensity: Vec3f,
    varying_uv: Varying<2>,
}

impl GouraudShader {
    pub fn new(model: Arc<Model>, uniforms: Uniforms) -> Self {
        return Self {
            model,
            uniforms,
            bands: None,
            varying_intensity: Vec3f::zeros(),
            varying_uv: Varying::<2>::zeros(),
        };
    }

    pub fn toon(model: Arc<Model>, uniforms: Uniforms, bands: u32) -> Self {
        return Self { bands: Some(bands.max(1)), ..Self::new(model, uniforms) };
    }
}

/// Snaps an intensity in [0, 1] to one of `bands` levels. The darkest band is black, the top one 1.
pub fn quantize(intensity: f32, bands: u32) -> f32 {
    let bands = bands as f32;
    let level = (intensity.clamp(0.0, 1.0) * bands).floor().min(bands - 1.0);
    if level == 0.0 {
        return 0.0;
    }
    return (level + 1.0) / bands;
}

impl Shader for GouraudShader {
    fn vertex(&mut self, face: usize, nth: usize) -> Vec4f {
        let normal = self.uniforms.transform_normal(self.model.normal(face, nth));
        self.varying_intensity[nth] = normal.dot(&self.uniforms.t_light_direction).max(0.0);
        self.varying_uv.set_column(nth, &self.model.uv(face, nth));
        return self.uniforms.to_screen(self.model.vert(face, nth));
    }

    fn fragment(&self, bar: Vec3f) -> Option<Color> {
        let mut intensity = self.varying_intensity.dot(&bar);
        if let Some(bands) = self.bands {
            intensity = quantize(intensity, bands);
        }
        let color = self.model.diffuse(interpolate(&self.varying_uv, bar));
        return Some(color.shade(0.0, intensity));
    }
}

/// Diffuse lighting with a tangent-space normal map.
///
/// The Darboux frame of each pixel is rebuilt from the triangle's NDC edges, its uv deltas and
/// the interpolated normal; the sampled tangent normal is then taken out of that frame.
#[derive(Clone)]
pub struct DarbouxShader {
    model: Arc<Model>,
    uniforms: Uniforms,
    varying_uv: Varying<2>,
    varying_nrm: Varying<3>, // Normals in the light's frame, per vertex.
    ndc_tri: Varying<3>,     // Triangle in normalized device coordinates.
}

impl DarbouxShader {
    pub fn new(model: Arc<Model>, uniforms: Uniforms) -> Self {
        return Self {
            model,
            uniforms,
            varying_uv: Varying::<2>::zeros(),
            varying_nrm: Varying::<3>::zeros(),
            ndc_tri: Varying::<3>::zeros(),
        };
    }

    /// Tangent-space normal `tangent` expressed in the light's frame, `None` when the
    /// local basis is singular.
    fn from_darboux(&self, bn: Vec3f, tangent: Vec3f) -> Option<Vec3f> {
        let mut a = Matrix3f::zeros();
        a.set_row(0, &(self.ndc_tri.column(1) - self.ndc_tri.column(0)).transpose());
        a.set_row(1, &(self.ndc_tri.column(2) - self.ndc_tri.column(0)).transpose());
        a.set_row(2, &bn.transpose());
        let ai = invert(&a).ok()?;

        let uv = &self.varying_uv;
        let i = ai * Vec3f::new(uv[(0, 1)] - uv[(0, 0)], uv[(0, 2)] - uv[(0, 0)], 0.0);
        let j = ai * Vec3f::new(uv[(1, 1)] - uv[(1, 0)], uv[(1, 2)] - uv[(1, 0)], 0.0);
        if i.norm() == 0.0 || j.norm() == 0.0 {
            return None;
        }

        let mut b = Matrix3f::zeros();
        b.set_column(0, &i.normalize());
        b.set_column(1, &j.normalize());
        b.set_column(2, &bn);
        let n = b * tangent;
        if n.norm() == 0.0 {
            return None;
        }
        return Some(n.normalize());
    }
}

impl Shader for DarbouxShader {
    fn vertex(&mut self, face: usize, nth: usize) -> Vec4f {
        self.varying_uv.set_column(nth, &self.model.uv(face, nth));
        self.varying_nrm
            .set_column(nth, &self.uniforms.transform_normal(self.model.normal(face, nth)));
        let gl_vertex = self.uniforms.m_matrix * embed::<4, 3>(self.model.vert(face, nth), 1.0);
        self.ndc_tri.set_column(nth, &proj::<3, 4>(gl_vertex / gl_vertex.w));
        return self.uniforms.viewport_matrix * gl_vertex;
    }

    fn fragment(&self, bar: Vec3f) -> Option<Color> {
        let bn = normalize_to(interpolate(&self.varying_nrm, bar), 1.0);
        let uv = interpolate(&self.varying_uv, bar);
        let n = self
            .model
            .tangent_normal(uv)
            .and_then(|tangent| self.from_darboux(bn, tangent))
            .unwrap_or(bn);
        let diff = n.dot(&self.uniforms.t_light_direction).max(0.0);
        return Some(self.model.diffuse(uv).shade(0.0, diff));
    }
}

/// Phong reflection: diffuse plus a specular highlight from the per-pixel reflected light.
#[derive(Clone)]
pub struct SpecularShader {
    model: Arc<Model>,
    uniforms: Uniforms,
    varying_uv: Varying<2>,
    varying_nrm: Varying<3>,
}

impl SpecularShader {
    pub fn new(model: Arc<Model>, uniforms: Uniforms) -> Self {
        return Self { model, uniforms, varying_uv: Varying::<2>::zeros(), varying_nrm: Varying::<3>::zeros() };
    }
}

impl Shader for SpecularShader {
    fn vertex(&mut self, face: usize, nth: usize) -> Vec4f {
        self.varying_uv.set_column(nth, &self.model.uv(face, nth));
        self.varying_nrm
            .set_column(nth, &self.uniforms.transform_normal(self.model.normal(face, nth)));
        return self.uniforms.to_screen(self.model.vert(face, nth));
    }

    fn fragment(&self, bar: Vec3f) -> Option<Color> {
        let uv = interpolate(&self.varying_uv, bar);
        let n = shading_normal(&self.model, &self.uniforms, uv, interpolate(&self.varying_nrm, bar));
        let (diff, spec) = phong_terms(n, self.uniforms.t_light_direction, self.model.specular(uv));
        let color = self.model.diffuse(uv);
        return Some(color.shade(SPECULAR_AMBIENT, diff + SPECULAR_WEIGHT * spec));
    }
}

/// Depth-only pass. The interesting output is the depth buffer, the color is a grey ramp of
/// the same depth for looking at.
#[derive(Clone)]
pub struct DepthShader {
    model: Arc<Model>,
    vpmv_matrix: Matrix4f,
    varying_tri: Varying<3>,
}

impl DepthShader {
    pub fn new(model: Arc<Model>, vpmv_matrix: Matrix4f) -> Self {
        return Self { model, vpmv_matrix, varying_tri: Varying::<3>::zeros() };
    }
}

impl Shader for DepthShader {
    fn vertex(&mut self, face: usize, nth: usize) -> Vec4f {
        let gl_vertex = self.vpmv_matrix * embed::<4, 3>(self.model.vert(face, nth), 1.0);
        self.varying_tri.set_column(nth, &proj::<3, 4>(gl_vertex / gl_vertex.w));
        return gl_vertex;
    }

    fn fragment(&self, bar: Vec3f) -> Option<Color> {
        let p = interpolate(&self.varying_tri, bar);
        return Some(Color::blend(Color::WHITE, Color::BLACK, p.z / DEPTH));
    }
}

/// Specular shading attenuated where the shadow buffer says the light is blocked.
#[derive(Clone)]
pub struct ShadowShader {
    model: Arc<Model>,
    uniforms: Uniforms,
    shadow_buffer: Arc<DepthBuffer>,
    shadow_matrix: Matrix4f, // Main screen space to shadow buffer screen space.
    varying_uv: Varying<2>,
    varying_nrm: Varying<3>,
    varying_tri: Varying<4>, // Undivided screen positions.
}

impl ShadowShader {
    pub fn new(model: Arc<Model>, uniforms: Uniforms, shadow_buffer: Arc<DepthBuffer>, shadow_matrix: Matrix4f) -> Self {
        return Self {
            model,
            uniforms,
            shadow_buffer,
            shadow_matrix,
            varying_uv: Varying::<2>::zeros(),
            varying_nrm: Varying::<3>::zeros(),
            varying_tri: Varying::<4>::zeros(),
        };
    }

    /// Whether the light reaches the point at `screen` (homogeneous, main pass screen space).
    /// Points that fall outside the shadow buffer are lit.
    pub fn is_lit(&self, screen: Vec4f) -> bool {
        let sb_p = self.shadow_matrix * screen;
        let sb_p = sb_p / sb_p.w;
        if !sb_p.iter().all(|c| c.is_finite()) {
            return true;
        }
        let pixel = round_to_pixel(Vec2f::new(sb_p.x, sb_p.y));
        return match self.shadow_buffer.get(pixel.x, pixel.y) {
            Some(stored) => stored < sb_p.z + SHADOW_BIAS,
            None => true,
        };
    }
}

impl Shader for ShadowShader {
    fn vertex(&mut self, face: usize, nth: usize) -> Vec4f {
        self.varying_uv.set_column(nth, &self.model.uv(face, nth));
        self.varying_nrm
            .set_column(nth, &self.uniforms.transform_normal(self.model.normal(face, nth)));
        let gl_vertex = self.uniforms.to_screen(self.model.vert(face, nth));
        self.varying_tri.set_column(nth, &gl_vertex);
        return gl_vertex;
    }

    fn fragment(&self, bar: Vec3f) -> Option<Color> {
        let shadow = if self.is_lit(interpolate(&self.varying_tri, bar)) { 1.0 } else { 0.3 };
        let uv = interpolate(&self.varying_uv, bar);
        let n = shading_normal(&self.model, &self.uniforms, uv, interpolate(&self.varying_nrm, bar));
        let (diff, spec) = phong_terms(n, self.uniforms.t_light_direction, self.model.specular(uv));
        let color = self.model.diffuse(uv);
        return Some(color.shade(SHADOW_AMBIENT, shadow * (1.2 * diff + SPECULAR_WEIGHT * spec)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{default_viewport, Camera, RenderContext};
    use crate::scene::buffer::FrameBuffer;
    use crate::scene::raster::render;
    use std::io::Cursor;

    // Unit square in the z = 0 plane facing +z, two triangles.
    const SQUARE: &str = "\
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vn 0 0 1
f 1//1 2//1 3//1
f 1//1 3//1 4//1
";

    fn square() -> Arc<Model> {
        return Arc::new(Model::from_reader(Cursor::new(SQUARE)).unwrap());
    }

    fn frontal(light: Vec3f) -> Uniforms {
        let camera = Camera { eye: Vec3f::new(0.0, 0.0, 3.0), ..Camera::default() };
        let ctx = RenderContext::perspective(&camera, default_viewport(64, 64));
        return Uniforms::new(&ctx, light).unwrap();
    }

    fn center_pixel<S: Shader>(mut shader: S) -> Option<Color> {
        let mut frame = FrameBuffer::new(64, 64);
        let mut depth = DepthBuffer::new(64, 64);
        render(2, &mut shader, &mut frame, &mut depth);
        return frame.get(32, 32);
    }

    #[test]
    fn quantize_has_discrete_levels() {
        assert_eq!(quantize(0.05, 4), 0.0);
        assert_eq!(quantize(0.3, 4), 0.5);
        assert_eq!(quantize(0.6, 4), 0.75);
        assert_eq!(quantize(0.99, 4), 1.0);
        assert_eq!(quantize(1.0, 4), 1.0);
    }

    #[test]
    fn phong_terms_facing_light() {
        let z = Vec3f::new(0.0, 0.0, 1.0);
        let (diff, spec) = phong_terms(z, z, 8.0);
        assert!((diff - 1.0).abs() < 1e-6);
        assert!((spec - 1.0).abs() < 1e-6);
        let (diff, _) = phong_terms(z, -z, 8.0);
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn flat_shader_discards_back_faces() {
        let lit = center_pixel(FlatShader::new(square(), frontal(Vec3f::new(0.0, 0.0, 1.0))));
        assert!(lit.unwrap().r >= 254, "{:?}", lit);
        let unlit = center_pixel(FlatShader::new(square(), frontal(Vec3f::new(0.0, 0.0, -1.0))));
        assert_eq!(unlit, Some(Color::BLACK));
    }

    #[test]
    fn lit_shaders_brighten_towards_the_light() {
        let toward = Vec3f::new(0.0, 0.0, 1.0);
        let grazing = Vec3f::new(1.0, 0.0, 0.2);
        let pairs = [
            (center_pixel(GouraudShader::new(square(), frontal(toward))), center_pixel(GouraudShader::new(square(), frontal(grazing)))),
            (center_pixel(DarbouxShader::new(square(), frontal(toward))), center_pixel(DarbouxShader::new(square(), frontal(grazing)))),
            (center_pixel(SpecularShader::new(square(), frontal(toward))), center_pixel(SpecularShader::new(square(), frontal(grazing)))),
        ];
        for (bright, dim) in pairs {
            let (bright, dim) = (bright.unwrap(), dim.unwrap());
            assert!(bright.luminance() > dim.luminance(), "{:?} vs {:?}", bright, dim);
        }
    }

    #[test]
    fn toon_shader_uses_few_levels() {
        let shader = GouraudShader::toon(square(), frontal(Vec3f::new(0.3, 0.2, 1.0)), 3);
        let color = center_pixel(shader).unwrap();
        assert!([0, 170, 255].contains(&color.r), "{:?}", color);
    }

    #[test]
    fn darboux_flat_tangent_normal_matches_plain_normal() {
        // A tangent map of (0, 0, 1) everywhere is the unperturbed surface.
        let map = crate::texture::Texture::from_image(image::RgbImage::from_pixel(4, 4, image::Rgb([128, 128, 255])));
        let uv_square = "\
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1
f 1/1/1 3/3/1 4/4/1
";
        let model = Model::from_reader(Cursor::new(uv_square)).unwrap();
        let light = Vec3f::new(0.4, 0.3, 1.0);
        let plain = center_pixel(DarbouxShader::new(Arc::new(model.clone()), frontal(light))).unwrap();
        let mapped = center_pixel(DarbouxShader::new(Arc::new(model.with_tangent_map(map)), frontal(light))).unwrap();
        assert!((plain.r as i32 - mapped.r as i32).abs() <= 3, "{:?} vs {:?}", plain, mapped);
    }

    #[test]
    fn depth_shader_fills_depth_buffer() {
        let ctx = RenderContext::orthographic(&Camera { eye: Vec3f::new(0.0, 0.0, 1.0), ..Camera::default() }, default_viewport(64, 64));
        let mut shader = DepthShader::new(square(), ctx.screen_transform());
        let mut frame = FrameBuffer::new(64, 64);
        let mut depth = DepthBuffer::new(64, 64);
        render(2, &mut shader, &mut frame, &mut depth);
        assert!((depth.get(32, 32).unwrap() - DEPTH / 2.0).abs() < 1e-3);
        assert_eq!(depth.get(2, 2), Some(f32::NEG_INFINITY));
    }

    #[test]
    fn shadow_lookup_outside_buffer_is_lit() {
        let uniforms = frontal(Vec3f::new(0.0, 0.0, 1.0));
        let mut blocked = DepthBuffer::new(8, 8);
        for x in 0..8 {
            for y in 0..8 {
                blocked.set(x, y, 1000.0);
            }
        }
        let shader = ShadowShader::new(square(), uniforms, Arc::new(blocked), Matrix4f::identity());
        assert!(!shader.is_lit(Vec4f::new(3.0, 3.0, 10.0, 1.0)));
        assert!(shader.is_lit(Vec4f::new(30.0, 3.0, 10.0, 1.0)));
        assert!(shader.is_lit(Vec4f::new(3.0, 3.0, 2000.0, 1.0)));
    }
}
