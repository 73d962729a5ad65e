use std::path::Path;

use image::RgbImage;

use crate::error::Result;
use crate::geometry::{Vec2f, Vec3f};
use crate::scene::buffer::Color;

/// An rgb8 image looked up by uv coordinates.
/// uv (0, 0) is the bottom left corner of the image, as in OBJ files.
#[derive(Debug, Clone)]
pub struct Texture {
    image: RgbImage,
}

impl Texture {
    pub fn open(path: &Path) -> Result<Texture> {
        let image = image::open(path)?.to_rgb8();
        return Ok(Texture { image });
    }

    pub fn from_image(image: RgbImage) -> Texture {
        return Texture { image };
    }

    /// Nearest texel, uv outside [0, 1] is clamped to the border.
    pub fn sample(&self, uv: Vec2f) -> Color {
        let (w, h) = self.image.dimensions();
        if w == 0 || h == 0 {
            return Color::WHITE;
        }
        let x = ((uv.x * w as f32) as i64).clamp(0, w as i64 - 1) as u32;
        let y = (((1.0 - uv.y) * h as f32) as i64).clamp(0, h as i64 - 1) as u32;
        return Color::from(*self.image.get_pixel(x, y));
    }

    /// Texel decoded as a direction, each channel mapped from [0, 255] to [-1, 1].
    pub fn sample_direction(&self, uv: Vec2f) -> Vec3f {
        let c = self.sample(uv);
        let decode = |v: u8| v as f32 / 255.0 * 2.0 - 1.0;
        return Vec3f::new(decode(c.r), decode(c.g), decode(c.b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn two_rows() -> Texture {
        // Top row red, bottom row blue.
        let image = RgbImage::from_fn(2, 2, |_, y| if y == 0 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) });
        return Texture::from_image(image);
    }

    #[test]
    fn v_axis_points_up() {
        let texture = two_rows();
        assert_eq!(texture.sample(Vec2f::new(0.2, 0.9)), Color::new(255, 0, 0));
        assert_eq!(texture.sample(Vec2f::new(0.2, 0.1)), Color::new(0, 0, 255));
    }

    #[test]
    fn outside_uv_is_clamped() {
        let texture = two_rows();
        assert_eq!(texture.sample(Vec2f::new(-3.0, 5.0)), Color::new(255, 0, 0));
        assert_eq!(texture.sample(Vec2f::new(7.0, -1.0)), Color::new(0, 0, 255));
    }

    #[test]
    fn directions_decode_to_unit_range() {
        let texture = Texture::from_image(RgbImage::from_pixel(1, 1, Rgb([128, 128, 255])));
        let n = texture.sample_direction(Vec2f::new(0.5, 0.5));
        assert!(n.x.abs() < 0.01 && n.y.abs() < 0.01);
        assert!((n.z - 1.0).abs() < 1e-6);
    }
}
