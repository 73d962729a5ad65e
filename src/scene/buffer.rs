use image::{imageops, ImageBuffer, Rgb, RgbImage};

/// Struct, representing raw rgb8 pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Color {
        return Color { r, g, b };
    }

    /// Get convex combination of two colors: t * c_1 + (1 - t) * c_2.
    /// t is unrestricted, channels saturate.
    pub fn blend(color_1: Color, color_2: Color, t: f32) -> Color {
        let mix = |a: u8, b: u8| (t * a as f32 + (1.0 - t) * b as f32).clamp(0.0, 255.0) as u8;
        return Color {
            r: mix(color_1.r, color_2.r),
            g: mix(color_1.g, color_2.g),
            b: mix(color_1.b, color_2.b),
        };
    }

    /// `ambient + self * t` per channel, saturating at 255.
    pub fn shade(self, ambient: f32, t: f32) -> Color {
        let f = |c: u8| (ambient + c as f32 * t).clamp(0.0, 255.0) as u8;
        return Color { r: f(self.r), g: f(self.g), b: f(self.b) };
    }

    /// Channel sum, a cheap brightness for comparisons.
    pub fn luminance(self) -> u32 {
        return self.r as u32 + self.g as u32 + self.b as u32;
    }
}

impl From<Rgb<u8>> for Color {
    fn from(pixel: Rgb<u8>) -> Self {
        return Color { r: pixel.0[0], g: pixel.0[1], b: pixel.0[2] };
    }
}

impl From<Color> for Rgb<u8> {
    fn from(color: Color) -> Self {
        return Rgb([color.r, color.g, color.b]);
    }
}

/// Rows `[origin_y, origin_y + height)` of a `full_width` wide frame.
/// A whole frame has `origin_y = 0`; bands come from `split_rows`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Extent {
    width: u32,
    height: u32,
    origin_y: u32,
}

impl Extent {
    /// Index into the flat storage for an absolute pixel coordinate.
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < self.origin_y as i32 {
            return None;
        }
        let (x, local_y) = (x as u32, (y - self.origin_y as i32) as u32);
        if x >= self.width || local_y >= self.height {
            return None;
        }
        return Some((x + local_y * self.width) as usize);
    }

    /// Band extents of at most `rows` rows covering this extent.
    fn bands(&self, rows: u32) -> Vec<Extent> {
        let rows = rows.max(1);
        let mut bands = Vec::new();
        let mut y = 0;
        while y < self.height {
            let height = rows.min(self.height - y);
            bands.push(Extent { width: self.width, height, origin_y: self.origin_y + y });
            y += height;
        }
        return bands;
    }
}

/// Frame buffer with flat rgb8 pixel data.
/// (0, 0) is the bottom left pixel, the image is flipped when exported.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    extent: Extent,
    pixels: Vec<Color>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        return Self::band(width, height, 0);
    }

    fn band(width: u32, height: u32, origin_y: u32) -> Self {
        return Self {
            extent: Extent { width, height, origin_y },
            pixels: vec![Color::BLACK; (width * height) as usize],
        };
    }

    pub fn width(&self) -> u32 {
        return self.extent.width;
    }

    pub fn height(&self) -> u32 {
        return self.extent.height;
    }

    /// First absolute row this buffer holds.
    pub fn origin_y(&self) -> u32 {
        return self.extent.origin_y;
    }

    /// Absolute pixel rectangle `(x_min, y_min, x_max, y_max)`, inclusive.
    pub fn pixel_bounds(&self) -> (i32, i32, i32, i32) {
        let e = self.extent;
        return (0, e.origin_y as i32, e.width as i32 - 1, (e.origin_y + e.height) as i32 - 1);
    }

    pub fn get(&self, x: i32, y: i32) -> Option<Color> {
        return self.extent.index(x, y).map(|i| self.pixels[i]);
    }

    /// Writes are ignored outside the buffer.
    pub fn set(&mut self, x: i32, y: i32, color: Color) {
        if let Some(i) = self.extent.index(x, y) {
            self.pixels[i] = color;
        }
    }

    pub fn clear(&mut self, color: Color) {
        self.pixels.iter_mut().for_each(|p| *p = color);
    }

    /// Cuts the buffer into horizontal bands of `rows` rows, bottom band first.
    pub fn split_rows(self, rows: u32) -> Vec<FrameBuffer> {
        let width = self.extent.width as usize;
        return self
            .extent
            .bands(rows)
            .into_iter()
            .map(|extent| {
                let start = (extent.origin_y - self.extent.origin_y) as usize * width;
                let end = start + extent.height as usize * width;
                FrameBuffer { extent, pixels: self.pixels[start..end].to_vec() }
            })
            .collect();
    }

    /// Reassembles bands produced by `split_rows`, in any order.
    pub fn join_rows(mut bands: Vec<FrameBuffer>) -> Option<FrameBuffer> {
        bands.sort_by_key(|b| b.extent.origin_y);
        let first = bands.first()?.extent;
        let height = bands.iter().map(|b| b.extent.height).sum();
        let mut pixels = Vec::with_capacity((first.width * height) as usize);
        for band in bands {
            pixels.extend(band.pixels);
        }
        return Some(FrameBuffer {
            extent: Extent { width: first.width, height, origin_y: first.origin_y },
            pixels,
        });
    }

    /// Converts to an image with the usual top-left origin.
    pub fn to_image(&self) -> RgbImage {
        let mut image: RgbImage = ImageBuffer::from_fn(self.width(), self.height(), |x, y| {
            Rgb::from(self.pixels[(x + y * self.width()) as usize])
        });
        imageops::flip_vertical_in_place(&mut image);
        return image;
    }

    /// Flat rgb8 bytes, top row first, for displaying.
    pub fn as_rgb_bytes(&self) -> Vec<u8> {
        return self.to_image().into_raw();
    }
}

/// Per-pixel depth, `f32::NEG_INFINITY` where nothing is drawn yet. Greater values are closer.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    extent: Extent,
    depth: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        return Self {
            extent: Extent { width, height, origin_y: 0 },
            depth: vec![f32::NEG_INFINITY; (width * height) as usize],
        };
    }

    pub fn width(&self) -> u32 {
        return self.extent.width;
    }

    pub fn height(&self) -> u32 {
        return self.extent.height;
    }

    pub fn get(&self, x: i32, y: i32) -> Option<f32> {
        return self.extent.index(x, y).map(|i| self.depth[i]);
    }

    /// Whether a fragment at `z` is at least as close as what is stored.
    /// Out of bounds pixels never pass.
    pub fn test(&self, x: i32, y: i32, z: f32) -> bool {
        return match self.get(x, y) {
            Some(stored) => z >= stored,
            None => false,
        };
    }

    pub fn set(&mut self, x: i32, y: i32, z: f32) {
        if let Some(i) = self.extent.index(x, y) {
            self.depth[i] = z;
        }
    }

    pub fn clear(&mut self) {
        self.depth.iter_mut().for_each(|d| *d = f32::NEG_INFINITY);
    }

    pub fn split_rows(self, rows: u32) -> Vec<DepthBuffer> {
        let width = self.extent.width as usize;
        return self
            .extent
            .bands(rows)
            .into_iter()
            .map(|extent| {
                let start = (extent.origin_y - self.extent.origin_y) as usize * width;
                let end = start + extent.height as usize * width;
                DepthBuffer { extent, depth: self.depth[start..end].to_vec() }
            })
            .collect();
    }

    pub fn join_rows(mut bands: Vec<DepthBuffer>) -> Option<DepthBuffer> {
        bands.sort_by_key(|b| b.extent.origin_y);
        let first = bands.first()?.extent;
        let height = bands.iter().map(|b| b.extent.height).sum();
        let mut depth = Vec::with_capacity((first.width * height) as usize);
        for band in bands {
            depth.extend(band.depth);
        }
        return Some(DepthBuffer {
            extent: Extent { width: first.width, height, origin_y: first.origin_y },
            depth,
        });
    }

    /// Image, representing z-buffer values scaled to the drawn range. Empty pixels are black.
    pub fn to_image(&self) -> RgbImage {
        let drawn = self.depth.iter().copied().filter(|z| z.is_finite());
        let (z_min, z_max) = drawn.fold((f32::MAX, f32::MIN), |(lo, hi), z| (lo.min(z), hi.max(z)));
        let scale = if z_max > z_min { z_max - z_min } else { 1.0 };
        let mut image: RgbImage = ImageBuffer::from_fn(self.width(), self.height(), |x, y| {
            let z = self.depth[(x + y * self.width()) as usize];
            if !z.is_finite() {
                return Rgb([0, 0, 0]);
            }
            let value = (32.0 + 223.0 * (z - z_min) / scale) as u8;
            Rgb([value, value, value])
        });
        imageops::flip_vertical_in_place(&mut image);
        return image;
    }
}
