use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::info;
use threadpool::ThreadPool;

use crate::camera::{Camera, RenderContext};
use crate::error::{RenderError, Result};
use crate::geometry::Vec3f;
use crate::model::Model;
use crate::scene::buffer::{DepthBuffer, FrameBuffer};
use crate::scene::raster::{render_tiled, RasterStats};
use crate::scene::shader::{Shader, Uniforms};
use crate::scene::shaders::{DarbouxShader, FlatShader, GouraudShader, SpecularShader};
use crate::scene::shadow::{render_shadowed, ShadowSetup};

/// Quantization levels of the toon pipeline.
const TOON_BANDS: u32 = 4;

/// Which shader (or pair of passes) renders the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Flat,
    Gouraud,
    Toon,
    Darboux,
    Specular,
    Shadow,
}

impl Pipeline {
    pub const ALL: [Pipeline; 6] = [
        Pipeline::Flat,
        Pipeline::Gouraud,
        Pipeline::Toon,
        Pipeline::Darboux,
        Pipeline::Specular,
        Pipeline::Shadow,
    ];

    pub fn name(self) -> &'static str {
        return match self {
            Pipeline::Flat => "flat",
            Pipeline::Gouraud => "gouraud",
            Pipeline::Toon => "toon",
            Pipeline::Darboux => "darboux",
            Pipeline::Specular => "specular",
            Pipeline::Shadow => "shadow",
        };
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pipeline {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        return Pipeline::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| RenderError::UnknownPipeline(s.to_string()));
    }
}

/// Everything a run needs, filled in from the command line.
#[derive(Debug, Clone)]
pub struct Params {
    pub width: u32,
    pub height: u32,
    pub mesh_path: PathBuf,
    pub pipeline: Pipeline,
    pub threads: usize,
    pub output_dir: PathBuf,
    pub show_window: bool,
}

impl Default for Params {
    fn default() -> Self {
        return Self {
            width: 800,
            height: 800,
            mesh_path: PathBuf::from("obj/african_head.obj"),
            pipeline: Pipeline::Shadow,
            threads: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            output_dir: PathBuf::from("."),
            show_window: false,
        };
    }
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidArgument(format!(
                "frame size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.threads == 0 {
            return Err(RenderError::InvalidArgument("thread count must be positive".to_string()));
        }
        return Ok(());
    }
}

/// Buffers produced by one pipeline.
pub struct Rendered {
    pub frame: FrameBuffer,
    pub depth: DepthBuffer,
    /// Light pass visualization, only for the shadow pipeline.
    pub shadow_view: Option<FrameBuffer>,
    pub stats: RasterStats,
}

/// Frame setup of every pipeline: default camera, light from (1, 1, 1).
pub fn default_setup(width: u32, height: u32) -> ShadowSetup {
    return ShadowSetup::new(Camera::default(), Vec3f::new(1.0, 1.0, 1.0), width, height);
}

fn single_pass<S>(pool: &ThreadPool, faces: usize, shader: S, width: u32, height: u32) -> Result<Rendered>
where
    S: Shader + Clone + Send + 'static,
{
    let mut frame = FrameBuffer::new(width, height);
    let mut depth = DepthBuffer::new(width, height);
    let stats = render_tiled(pool, faces, &shader, &mut frame, &mut depth)?;
    return Ok(Rendered { frame, depth, shadow_view: None, stats });
}

/// Renders `model` with `pipeline` into fresh `width` x `height` buffers.
pub fn render_pipeline(
    pool: &ThreadPool,
    model: Arc<Model>,
    pipeline: Pipeline,
    width: u32,
    height: u32,
) -> Result<Rendered> {
    let setup = default_setup(width, height);
    let uniforms = || Uniforms::new(&RenderContext::perspective(&setup.camera, setup.viewport), setup.light_dir);
    let faces = model.nfaces();
    return match pipeline {
        Pipeline::Flat => single_pass(pool, faces, FlatShader::new(model, uniforms()?), width, height),
        Pipeline::Gouraud => single_pass(pool, faces, GouraudShader::new(model, uniforms()?), width, height),
        Pipeline::Toon => single_pass(pool, faces, GouraudShader::toon(model, uniforms()?, TOON_BANDS), width, height),
        Pipeline::Darboux => single_pass(pool, faces, DarbouxShader::new(model, uniforms()?), width, height),
        Pipeline::Specular => single_pass(pool, faces, SpecularShader::new(model, uniforms()?), width, height),
        Pipeline::Shadow => {
            let shadowed = render_shadowed(pool, &setup, model, width, height)?;
            Ok(Rendered {
                frame: shadowed.frame,
                depth: shadowed.depth,
                shadow_view: Some(shadowed.shadow_view),
                stats: shadowed.main_stats,
            })
        }
    };
}

fn save(image: image::RgbImage, dir: &Path, name: &str) -> Result<()> {
    let path = dir.join(name);
    image.save(&path)?;
    info!("wrote {}", path.display());
    return Ok(());
}

/// Loads the mesh, renders it and writes the images. A missing mesh renders an empty frame.
pub fn run(params: Params) -> Result<()> {
    params.validate()?;
    info!(
        "rendering {} with the {} pipeline at {}x{} on {} threads",
        params.mesh_path.display(),
        params.pipeline,
        params.width,
        params.height,
        params.threads
    );

    let model = Arc::new(Model::load_or_empty(&params.mesh_path));
    let pool = ThreadPool::new(params.threads);

    let start = Instant::now();
    let rendered = render_pipeline(&pool, model, params.pipeline, params.width, params.height)?;
    info!(
        "{} triangles, {} degenerate, {} fragments in {:.2?}",
        rendered.stats.triangles,
        rendered.stats.degenerate,
        rendered.stats.fragments,
        start.elapsed()
    );

    std::fs::create_dir_all(&params.output_dir)?;
    save(rendered.frame.to_image(), &params.output_dir, "output.png")?;
    save(rendered.depth.to_image(), &params.output_dir, "depth.png")?;
    if let Some(shadow_view) = &rendered.shadow_view {
        save(shadow_view.to_image(), &params.output_dir, "shadow.png")?;
    }

    if params.show_window {
        show(&rendered.frame)?;
    }
    return Ok(());
}

#[cfg(feature = "window")]
mod preview {
    use show_image::{create_window, event, ImageInfo, ImageView, WindowOptions};

    use crate::error::{RenderError, Result};
    use crate::scene::buffer::FrameBuffer;

    /// Exit on an Escape key release.
    fn is_exit_event(window_event: event::WindowEvent) -> bool {
        if let event::WindowEvent::KeyboardInput(event) = window_event {
            if event.input.key_code == Some(event::VirtualKeyCode::Escape) && event.input.state.is_released() {
                return true;
            }
        }
        return false;
    }

    /// Shows the frame until the window is closed or Escape is pressed.
    pub fn show(frame: &FrameBuffer) -> Result<()> {
        let (width, height) = (frame.width(), frame.height());
        let window_options = WindowOptions {
            size: Some([width, height]),
            ..Default::default()
        };
        let window = create_window("output", window_options).map_err(|e| RenderError::Preview(e.to_string()))?;
        let pixels = frame.as_rgb_bytes();
        let image = ImageView::new(ImageInfo::rgb8(width, height), &pixels);
        window.set_image("image", image).map_err(|e| RenderError::Preview(e.to_string()))?;

        let event_channel = window.event_channel().map_err(|e| RenderError::Preview(e.to_string()))?;
        for window_event in event_channel.iter() {
            if is_exit_event(window_event) {
                break;
            }
        }
        return Ok(());
    }
}

#[cfg(feature = "window")]
use preview::show;

#[cfg(not(feature = "window"))]
fn show(_frame: &FrameBuffer) -> Result<()> {
    log::warn!("built without the `window` feature, not opening a preview");
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn pipeline_names_round_trip() {
        for pipeline in Pipeline::ALL {
            assert_eq!(pipeline.name().parse::<Pipeline>().unwrap(), pipeline);
        }
        assert!(matches!("phong".parse::<Pipeline>(), Err(RenderError::UnknownPipeline(name)) if name == "phong"));
    }

    #[test]
    fn params_defaults() {
        let params = Params::default();
        assert_eq!((params.width, params.height), (800, 800));
        assert_eq!(params.pipeline, Pipeline::Shadow);
        assert!(params.threads >= 1);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let params = Params { width: 0, ..Params::default() };
        assert!(matches!(params.validate(), Err(RenderError::InvalidArgument(_))));
        let params = Params { threads: 0, ..Params::default() };
        assert!(matches!(params.validate(), Err(RenderError::InvalidArgument(_))));
    }

    #[test]
    fn every_pipeline_draws_a_tetrahedron() {
        let mesh = "\
v 0 0 0.5
v 0.5 0 -0.3
v -0.5 0 -0.3
v 0 0.6 0
f 1 2 4
f 2 3 4
f 3 1 4
f 1 3 2
";
        let model = Arc::new(Model::from_reader(Cursor::new(mesh)).unwrap());
        let pool = ThreadPool::new(2);
        for pipeline in Pipeline::ALL {
            let rendered = render_pipeline(&pool, model.clone(), pipeline, 64, 64).unwrap();
            assert_eq!(rendered.stats.triangles, 4);
            assert!(rendered.stats.fragments > 0, "{} drew nothing", pipeline);
            assert_eq!(rendered.shadow_view.is_some(), pipeline == Pipeline::Shadow);
        }
    }
}
