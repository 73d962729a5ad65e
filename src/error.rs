use std::fmt;
use std::io;

/// Everything that can go wrong outside of the per-pixel loop.
/// Bad triangles are not errors, the rasterizer just skips them.
#[derive(Debug)]
pub enum RenderError {
    /// Tried to invert a matrix whose determinant is (numerically) zero.
    DegenerateTransform { determinant: f32 },
    Io(io::Error),
    Image(image::ImageError),
    Obj(obj::ObjError),
    UnknownPipeline(String),
    InvalidArgument(String),
    /// A render worker died before handing its tile back.
    WorkerFailed(String),
    /// The preview window could not be opened or updated.
    Preview(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::DegenerateTransform { determinant } => {
                write!(f, "degenerate transform, determinant is {}", determinant)
            }
            RenderError::Io(err) => write!(f, "i/o error: {}", err),
            RenderError::Image(err) => write!(f, "image error: {}", err),
            RenderError::Obj(err) => write!(f, "obj error: {}", err),
            RenderError::UnknownPipeline(name) => write!(f, "unknown shader pipeline '{}'", name),
            RenderError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            RenderError::WorkerFailed(msg) => write!(f, "render worker failed: {}", msg),
            RenderError::Preview(msg) => write!(f, "preview window: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Io(err) => Some(err),
            RenderError::Image(err) => Some(err),
            RenderError::Obj(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for RenderError {
    fn from(err: io::Error) -> Self {
        RenderError::Io(err)
    }
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Image(err)
    }
}

impl From<obj::ObjError> for RenderError {
    fn from(err: obj::ObjError) -> Self {
        RenderError::Obj(err)
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
