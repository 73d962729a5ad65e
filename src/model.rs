use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{info, warn};
use obj::raw::object::Polygon;
use obj::raw::parse_obj;

use crate::error::Result;
use crate::geometry::{cross, Vec2f, Vec3f};
use crate::scene::buffer::Color;
use crate::texture::Texture;

/// Specular exponent used when the model has no specular map.
pub const DEFAULT_SPECULAR: f32 = 16.0;

/// One triangle corner, indices into the model's position/uv/normal lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Corner {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

/// Triangulated mesh with its optional texture maps.
#[derive(Debug, Clone, Default)]
pub struct Model {
    positions: Vec<Vec3f>,
    uvs: Vec<Vec2f>,
    normals: Vec<Vec3f>,
    faces: Vec<[Corner; 3]>,
    diffuse_map: Option<Texture>,
    normal_map: Option<Texture>,
    tangent_map: Option<Texture>,
    specular_map: Option<Texture>,
}

impl Model {
    /// Loads an OBJ file and the texture maps lying next to it:
    /// `<stem>_diffuse.tga`, `<stem>_nm.tga`, `<stem>_nm_tangent.tga` and `<stem>_spec.tga`.
    pub fn load(path: &Path) -> Result<Model> {
        let file = File::open(path)?;
        let mut model = Model::from_reader(BufReader::new(file))?;
        info!(
            "loaded {}: {} vertices, {} triangles",
            path.display(),
            model.nverts(),
            model.nfaces()
        );
        model.diffuse_map = load_map(path, "_diffuse.tga");
        model.normal_map = load_map(path, "_nm.tga");
        model.tangent_map = load_map(path, "_nm_tangent.tga");
        model.specular_map = load_map(path, "_spec.tga");
        return Ok(model);
    }

    /// Like `load`, but an unreadable mesh gives an empty model, which renders nothing.
    pub fn load_or_empty(path: &Path) -> Model {
        return match Model::load(path) {
            Ok(model) => model,
            Err(err) => {
                warn!("can't load mesh {}: {}, rendering an empty scene", path.display(), err);
                Model::default()
            }
        };
    }

    /// Parses OBJ text. Polygons are fan-triangulated, faces pointing at missing
    /// vertices are dropped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Model> {
        let raw = parse_obj(reader)?;
        let mut model = Model {
            positions: raw.positions.iter().map(|p| Vec3f::new(p.0, p.1, p.2)).collect(),
            uvs: raw.tex_coords.iter().map(|t| Vec2f::new(t.0, t.1)).collect(),
            normals: raw.normals.iter().map(|n| Vec3f::new(n.0, n.1, n.2)).collect(),
            ..Default::default()
        };

        let mut dropped = 0;
        for polygon in &raw.polygons {
            let corners: Vec<Corner> = match polygon {
                Polygon::P(v) => v.iter().map(|&p| Corner { position: p, uv: None, normal: None }).collect(),
                Polygon::PT(v) => v.iter().map(|&(p, t)| Corner { position: p, uv: Some(t), normal: None }).collect(),
                Polygon::PN(v) => v.iter().map(|&(p, n)| Corner { position: p, uv: None, normal: Some(n) }).collect(),
                Polygon::PTN(v) => v
                    .iter()
                    .map(|&(p, t, n)| Corner { position: p, uv: Some(t), normal: Some(n) })
                    .collect(),
            };
            if corners.len() < 3 || !corners.iter().all(|c| model.corner_is_valid(c)) {
                dropped += 1;
                continue;
            }
            for i in 1..corners.len() - 1 {
                model.faces.push([corners[0], corners[i], corners[i + 1]]);
            }
        }
        if dropped > 0 {
            warn!("dropped {} faces with fewer than 3 corners or bad indices", dropped);
        }
        return Ok(model);
    }

    fn corner_is_valid(&self, corner: &Corner) -> bool {
        return corner.position < self.positions.len()
            && corner.uv.map_or(true, |t| t < self.uvs.len())
            && corner.normal.map_or(true, |n| n < self.normals.len());
    }

    pub fn with_diffuse_map(mut self, texture: Texture) -> Model {
        self.diffuse_map = Some(texture);
        return self;
    }

    pub fn with_normal_map(mut self, texture: Texture) -> Model {
        self.normal_map = Some(texture);
        return self;
    }

    pub fn with_tangent_map(mut self, texture: Texture) -> Model {
        self.tangent_map = Some(texture);
        return self;
    }

    pub fn with_specular_map(mut self, texture: Texture) -> Model {
        self.specular_map = Some(texture);
        return self;
    }

    pub fn nverts(&self) -> usize {
        return self.positions.len();
    }

    pub fn nfaces(&self) -> usize {
        return self.faces.len();
    }

    /// Position of corner `nth` of triangle `face`.
    pub fn vert(&self, face: usize, nth: usize) -> Vec3f {
        return self.positions[self.faces[face][nth].position];
    }

    /// Texture coordinate of a corner, (0, 0) when the mesh has none.
    pub fn uv(&self, face: usize, nth: usize) -> Vec2f {
        return match self.faces[face][nth].uv {
            Some(t) => self.uvs[t],
            None => Vec2f::zeros(),
        };
    }

    /// Unit normal of a corner, the face normal when the mesh has none.
    pub fn normal(&self, face: usize, nth: usize) -> Vec3f {
        if let Some(n) = self.faces[face][nth].normal {
            let normal = self.normals[n];
            if normal.norm() > 0.0 {
                return normal.normalize();
            }
        }
        return self.face_normal(face);
    }

    /// Counter-clockwise winding normal of a triangle. Zero for a degenerate one.
    pub fn face_normal(&self, face: usize) -> Vec3f {
        let n = cross(self.vert(face, 1) - self.vert(face, 0), self.vert(face, 2) - self.vert(face, 0));
        if n.norm() == 0.0 {
            return n;
        }
        return n.normalize();
    }

    pub fn diffuse(&self, uv: Vec2f) -> Color {
        return match &self.diffuse_map {
            Some(texture) => texture.sample(uv),
            None => Color::WHITE,
        };
    }

    /// Normal from the global-space normal map, if there is one.
    pub fn normal_map(&self, uv: Vec2f) -> Option<Vec3f> {
        return self.normal_map.as_ref().map(|t| t.sample_direction(uv));
    }

    /// Normal from the tangent-space (Darboux frame) normal map, if there is one.
    pub fn tangent_normal(&self, uv: Vec2f) -> Option<Vec3f> {
        return self.tangent_map.as_ref().map(|t| t.sample_direction(uv));
    }

    pub fn specular(&self, uv: Vec2f) -> f32 {
        return match &self.specular_map {
            Some(texture) => texture.sample(uv).r as f32,
            None => DEFAULT_SPECULAR,
        };
    }
}

fn load_map(mesh_path: &Path, suffix: &str) -> Option<Texture> {
    let stem = mesh_path.file_stem()?.to_string_lossy();
    let path = mesh_path.with_file_name(format!("{}{}", stem, suffix));
    return match Texture::open(&path) {
        Ok(texture) => {
            info!("texture {} loaded", path.display());
            Some(texture)
        }
        Err(err) => {
            warn!("texture {} not loaded: {}", path.display(), err);
            None
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 2
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn quads_are_fan_triangulated() {
        let model = Model::from_reader(Cursor::new(QUAD)).unwrap();
        assert_eq!(model.nverts(), 4);
        assert_eq!(model.nfaces(), 2);
        assert_eq!(model.vert(1, 0), Vec3f::new(0.0, 0.0, 0.0));
        assert_eq!(model.vert(1, 1), Vec3f::new(1.0, 1.0, 0.0));
        assert_eq!(model.vert(1, 2), Vec3f::new(0.0, 1.0, 0.0));
        assert_eq!(model.uv(0, 1), Vec2f::new(1.0, 0.0));
    }

    #[test]
    fn normals_are_unit_length() {
        let model = Model::from_reader(Cursor::new(QUAD)).unwrap();
        assert_eq!(model.normal(0, 2), Vec3f::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn missing_normals_fall_back_to_face_normal() {
        let model = Model::from_reader(Cursor::new("v 0 0 0\nv 0 0 1\nv 1 0 0\nf 1 2 3\n")).unwrap();
        assert_eq!(model.normal(0, 0), Vec3f::new(0.0, 1.0, 0.0));
        assert_eq!(model.uv(0, 0), Vec2f::zeros());
    }

    #[test]
    fn missing_file_gives_empty_model() {
        let model = Model::load_or_empty(Path::new("does/not/exist.obj"));
        assert_eq!(model.nverts(), 0);
        assert_eq!(model.nfaces(), 0);
    }

    #[test]
    fn untextured_defaults() {
        let model = Model::from_reader(Cursor::new(QUAD)).unwrap();
        assert_eq!(model.diffuse(Vec2f::new(0.5, 0.5)), Color::WHITE);
        assert_eq!(model.specular(Vec2f::new(0.5, 0.5)), DEFAULT_SPECULAR);
        assert!(model.normal_map(Vec2f::zeros()).is_none());
        assert!(model.tangent_normal(Vec2f::zeros()).is_none());
    }
}
