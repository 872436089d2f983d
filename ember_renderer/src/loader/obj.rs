/// Wavefront OBJ geometry loader
///
/// Supports `v`, `vt`, `vn` and `f` with the `i`, `i/t`, `i//n` and `i/t/n`
/// corner forms. Indices are 1-based; negative indices count back from the
/// most recent element. Polygons are fan-triangulated. Corners sharing the
/// same (position, uv, normal) triple become one vertex. Texture V is flipped
/// to match Vulkan's top-left origin.

use std::path::Path;
use glam::{Vec2, Vec3};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::resource::PbrVertex;
use crate::engine_debug;

/// Interleaved vertices and triangle-list indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjGeometry {
    pub vertices: Vec<PbrVertex>,
    pub indices: Vec<u32>,
}

impl ObjGeometry {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Read and parse an OBJ file
pub fn load_obj(path: impl AsRef<Path>, flip_winding: bool) -> Result<ObjGeometry> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let geometry = parse(&source, flip_winding, path)?;
    engine_debug!(
        "ember::obj",
        "Loaded {:?}: {} vertices, {} triangles",
        path,
        geometry.vertices.len(),
        geometry.triangle_count()
    );
    Ok(geometry)
}

/// Parse OBJ text held in memory
pub fn parse_obj(source: &str, flip_winding: bool) -> Result<ObjGeometry> {
    parse(source, flip_winding, Path::new("<memory>"))
}

/// Corner key: resolved (position, uv, normal) indices
type CornerKey = (usize, Option<usize>, Option<usize>);

struct ObjParser<'a> {
    origin: &'a Path,
    line: usize,
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    normals: Vec<Vec3>,
    corners: FxHashMap<CornerKey, u32>,
    vertices: Vec<PbrVertex>,
    /// Whether the vertex got its normal from the file
    explicit_normal: Vec<bool>,
    indices: Vec<u32>,
}

fn parse(source: &str, flip_winding: bool, origin: &Path) -> Result<ObjGeometry> {
    let mut parser = ObjParser {
        origin,
        line: 0,
        positions: Vec::new(),
        uvs: Vec::new(),
        normals: Vec::new(),
        corners: FxHashMap::default(),
        vertices: Vec::new(),
        explicit_normal: Vec::new(),
        indices: Vec::new(),
    };

    for (number, line) in source.lines().enumerate() {
        parser.line = number + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let [x, y, z] = parser.floats::<3>(&mut parts, "position")?;
                parser.positions.push(Vec3::new(x, y, z));
            }
            Some("vt") => {
                let [u, v] = parser.floats::<2>(&mut parts, "texture coordinate")?;
                parser.uvs.push(Vec2::new(u, 1.0 - v));
            }
            Some("vn") => {
                let [x, y, z] = parser.floats::<3>(&mut parts, "normal")?;
                parser.normals.push(Vec3::new(x, y, z));
            }
            Some("f") => parser.face(parts, flip_winding)?,
            // Groups, materials, smoothing and anything else
            _ => {}
        }
    }

    Ok(parser.finish())
}

impl ObjParser<'_> {
    fn error(&self, message: String) -> Error {
        Error::Parse {
            path: self.origin.to_path_buf(),
            line: Some(self.line),
            message,
        }
    }

    fn floats<'s, const N: usize>(&self, parts: &mut impl Iterator<Item = &'s str>, what: &str) -> Result<[f32; N]> {
        let mut values = [0.0; N];
        for value in values.iter_mut() {
            let token = parts
                .next()
                .ok_or_else(|| self.error(format!("Missing component in {}", what)))?;
            *value = token
                .parse()
                .map_err(|_| self.error(format!("Invalid number '{}' in {}", token, what)))?;
        }
        Ok(values)
    }

    /// Turn a 1-based or negative OBJ index into a 0-based one
    fn resolve(&self, token: &str, len: usize, what: &str) -> Result<usize> {
        let index: i64 = token
            .parse()
            .map_err(|_| self.error(format!("Invalid {} index '{}'", what, token)))?;
        let resolved = match index {
            0 => None,
            i if i > 0 => Some(i as usize - 1),
            i => (len as i64 + i).try_into().ok(),
        };
        resolved
            .filter(|&i| i < len)
            .ok_or_else(|| self.error(format!("{} index {} out of range ({} defined)", what, index, len)))
    }

    fn corner(&mut self, token: &str) -> Result<u32> {
        let mut fields = token.split('/');
        let position = self.resolve(fields.next().unwrap_or_default(), self.positions.len(), "position")?;
        let uv = match fields.next() {
            Some(t) if !t.is_empty() => Some(self.resolve(t, self.uvs.len(), "texture coordinate")?),
            _ => None,
        };
        let normal = match fields.next() {
            Some(t) if !t.is_empty() => Some(self.resolve(t, self.normals.len(), "normal")?),
            _ => None,
        };

        let key = (position, uv, normal);
        if let Some(&index) = self.corners.get(&key) {
            return Ok(index);
        }

        let index = self.vertices.len() as u32;
        self.vertices.push(PbrVertex {
            position: self.positions[position],
            uv: uv.map_or(Vec2::ZERO, |i| self.uvs[i]),
            normal: normal.map_or(Vec3::ZERO, |i| self.normals[i]),
            tangent: Vec3::ZERO,
        });
        self.explicit_normal.push(normal.is_some());
        self.corners.insert(key, index);
        Ok(index)
    }

    fn face<'s>(&mut self, parts: impl Iterator<Item = &'s str>, flip_winding: bool) -> Result<()> {
        let corners = parts.map(|token| self.corner(token)).collect::<Result<Vec<u32>>>()?;
        if corners.len() < 3 {
            return Err(self.error(format!("Face needs at least 3 corners, got {}", corners.len())));
        }

        for i in 1..corners.len() - 1 {
            let (a, b, c) = (corners[0], corners[i], corners[i + 1]);
            if flip_winding {
                self.indices.extend([a, c, b]);
            } else {
                self.indices.extend([a, b, c]);
            }
        }
        Ok(())
    }

    /// Fill missing normals from face normals, then build tangents
    fn finish(mut self) -> ObjGeometry {
        let mut face_normals = vec![Vec3::ZERO; self.vertices.len()];
        let mut tangents = vec![Vec3::ZERO; self.vertices.len()];

        for triangle in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
            let (v0, v1, v2) = (&self.vertices[i0], &self.vertices[i1], &self.vertices[i2]);

            let edge1 = v1.position - v0.position;
            let edge2 = v2.position - v0.position;
            let normal = edge1.cross(edge2);

            let duv1 = v1.uv - v0.uv;
            let duv2 = v2.uv - v0.uv;
            let det = duv1.x * duv2.y - duv2.x * duv1.y;
            let tangent = if det.abs() > f32::EPSILON {
                (edge1 * duv2.y - edge2 * duv1.y) / det
            } else {
                Vec3::ZERO
            };

            for i in [i0, i1, i2] {
                face_normals[i] += normal;
                tangents[i] += tangent;
            }
        }

        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            if !self.explicit_normal[i] {
                vertex.normal = face_normals[i];
            }
            vertex.normal = vertex.normal.normalize_or_zero();
            if vertex.normal == Vec3::ZERO {
                vertex.normal = Vec3::Y;
            }

            // Gram-Schmidt against the normal
            let tangent = tangents[i] - vertex.normal * vertex.normal.dot(tangents[i]);
            vertex.tangent = match tangent.try_normalize() {
                Some(t) => t,
                None => vertex.normal.any_orthonormal_vector(),
            };
        }

        ObjGeometry { vertices: self.vertices, indices: self.indices }
    }
}

#[cfg(test)]
#[path = "obj_tests.rs"]
mod tests;
