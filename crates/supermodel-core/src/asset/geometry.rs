// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the triangle-mesh geometry asset.

use crate::math::{Aabb, Vec2, Vec3};

/// An indexed triangle mesh.
///
/// Every three consecutive entries of `indices` form one triangle. Normals and
/// texture coordinates are optional and, when present, are indexed like
/// `positions`.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Name of the geometry, used for labels and logs.
    pub name: String,
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Vertex normals, empty when the mesh has none.
    pub normals: Vec<Vec3>,
    /// Vertex texture coordinates, empty when the mesh has none.
    pub tex_coords: Vec<Vec2>,
    /// Triangle list indices into `positions`.
    pub indices: Vec<u32>,
    /// Bounds of `positions`. Kept current by [`Geometry::recompute_aabb`].
    pub bounding_box: Aabb,
}

impl Geometry {
    /// Creates a geometry and computes its bounding box.
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let mut geometry = Self {
            name: name.into(),
            positions,
            normals: Vec::new(),
            tex_coords: Vec::new(),
            indices,
            bounding_box: Aabb::INVALID,
        };
        geometry.recompute_aabb();
        geometry
    }

    /// Attaches per-vertex normals.
    pub fn with_normals(mut self, normals: Vec<Vec3>) -> Self {
        self.normals = normals;
        self
    }

    /// Attaches per-vertex texture coordinates.
    pub fn with_tex_coords(mut self, tex_coords: Vec<Vec2>) -> Self {
        self.tex_coords = tex_coords;
        self
    }

    /// Recomputes `bounding_box` from `positions`.
    pub fn recompute_aabb(&mut self) {
        self.bounding_box = Aabb::from_points(self.positions.iter().copied());
    }

    /// Number of complete triangles described by `indices`.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns `true` if the mesh carries texture coordinates.
    pub fn has_tex_coords(&self) -> bool {
        !self.tex_coords.is_empty()
    }

    /// The texture-coordinate range as `(min, extent)`.
    ///
    /// A single scalar range covers both `u` and `v`, so the rescaled texture
    /// space keeps its aspect ratio. Meshes without texture coordinates yield `(0, 0)`.
    pub fn tex_coord_range(&self) -> (f32, f32) {
        if self.tex_coords.is_empty() {
            return (0.0, 0.0);
        }
        let (min, max) = self
            .tex_coords
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), tc| {
                (lo.min(tc.min_element()), hi.max(tc.max_element()))
            });
        (min, max - min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Geometry {
        Geometry::new(
            "quad",
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(2.0, 0.0, 0.0),
                Vec3::new(2.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn new_computes_bounds() {
        let geo = quad();
        assert_eq!(geo.bounding_box.min, Vec3::ZERO);
        assert_eq!(geo.bounding_box.max, Vec3::new(2.0, 1.0, 0.0));
        assert_eq!(geo.triangle_count(), 2);
    }

    #[test]
    fn tex_coord_range_spans_both_components() {
        let geo = quad().with_tex_coords(vec![
            Vec2::new(0.5, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(0.0, 0.0),
        ]);
        assert_eq!(geo.tex_coord_range(), (-1.0, 4.0));
    }

    #[test]
    fn tex_coord_range_without_tex_coords_is_empty() {
        assert_eq!(quad().tex_coord_range(), (0.0, 0.0));
        assert!(!quad().has_tex_coords());
    }
}
