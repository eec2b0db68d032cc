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

//! Recursive median-split subdivision of triangle meshes into submodels.
//!
//! A submodel is a contiguous run of triangles, spatially coherent enough to
//! be culled as one unit. The split always happens along the longest axis of
//! the centroid bounds, so submodels tend to be compact boxes rather than slabs.

use std::ops::Range;
use std::sync::Arc;

use supermodel_core::math::{Aabb, Axis, Vec3};
use supermodel_core::Geometry;

use crate::error::BatchError;

/// Smallest budget for which the recursion terminates.
pub const MIN_TRIANGLES_PER_SUBMODEL: usize = 2;

/// Three vertex indices plus the centroid used as sort key.
#[derive(Debug, Clone, Copy)]
struct Triangle {
    indices: [u32; 3],
    centroid: Vec3,
}

/// A subset of a parent geometry's triangles with its own tight bounds.
///
/// Indices refer to the parent's vertex arrays; vertices shared between
/// triangles are repeated, never deduplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct SubdividedGeometry {
    name: String,
    parent: Arc<Geometry>,
    indices: Vec<u32>,
    bounding_box: Aabb,
}

impl SubdividedGeometry {
    /// `<parent>_subd_<n>`, where `n` is the position in emission order.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The geometry this submodel was cut from.
    pub fn parent(&self) -> &Arc<Geometry> {
        &self.parent
    }

    /// Triangle list indices into the parent's vertices.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Bounds of the vertices referenced by [`SubdividedGeometry::indices`].
    pub fn bounding_box(&self) -> Aabb {
        self.bounding_box
    }

    /// Number of triangles in this submodel.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Splits geometries into submodels of fewer than `max_triangles_per_submodel`
/// triangles.
///
/// A range that is already under budget becomes one submodel. Otherwise it is
/// sorted by centroid along the longest axis of its centroid bounds (descending)
/// and split at `count / 2 + 1`, and both halves are processed depth-first,
/// first half first. The emission order is deterministic and is what submodel
/// IDs are assigned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialSubdivider {
    max_triangles_per_submodel: usize,
}

impl SpatialSubdivider {
    /// Creates a subdivider with the given triangle budget.
    pub const fn new(max_triangles_per_submodel: usize) -> Self {
        Self {
            max_triangles_per_submodel,
        }
    }

    /// The triangle budget.
    pub const fn max_triangles_per_submodel(&self) -> usize {
        self.max_triangles_per_submodel
    }

    /// Subdivides one geometry.
    ///
    /// # Errors
    ///
    /// [`BatchError::MalformedGeometry`] if the budget is below
    /// [`MIN_TRIANGLES_PER_SUBMODEL`], if the index count is not a multiple of
    /// three, or if an index points past the position array.
    pub fn subdivide(&self, geometry: &Arc<Geometry>) -> Result<Vec<SubdividedGeometry>, BatchError> {
        let budget = self.max_triangles_per_submodel;
        if budget < MIN_TRIANGLES_PER_SUBMODEL {
            return Err(BatchError::malformed(
                &geometry.name,
                format!("submodel budget must be at least {MIN_TRIANGLES_PER_SUBMODEL} triangles, got {budget}"),
            ));
        }

        let mut triangles = build_triangles(geometry)?;
        if triangles.is_empty() {
            return Ok(Vec::new());
        }

        let mut leaves = Vec::new();
        partition(&mut triangles, 0, budget, &mut leaves);

        let submodels = leaves
            .into_iter()
            .enumerate()
            .map(|(n, range)| materialize(geometry, n, &triangles[range]))
            .collect::<Vec<_>>();

        log::trace!(
            "Subdivided '{}' ({} triangles) into {} submodels",
            geometry.name,
            triangles.len(),
            submodels.len()
        );
        Ok(submodels)
    }
}

fn build_triangles(geometry: &Geometry) -> Result<Vec<Triangle>, BatchError> {
    if geometry.indices.len() % 3 != 0 {
        return Err(BatchError::malformed(
            &geometry.name,
            format!(
                "index count {} is not a multiple of 3",
                geometry.indices.len()
            ),
        ));
    }

    let positions = &geometry.positions;
    geometry
        .indices
        .chunks_exact(3)
        .map(|tri| {
            let indices = [tri[0], tri[1], tri[2]];
            let mut sum = Vec3::ZERO;
            for &index in &indices {
                let position = positions.get(index as usize).ok_or_else(|| {
                    BatchError::malformed(
                        &geometry.name,
                        format!(
                            "index {index} is out of range for {} vertices",
                            positions.len()
                        ),
                    )
                })?;
                sum = sum + *position;
            }
            Ok(Triangle {
                indices,
                centroid: sum / 3.0,
            })
        })
        .collect()
}

/// Sorts and splits `triangles` in place, pushing leaf ranges (relative to the
/// whole triangle array) in depth-first order.
fn partition(triangles: &mut [Triangle], offset: usize, budget: usize, leaves: &mut Vec<Range<usize>>) {
    let count = triangles.len();
    if count < budget {
        leaves.push(offset..offset + count);
        return;
    }

    let centroid_bounds = Aabb::from_points(triangles.iter().map(|t| t.centroid));
    let axis = Axis::of_largest_extent(centroid_bounds.size()).index();
    triangles.sort_by(|a, b| b.centroid[axis].total_cmp(&a.centroid[axis]));

    // Both halves must be non-empty for the recursion to shrink.
    let split = (count / 2 + 1).min(count - 1);
    let (first, second) = triangles.split_at_mut(split);
    partition(first, offset, budget, leaves);
    partition(second, offset + split, budget, leaves);
}

fn materialize(parent: &Arc<Geometry>, n: usize, triangles: &[Triangle]) -> SubdividedGeometry {
    let indices: Vec<u32> = triangles.iter().flat_map(|t| t.indices).collect();
    let bounding_box = Aabb::from_points(
        indices
            .iter()
            .map(|&index| parent.positions[index as usize]),
    );
    SubdividedGeometry {
        name: format!("{}_subd_{}", parent.name, n),
        parent: Arc::clone(parent),
        indices,
        bounding_box,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A strip of `count` disjoint triangles laid out along X.
    fn strip(count: usize) -> Arc<Geometry> {
        let mut positions = Vec::with_capacity(count * 3);
        let mut indices = Vec::with_capacity(count * 3);
        for i in 0..count {
            let x = i as f32;
            let base = positions.len() as u32;
            positions.push(Vec3::new(x, 0.0, 0.0));
            positions.push(Vec3::new(x + 0.5, 0.0, 0.0));
            positions.push(Vec3::new(x, 0.5, 0.0));
            indices.extend_from_slice(&[base, base + 1, base + 2]);
        }
        Arc::new(Geometry::new("strip", positions, indices))
    }

    fn sizes(submodels: &[SubdividedGeometry]) -> Vec<usize> {
        submodels.iter().map(|s| s.triangle_count()).collect()
    }

    #[test]
    fn under_budget_geometry_is_a_single_submodel() {
        let geo = strip(10);
        let submodels = SpatialSubdivider::new(1000).subdivide(&geo).unwrap();
        assert_eq!(sizes(&submodels), vec![10]);
        assert_eq!(submodels[0].name(), "strip_subd_0");
        assert_eq!(submodels[0].bounding_box(), geo.bounding_box);
    }

    #[test]
    fn median_split_emits_depth_first() {
        let submodels = SpatialSubdivider::new(1000).subdivide(&strip(2500)).unwrap();
        // 2500 -> (1251, 1249), then both halves are still over budget.
        assert_eq!(sizes(&submodels), vec![626, 625, 625, 624]);
    }

    #[test]
    fn first_half_holds_the_largest_coordinates() {
        let submodels = SpatialSubdivider::new(4).subdivide(&strip(5)).unwrap();
        // 5 -> (3, 2), sorted descending along X.
        assert_eq!(sizes(&submodels), vec![3, 2]);
        assert_eq!(submodels[0].bounding_box().min.x, 2.0);
        assert_eq!(submodels[1].bounding_box().max.x, 1.5);
    }

    #[test]
    fn budget_of_two_reaches_single_triangles() {
        let submodels = SpatialSubdivider::new(2).subdivide(&strip(5)).unwrap();
        assert_eq!(submodels.len(), 5);
        assert!(submodels.iter().all(|s| s.triangle_count() == 1));
    }

    #[test]
    fn degenerate_budgets_are_rejected() {
        for budget in [0, 1] {
            let err = SpatialSubdivider::new(budget).subdivide(&strip(3)).unwrap_err();
            assert!(matches!(err, BatchError::MalformedGeometry { .. }));
        }
    }

    #[test]
    fn index_count_must_be_a_multiple_of_three() {
        let geo = Arc::new(Geometry::new(
            "broken",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1],
        ));
        let err = SpatialSubdivider::new(10).subdivide(&geo).unwrap_err();
        assert!(matches!(err, BatchError::MalformedGeometry { geometry, .. } if geometry == "broken"));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let geo = Arc::new(Geometry::new(
            "broken",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 3],
        ));
        assert!(SpatialSubdivider::new(10).subdivide(&geo).is_err());
    }

    #[test]
    fn empty_geometry_yields_no_submodels() {
        let geo = Arc::new(Geometry::new("empty", Vec::new(), Vec::new()));
        assert!(SpatialSubdivider::new(10).subdivide(&geo).unwrap().is_empty());
    }

    #[test]
    fn shared_vertices_are_not_deduplicated() {
        // A quad: both triangles reference vertices 0 and 2.
        let geo = Arc::new(Geometry::new(
            "quad",
            vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
            vec![0, 1, 2, 0, 2, 3],
        ));
        let submodels = SpatialSubdivider::new(10).subdivide(&geo).unwrap();
        assert_eq!(submodels[0].indices(), &[0, 1, 2, 0, 2, 3]);
    }
}
