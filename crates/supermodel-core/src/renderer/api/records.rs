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

//! GPU-resident record layouts shared with the supermodel shaders.
//!
//! Every record is `#[repr(C)]` and `Pod` so it can be uploaded with
//! `bytemuck::cast_slice`. The layouts follow std430 packing: a three-component
//! vector is always followed by a scalar so that no implicit padding appears
//! on either side.

use crate::math::{Aabb, Mat4};

/// One indexed indirect draw, laid out as the GPU consumes it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawIndexedIndirect {
    /// Number of indices to draw.
    pub index_count: u32,
    /// Number of instances to draw. Always 1 for submodels.
    pub instance_count: u32,
    /// First index in the shared index buffer.
    pub first_index: u32,
    /// Value added to every index before fetching from the shared vertex buffer.
    pub base_vertex: i32,
    /// First instance to draw.
    pub first_instance: u32,
}

impl DrawIndexedIndirect {
    /// Creates a single-instance draw over `index_count` indices.
    pub const fn new(first_index: u32, index_count: u32, base_vertex: i32) -> Self {
        Self {
            index_count,
            instance_count: 1,
            first_index,
            base_vertex,
            first_instance: 0,
        }
    }
}

/// Per-submodel metadata: rescales compressed vertices and links the material
/// and the owning geometry's transform.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelRecord {
    /// Minimum corner of the parent geometry's bounding box.
    pub b_min: [f32; 3],
    /// Index into the deduplicated material array.
    pub material_id: u32,
    /// Extent of the parent geometry's bounding box.
    pub axis_lengths: [f32; 3],
    /// Global, sequential submodel index.
    pub submodel_id: u32,
    /// Minimum corner of this submodel's bounding box.
    pub submodel_b_min: [f32; 3],
    /// Minimum of the parent geometry's texture coordinates.
    pub tc_min: f32,
    /// Extent of this submodel's bounding box.
    pub submodel_axis_lengths: [f32; 3],
    /// Extent of the parent geometry's texture coordinates.
    pub tc_extent: f32,
    /// Explicit std430 padding.
    pub _padding: [f32; 3],
    /// Index of the owning geometry in the per-frame transform array.
    pub dynamic_model_id: u32,
}

impl ModelRecord {
    /// Bounding box of the parent geometry stored in this record.
    pub fn parent_bounds(&self) -> Aabb {
        let min = self.b_min.into();
        Aabb {
            min,
            max: min + self.axis_lengths.into(),
        }
    }

    /// Bounding box of the submodel stored in this record.
    pub fn submodel_bounds(&self) -> Aabb {
        let min = self.submodel_b_min.into();
        Aabb {
            min,
            max: min + self.submodel_axis_lengths.into(),
        }
    }
}

/// Per-geometry data rewritten every frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DynamicModelRecord {
    /// The current model-to-world transform.
    pub model_matrix: [[f32; 4]; 4],
}

impl From<Mat4> for DynamicModelRecord {
    fn from(m: Mat4) -> Self {
        Self {
            model_matrix: m.to_cols_array_2d(),
        }
    }
}

/// Compact material parameters plus bindless texture handles (0 when absent).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialRecord {
    /// Diffuse reflectance.
    pub k_diffuse: [f32; 3],
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// Specular reflectance.
    pub k_specular: [f32; 3],
    /// Surface roughness.
    pub roughness: f32,
    /// Bindless handle of the diffuse texture.
    pub tex_diffuse: u64,
    /// Bindless handle of the normal map.
    pub tex_normal: u64,
    /// Bindless handle of the specular texture.
    pub tex_specular: u64,
    /// Bindless handle of the alpha map.
    pub tex_alpha: u64,
}

const _: () = assert!(std::mem::size_of::<DrawIndexedIndirect>() == 20);
const _: () = assert!(std::mem::size_of::<ModelRecord>() == 80);
const _: () = assert!(std::mem::size_of::<DynamicModelRecord>() == 64);
const _: () = assert!(std::mem::size_of::<MaterialRecord>() == 64);
