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

//! Vertex layouts of the shared supermodel vertex buffer.
//!
//! Positions and texture coordinates are rescaled into `[0, 1]` before they
//! reach this module; the per-submodel [`ModelRecord`](super::ModelRecord)
//! carries what the shader needs to undo the rescale. That is what makes the
//! 16-bit [`LowPrecisionVertex`] usable.

use crate::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// A vertex after rescaling, before it is packed for upload.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SupermodelVertex {
    /// Position rescaled to `[0, 1]` per axis.
    pub position: Vec3,
    /// Unit normal, or zero when the geometry has none.
    pub normal: Vec3,
    /// Texture coordinate rescaled to `[0, 1]`.
    pub tex_coord: Vec2,
}

/// Full-precision vertex: three `f32` triples and an `f32` pair.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FullPrecisionVertex {
    /// Normalized position.
    pub position: [f32; 3],
    /// Normal.
    pub normal: [f32; 3],
    /// Normalized texture coordinate.
    pub tex_coord: [f32; 2],
}

/// Reduced-precision vertex: unorm16 position and texcoord, snorm16 normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LowPrecisionVertex {
    /// Position as unorm16.
    pub position: [u16; 3],
    /// Normal as snorm16.
    pub normal: [i16; 3],
    /// Texture coordinate as unorm16.
    pub tex_coord: [u16; 2],
}

impl From<SupermodelVertex> for FullPrecisionVertex {
    fn from(v: SupermodelVertex) -> Self {
        Self {
            position: v.position.to_array(),
            normal: v.normal.to_array(),
            tex_coord: v.tex_coord.to_array(),
        }
    }
}

impl From<SupermodelVertex> for LowPrecisionVertex {
    fn from(v: SupermodelVertex) -> Self {
        // `as` saturates, so values marginally outside [0, 1] clamp.
        let unorm = |x: f32| (x * f32::from(u16::MAX)) as u16;
        let snorm = |x: f32| (x * f32::from(i16::MAX)) as i16;
        Self {
            position: [
                unorm(v.position.x),
                unorm(v.position.y),
                unorm(v.position.z),
            ],
            normal: [snorm(v.normal.x), snorm(v.normal.y), snorm(v.normal.z)],
            tex_coord: [unorm(v.tex_coord.x), unorm(v.tex_coord.y)],
        }
    }
}

/// Which vertex layout the shared vertex buffer is packed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VertexPrecision {
    /// [`FullPrecisionVertex`], 32 bytes per vertex.
    #[default]
    Full,
    /// [`LowPrecisionVertex`], 16 bytes per vertex.
    Low,
}

impl VertexPrecision {
    /// Size of one packed vertex in bytes.
    pub const fn stride(self) -> usize {
        match self {
            VertexPrecision::Full => std::mem::size_of::<FullPrecisionVertex>(),
            VertexPrecision::Low => std::mem::size_of::<LowPrecisionVertex>(),
        }
    }

    /// Packs vertices into the byte layout of this precision.
    pub fn encode(self, vertices: &[SupermodelVertex]) -> Vec<u8> {
        match self {
            VertexPrecision::Full => {
                let packed: Vec<FullPrecisionVertex> =
                    vertices.iter().copied().map(Into::into).collect();
                bytemuck::cast_slice(&packed).to_vec()
            }
            VertexPrecision::Low => {
                let packed: Vec<LowPrecisionVertex> =
                    vertices.iter().copied().map(Into::into).collect();
                bytemuck::cast_slice(&packed).to_vec()
            }
        }
    }
}
