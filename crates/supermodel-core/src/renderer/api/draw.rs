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

//! Describes an indirect multi-draw over a supermodel.

use super::{BufferId, VertexPrecision};

/// Everything a backend needs to issue one indexed indirect multi-draw.
///
/// Indices are `u32`. The indirect buffer holds `draw_count` consecutive
/// [`DrawIndexedIndirect`](super::DrawIndexedIndirect) records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectDraw {
    /// The shared vertex buffer.
    pub vertex_buffer: BufferId,
    /// Layout of the vertices in `vertex_buffer`.
    pub vertex_precision: VertexPrecision,
    /// The shared index buffer.
    pub index_buffer: BufferId,
    /// The buffer holding the draw commands.
    pub indirect_buffer: BufferId,
    /// Number of draw commands to read from `indirect_buffer`.
    pub draw_count: u32,
}
