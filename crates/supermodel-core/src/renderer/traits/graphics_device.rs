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

use crate::renderer::api::*;
use crate::renderer::error::ResourceError;
use std::fmt::Debug;

/// The GPU capabilities supermodel batching relies on.
///
/// Implementations own the actual GPU objects; callers only hold the opaque
/// IDs handed out here. All methods take `&self` so a device can be shared as
/// `&dyn GraphicsDevice` by every lane of a frame.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a new GPU buffer.
    /// ## Arguments
    /// * `descriptor` - A reference to a `BufferDescriptor` containing the buffer configuration.
    /// ## Returns
    /// A `Result` containing the ID of the created buffer or an error if the creation fails.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys a GPU buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to be destroyed.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Reallocates a buffer to `size` bytes. Previous contents are discarded and
    /// the new storage reads as zeroes.
    fn resize_buffer(&self, id: BufferId, size: u64) -> Result<(), ResourceError>;

    /// Returns the current size of a buffer in bytes.
    fn buffer_size(&self, id: BufferId) -> Result<u64, ResourceError>;

    /// Writes data to a GPU buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to write to.
    /// * `offset` - The offset in the buffer where the data will be written.
    /// * `data` - A slice of bytes containing the data to be written.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write would run past the end of the buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Maps a buffer for CPU writes, hands the mapped range to `write`, then unmaps it.
    fn map_buffer_mut(
        &self,
        id: BufferId,
        write: &mut dyn FnMut(&mut [u8]),
    ) -> Result<(), ResourceError>;

    /// Binds a buffer to an indexed storage-buffer slot.
    fn bind_storage_buffer(&self, slot: BindingSlot, id: BufferId) -> Result<(), ResourceError>;

    /// Clears an indexed storage-buffer slot.
    fn unbind_storage_buffer(&self, slot: BindingSlot) -> Result<(), ResourceError>;

    /// Makes a shader program current.
    fn bind_shader(&self, shader: ShaderId) -> Result<(), ResourceError>;

    /// Releases a shader program previously made current.
    fn unbind_shader(&self, shader: ShaderId) -> Result<(), ResourceError>;

    /// Assigns a named uniform of a shader program.
    fn set_uniform(
        &self,
        shader: ShaderId,
        name: &str,
        value: UniformValue,
    ) -> Result<(), ResourceError>;

    /// Issues one indexed indirect multi-draw.
    fn multi_draw_indexed_indirect(&self, draw: &IndirectDraw) -> Result<(), ResourceError>;

    /// Returns the 64-bit bindless handle of a texture.
    ///
    /// Returns `0` while the texture has no GPU storage bound yet.
    fn texture_handle(&self, texture: TextureId) -> Result<u64, ResourceError>;

    /// Makes a bindless handle resident so shaders may sample through it.
    fn make_handle_resident(&self, handle: u64) -> Result<(), ResourceError>;

    /// Makes a bindless handle non-resident. Must precede releasing the texture.
    fn make_handle_non_resident(&self, handle: u64) -> Result<(), ResourceError>;
}
