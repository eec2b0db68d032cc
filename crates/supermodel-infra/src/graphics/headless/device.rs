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

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use supermodel_core::renderer::{
    BindingSlot, BufferDescriptor, BufferId, BufferUsage, DrawIndexedIndirect, GraphicsDevice,
    IndirectDraw, ResourceError, ShaderId, TextureId, UniformValue,
};

/// Size in bytes of one indirect draw record.
const DRAW_RECORD_SIZE: u64 = std::mem::size_of::<DrawIndexedIndirect>() as u64;

/// An indirect multi-draw as the headless device saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    /// The draw as issued.
    pub draw: IndirectDraw,
    /// The commands read from the indirect buffer at the time of the call.
    pub commands: Vec<DrawIndexedIndirect>,
}

#[derive(Debug)]
struct HeadlessBuffer {
    label: Option<String>,
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug)]
struct HeadlessTexture {
    label: String,
    handle: u64,
}

#[derive(Debug, Default)]
struct HeadlessState {
    buffers: HashMap<BufferId, HeadlessBuffer>,
    textures: HashMap<TextureId, HeadlessTexture>,
    resident_handles: HashSet<u64>,
    storage_bindings: BTreeMap<BindingSlot, BufferId>,
    bound_shaders: HashSet<ShaderId>,
    uniforms: HashMap<(ShaderId, String), UniformValue>,
    draws: Vec<RecordedDraw>,
    next_handle: u64,
    /// Remaining successful writes before uploads start failing. `None` never fails.
    writes_before_failure: Option<usize>,
}

impl HeadlessState {
    fn buffer(&self, id: BufferId) -> Result<&HeadlessBuffer, ResourceError> {
        self.buffers.get(&id).ok_or(ResourceError::NotFound)
    }

    fn buffer_mut(&mut self, id: BufferId) -> Result<&mut HeadlessBuffer, ResourceError> {
        self.buffers.get_mut(&id).ok_or(ResourceError::NotFound)
    }

    /// Consumes one write from the fault-injection budget.
    fn check_write_allowed(&mut self, id: BufferId) -> Result<(), ResourceError> {
        match self.writes_before_failure.as_mut() {
            Some(0) => Err(ResourceError::BackendError(format!(
                "injected write failure on buffer {id:?}"
            ))),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// A [`GraphicsDevice`] that keeps every resource in host memory.
///
/// All state sits behind one mutex, so the device is `Send + Sync` and can be
/// shared as `&dyn GraphicsDevice` exactly like a hardware backend.
#[derive(Debug)]
pub struct HeadlessDevice {
    state: Mutex<HeadlessState>,
    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Creates an empty device.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeadlessState {
                next_handle: 1,
                ..Default::default()
            }),
            next_buffer_id: AtomicUsize::new(0),
            next_texture_id: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HeadlessState>, ResourceError> {
        self.state
            .lock()
            .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned (headless state): {e}")))
    }

    fn generate_buffer_id(&self) -> BufferId {
        BufferId(self.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_texture_id(&self) -> TextureId {
        TextureId(self.next_texture_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a texture with no storage yet. Its handle reads as `0` until
    /// [`HeadlessDevice::upload_texture`] is called.
    pub fn create_texture(&self, label: &str) -> Result<TextureId, ResourceError> {
        let id = self.generate_texture_id();
        self.lock()?.textures.insert(
            id,
            HeadlessTexture {
                label: label.to_owned(),
                handle: 0,
            },
        );
        log::debug!("HeadlessDevice: Created texture '{label}' with ID: {id:?}");
        Ok(id)
    }

    /// Gives a texture its storage, which assigns it a non-zero bindless handle.
    pub fn upload_texture(&self, id: TextureId) -> Result<u64, ResourceError> {
        let mut state = self.lock()?;
        let next_handle = state.next_handle;
        let texture = state.textures.get_mut(&id).ok_or(ResourceError::NotFound)?;
        if texture.handle != 0 {
            return Ok(texture.handle);
        }
        texture.handle = next_handle;
        state.next_handle += 1;
        Ok(next_handle)
    }

    /// Shorthand for [`HeadlessDevice::create_texture`] followed by
    /// [`HeadlessDevice::upload_texture`].
    pub fn create_uploaded_texture(&self, label: &str) -> Result<TextureId, ResourceError> {
        let id = self.create_texture(label)?;
        self.upload_texture(id)?;
        Ok(id)
    }

    /// Lets the next `successful_writes` buffer writes through, then fails every
    /// later one with [`ResourceError::BackendError`]. `None` disables the fault.
    pub fn fail_writes_after(&self, successful_writes: Option<usize>) -> Result<(), ResourceError> {
        self.lock()?.writes_before_failure = successful_writes;
        Ok(())
    }

    /// Copies out the current contents of a buffer.
    pub fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>, ResourceError> {
        Ok(self.lock()?.buffer(id)?.data.clone())
    }

    /// Reads a buffer back as an array of records.
    pub fn read_records<T: bytemuck::Pod>(&self, id: BufferId) -> Result<Vec<T>, ResourceError> {
        let state = self.lock()?;
        let data = &state.buffer(id)?.data;
        if data.len() % std::mem::size_of::<T>() != 0 {
            return Err(ResourceError::OutOfBounds);
        }
        Ok(bytemuck::pod_collect_to_vec(data))
    }

    /// The debug label a buffer was created with.
    pub fn buffer_label(&self, id: BufferId) -> Result<Option<String>, ResourceError> {
        Ok(self.lock()?.buffer(id)?.label.clone())
    }

    /// The usage flags a buffer was created with.
    pub fn buffer_usage(&self, id: BufferId) -> Result<BufferUsage, ResourceError> {
        Ok(self.lock()?.buffer(id)?.usage)
    }

    /// Number of buffers currently alive.
    pub fn live_buffer_count(&self) -> usize {
        self.lock().map(|s| s.buffers.len()).unwrap_or_default()
    }

    /// The buffer currently bound to a storage slot.
    pub fn storage_binding(&self, slot: BindingSlot) -> Option<BufferId> {
        self.lock().ok()?.storage_bindings.get(&slot).copied()
    }

    /// Whether `shader` is currently bound.
    pub fn is_shader_bound(&self, shader: ShaderId) -> bool {
        self.lock()
            .map(|s| s.bound_shaders.contains(&shader))
            .unwrap_or_default()
    }

    /// The last value assigned to a named uniform.
    pub fn uniform(&self, shader: ShaderId, name: &str) -> Option<UniformValue> {
        self.lock()
            .ok()?
            .uniforms
            .get(&(shader, name.to_owned()))
            .copied()
    }

    /// Whether a bindless handle is resident.
    pub fn is_resident(&self, handle: u64) -> bool {
        self.lock()
            .map(|s| s.resident_handles.contains(&handle))
            .unwrap_or_default()
    }

    /// Every draw issued so far, in order.
    pub fn recorded_draws(&self) -> Vec<RecordedDraw> {
        self.lock().map(|s| s.draws.clone()).unwrap_or_default()
    }

    /// Forgets the recorded draws.
    pub fn clear_recorded_draws(&self) {
        if let Ok(mut state) = self.lock() {
            state.draws.clear();
        }
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = self.generate_buffer_id();
        self.lock()?.buffers.insert(
            id,
            HeadlessBuffer {
                label: descriptor.label.as_ref().map(|l| l.to_string()),
                usage: descriptor.usage,
                data: vec![0; descriptor.size as usize],
            },
        );
        log::debug!(
            "HeadlessDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        state.buffers.remove(&id).ok_or(ResourceError::NotFound)?;
        state.storage_bindings.retain(|_, bound| *bound != id);
        log::debug!("HeadlessDevice: Destroyed buffer with ID: {id:?}");
        Ok(())
    }

    fn resize_buffer(&self, id: BufferId, size: u64) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        let buffer = state.buffer_mut(id)?;
        buffer.data.clear();
        buffer.data.resize(size as usize, 0);
        Ok(())
    }

    fn buffer_size(&self, id: BufferId) -> Result<u64, ResourceError> {
        Ok(self.lock()?.buffer(id)?.data.len() as u64)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        let buffer_size = state.buffer(id)?.data.len() as u64;
        let end_offset = offset + data.len() as u64;
        if end_offset > buffer_size {
            return Err(ResourceError::OutOfBounds);
        }
        state.check_write_allowed(id)?;
        state.buffer_mut(id)?.data[offset as usize..end_offset as usize].copy_from_slice(data);
        log::trace!(
            "HeadlessDevice: Wrote {} bytes to buffer ID: {:?} at offset {}",
            data.len(),
            id,
            offset
        );
        Ok(())
    }

    fn map_buffer_mut(
        &self,
        id: BufferId,
        write: &mut dyn FnMut(&mut [u8]),
    ) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        state.buffer(id)?;
        state.check_write_allowed(id)?;
        write(state.buffer_mut(id)?.data.as_mut_slice());
        Ok(())
    }

    fn bind_storage_buffer(&self, slot: BindingSlot, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        state.buffer(id)?;
        state.storage_bindings.insert(slot, id);
        Ok(())
    }

    fn unbind_storage_buffer(&self, slot: BindingSlot) -> Result<(), ResourceError> {
        self.lock()?.storage_bindings.remove(&slot);
        Ok(())
    }

    fn bind_shader(&self, shader: ShaderId) -> Result<(), ResourceError> {
        self.lock()?.bound_shaders.insert(shader);
        Ok(())
    }

    fn unbind_shader(&self, shader: ShaderId) -> Result<(), ResourceError> {
        self.lock()?.bound_shaders.remove(&shader);
        Ok(())
    }

    fn set_uniform(
        &self,
        shader: ShaderId,
        name: &str,
        value: UniformValue,
    ) -> Result<(), ResourceError> {
        self.lock()?.uniforms.insert((shader, name.to_owned()), value);
        Ok(())
    }

    fn multi_draw_indexed_indirect(&self, draw: &IndirectDraw) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        state.buffer(draw.vertex_buffer)?;
        state.buffer(draw.index_buffer)?;
        let indirect = &state.buffer(draw.indirect_buffer)?.data;
        let needed = draw.draw_count as u64 * DRAW_RECORD_SIZE;
        if needed > indirect.len() as u64 {
            return Err(ResourceError::OutOfBounds);
        }
        let commands = bytemuck::pod_collect_to_vec(&indirect[..needed as usize]);
        state.draws.push(RecordedDraw {
            draw: *draw,
            commands,
        });
        Ok(())
    }

    fn texture_handle(&self, texture: TextureId) -> Result<u64, ResourceError> {
        let state = self.lock()?;
        let texture = state.textures.get(&texture).ok_or(ResourceError::NotFound)?;
        log::trace!(
            "HeadlessDevice: Handle of texture '{}' is {}",
            texture.label,
            texture.handle
        );
        Ok(texture.handle)
    }

    fn make_handle_resident(&self, handle: u64) -> Result<(), ResourceError> {
        let mut state = self.lock()?;
        if handle == 0 || !state.textures.values().any(|t| t.handle == handle) {
            return Err(ResourceError::InvalidHandle);
        }
        state.resident_handles.insert(handle);
        Ok(())
    }

    fn make_handle_non_resident(&self, handle: u64) -> Result<(), ResourceError> {
        if !self.lock()?.resident_handles.remove(&handle) {
            return Err(ResourceError::InvalidHandle);
        }
        Ok(())
    }
}
