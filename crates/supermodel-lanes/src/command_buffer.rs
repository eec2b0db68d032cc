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

//! Flip-flop indirect draw command buffers.
//!
//! GPU culling passes rewrite the draw list every frame. To do so without
//! losing the canonical list, the commands live in three buffers:
//!
//! ```text
//! original  canonical list, only written by add/clear
//! A / B     ping-pong pair: a pass reads `front`, writes `back`, then `swap()`s
//! ```
//!
//! [`IndirectCommandBuffer::reset`] at the start of a frame makes `original`
//! the front again, so the first pass of every frame starts from the full set.

use std::borrow::Cow;

use supermodel_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, DrawIndexedIndirect, GraphicsDevice, ResourceError,
};

/// Three equally sized command buffers plus their CPU shadow.
#[derive(Debug)]
pub struct IndirectCommandBuffer {
    /// The ping-pong pair, `[A, B]`.
    flip_flop: [BufferId; 2],
    original: BufferId,
    /// Authoritative content, mirrored to all three buffers on every write.
    shadow: Vec<DrawIndexedIndirect>,
    front_is_a: bool,
    reset_pending: bool,
    label: String,
}

impl IndirectCommandBuffer {
    /// Creates the three buffers, empty.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if a buffer cannot be created.
    pub fn new(device: &dyn GraphicsDevice, label: &str) -> Result<Self, ResourceError> {
        let create = |suffix: &str| {
            device.create_buffer(&BufferDescriptor {
                label: Some(Cow::Owned(format!("{label} [{suffix}]"))),
                size: 0,
                usage: BufferUsage::INDIRECT | BufferUsage::STORAGE | BufferUsage::COPY_DST,
            })
        };

        Ok(Self {
            flip_flop: [create("A")?, create("B")?],
            original: create("original")?,
            shadow: Vec::new(),
            front_is_a: true,
            reset_pending: false,
            label: label.to_owned(),
        })
    }

    fn all_buffers(&self) -> [BufferId; 3] {
        [self.flip_flop[0], self.flip_flop[1], self.original]
    }

    fn front_slot(&self) -> usize {
        if self.front_is_a {
            0
        } else {
            1
        }
    }

    /// Appends commands and re-uploads the whole list to every buffer.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResourceError`] reported by the device. The shadow
    /// keeps the appended commands even then.
    pub fn add_elements(
        &mut self,
        device: &dyn GraphicsDevice,
        commands: &[DrawIndexedIndirect],
    ) -> Result<(), ResourceError> {
        self.shadow.extend_from_slice(commands);
        let bytes: &[u8] = bytemuck::cast_slice(&self.shadow);
        for buffer in self.all_buffers() {
            device.resize_buffer(buffer, bytes.len() as u64)?;
            if !bytes.is_empty() {
                device.write_buffer(buffer, 0, bytes)?;
            }
        }
        log::debug!(
            "IndirectCommandBuffer({}): {} commands ({} bytes)",
            self.label,
            self.shadow.len(),
            bytes.len()
        );
        Ok(())
    }

    /// Shrinks every buffer to zero and empties the shadow.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResourceError`] reported by the device.
    pub fn clear_elements(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        self.shadow.clear();
        for buffer in self.all_buffers() {
            device.resize_buffer(buffer, 0)?;
        }
        Ok(())
    }

    /// Makes `original` the front buffer until the next [`swap`](Self::swap).
    pub fn reset(&mut self) {
        self.front_is_a = true;
        self.reset_pending = true;
    }

    /// Promotes the back buffer to front after a pass has written it.
    pub fn swap(&mut self) {
        self.front_is_a = !self.front_is_a;
        self.reset_pending = false;
    }

    /// The buffer the next pass or draw reads from.
    pub fn front_buffer(&self) -> BufferId {
        if self.reset_pending {
            self.original
        } else {
            self.flip_flop[self.front_slot()]
        }
    }

    /// The buffer the next pass writes to. Never `original`.
    pub fn back_buffer(&self) -> BufferId {
        self.flip_flop[1 - self.front_slot()]
    }

    /// The canonical, unfiltered command buffer.
    pub fn original_buffer(&self) -> BufferId {
        self.original
    }

    /// The commands as last written through this object.
    pub fn commands(&self) -> &[DrawIndexedIndirect] {
        &self.shadow
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.shadow.len()
    }

    /// Whether there are no commands.
    pub fn is_empty(&self) -> bool {
        self.shadow.is_empty()
    }

    /// Destroys the three buffers. The object must not be used afterwards.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for buffer in self.all_buffers() {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!(
                    "IndirectCommandBuffer({}): Failed to destroy buffer: {:?}",
                    self.label,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supermodel_infra::HeadlessDevice;

    fn commands(n: u32) -> Vec<DrawIndexedIndirect> {
        (0..n).map(|i| DrawIndexedIndirect::new(i * 3, 3, 0)).collect()
    }

    #[test]
    fn starts_with_a_in_front() {
        let device = HeadlessDevice::new();
        let buffer = IndirectCommandBuffer::new(&device, "cmd").unwrap();
        assert_eq!(buffer.front_buffer(), buffer.flip_flop[0]);
        assert_eq!(buffer.back_buffer(), buffer.flip_flop[1]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn add_mirrors_full_shadow_to_all_buffers() {
        let device = HeadlessDevice::new();
        let mut buffer = IndirectCommandBuffer::new(&device, "cmd").unwrap();
        let all = commands(3);
        buffer.add_elements(&device, &all[..2]).unwrap();
        buffer.add_elements(&device, &all[2..]).unwrap();

        assert_eq!(buffer.commands(), all.as_slice());
        for id in buffer.all_buffers() {
            assert_eq!(device.read_records::<DrawIndexedIndirect>(id).unwrap(), all);
        }
    }

    #[test]
    fn clear_shrinks_every_buffer() {
        let device = HeadlessDevice::new();
        let mut buffer = IndirectCommandBuffer::new(&device, "cmd").unwrap();
        buffer.add_elements(&device, &commands(4)).unwrap();
        buffer.clear_elements(&device).unwrap();
        assert_eq!(buffer.len(), 0);
        for id in buffer.all_buffers() {
            assert_eq!(device.buffer_size(id).unwrap(), 0);
        }
    }

    #[test]
    fn swap_and_reset_select_the_right_buffer() {
        let device = HeadlessDevice::new();
        let mut buffer = IndirectCommandBuffer::new(&device, "cmd").unwrap();
        let [a, b] = buffer.flip_flop;

        buffer.reset();
        assert_eq!(buffer.front_buffer(), buffer.original_buffer());
        assert_eq!(buffer.back_buffer(), b);

        buffer.swap();
        assert_eq!((buffer.front_buffer(), buffer.back_buffer()), (b, a));
        buffer.swap();
        assert_eq!((buffer.front_buffer(), buffer.back_buffer()), (a, b));

        buffer.swap();
        buffer.reset();
        assert_eq!(buffer.front_buffer(), buffer.original_buffer());
    }

    #[test]
    fn destroy_releases_all_buffers() {
        let device = HeadlessDevice::new();
        let buffer = IndirectCommandBuffer::new(&device, "cmd").unwrap();
        assert_eq!(device.live_buffer_count(), 3);
        buffer.destroy(&device);
        assert_eq!(device.live_buffer_count(), 0);
    }
}
