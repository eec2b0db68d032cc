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

//! A cache of bindless texture handles keyed by material slot.
//!
//! Each `(material, slot)` pair gets one entry under the key
//! `"{material}_{slot}_bindless"`. The entry owns the residency of its handle:
//! dropping or replacing an entry makes the handle non-resident first.

use ahash::AHashMap;
use supermodel_core::renderer::{GraphicsDevice, TextureId};
use supermodel_core::TextureSlot;

use crate::error::BatchError;

#[derive(Debug, Clone, Copy, Default)]
struct BindlessEntry {
    texture: Option<TextureId>,
    /// `0` until the texture has storage and the handle is resident.
    handle: u64,
}

impl BindlessEntry {
    /// Fetches and makes resident the handle, if the texture has storage by now.
    fn resolve(&mut self, device: &dyn GraphicsDevice) -> Result<(), BatchError> {
        let Some(texture) = self.texture else {
            return Ok(());
        };
        if self.handle != 0 {
            return Ok(());
        }
        let handle = device.texture_handle(texture)?;
        if handle != 0 {
            device.make_handle_resident(handle)?;
            self.handle = handle;
        }
        Ok(())
    }

    fn release(&mut self, device: &dyn GraphicsDevice, key: &str) {
        if self.handle == 0 {
            return;
        }
        if let Err(e) = device.make_handle_non_resident(self.handle) {
            log::warn!("BindlessTextureRegistry: Failed to release '{key}': {e:?}");
        }
        self.handle = 0;
    }
}

/// Owns one persistent bindless handle per material texture slot.
///
/// The registry is an explicit object handed to whoever builds material
/// records, so several independent supermodels can share or isolate their handles.
#[derive(Debug, Default)]
pub struct BindlessTextureRegistry {
    entries: AHashMap<String, BindlessEntry>,
}

impl BindlessTextureRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry key of a material texture slot.
    pub fn key(material: &str, slot: TextureSlot) -> String {
        format!("{material}_{slot}_bindless")
    }

    /// Returns the handle stored under `key`, creating the entry for `texture`
    /// on first use. Later calls with the same key return the same handle and
    /// ignore `texture`.
    ///
    /// # Errors
    ///
    /// [`BatchError::HandleNotReady`] while the texture has no GPU storage.
    pub fn get_or_create(
        &mut self,
        device: &dyn GraphicsDevice,
        key: &str,
        texture: TextureId,
    ) -> Result<u64, BatchError> {
        let entry = self.entries.entry(key.to_owned()).or_default();
        if entry.texture.is_none() {
            entry.texture = Some(texture);
        }
        entry.resolve(device)?;
        self.handle(key)
    }

    /// Creates an entry with no texture attached. Existing entries are kept.
    pub fn reserve(&mut self, key: &str) {
        self.entries.entry(key.to_owned()).or_default();
    }

    /// Attaches `texture` to `key`, replacing whatever was attached before.
    ///
    /// The previous handle is made non-resident first. The new one becomes
    /// available as soon as the texture has storage.
    pub fn wrap(
        &mut self,
        device: &dyn GraphicsDevice,
        key: &str,
        texture: TextureId,
    ) -> Result<(), BatchError> {
        let entry = self.entries.entry(key.to_owned()).or_default();
        entry.release(device, key);
        entry.texture = Some(texture);
        entry.resolve(device)
    }

    /// The resident handle stored under `key`.
    ///
    /// # Errors
    ///
    /// [`BatchError::HandleNotReady`] if there is no entry or its texture has no
    /// storage yet.
    pub fn handle(&self, key: &str) -> Result<u64, BatchError> {
        match self.entries.get(key) {
            Some(entry) if entry.handle != 0 => Ok(entry.handle),
            _ => Err(BatchError::HandleNotReady {
                key: key.to_owned(),
            }),
        }
    }

    /// Whether an entry exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Makes the handle of `key` non-resident and drops the entry.
    /// Returns `false` if there was no such entry.
    pub fn release(&mut self, device: &dyn GraphicsDevice, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(mut entry) => {
                entry.release(device, key);
                true
            }
            None => false,
        }
    }

    /// Releases every entry.
    pub fn release_all(&mut self, device: &dyn GraphicsDevice) {
        for (key, mut entry) in self.entries.drain() {
            entry.release(device, &key);
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supermodel_infra::HeadlessDevice;

    #[test]
    fn key_format() {
        assert_eq!(
            BindlessTextureRegistry::key("brick", TextureSlot::NormalMap),
            "brick_normalmap_bindless"
        );
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let device = HeadlessDevice::new();
        let first = device.create_uploaded_texture("a").unwrap();
        let second = device.create_uploaded_texture("b").unwrap();
        let mut registry = BindlessTextureRegistry::new();

        let handle = registry.get_or_create(&device, "k", first).unwrap();
        assert!(device.is_resident(handle));
        assert_eq!(registry.get_or_create(&device, "k", second).unwrap(), handle);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn handle_is_not_ready_before_upload() {
        let device = HeadlessDevice::new();
        let texture = device.create_texture("late").unwrap();
        let mut registry = BindlessTextureRegistry::new();

        let err = registry.get_or_create(&device, "k", texture).unwrap_err();
        assert_eq!(err, BatchError::HandleNotReady { key: "k".into() });

        let uploaded = device.upload_texture(texture).unwrap();
        assert_eq!(registry.get_or_create(&device, "k", texture).unwrap(), uploaded);
    }

    #[test]
    fn reserved_entry_has_no_handle() {
        let mut registry = BindlessTextureRegistry::new();
        registry.reserve("k");
        assert!(registry.contains("k"));
        assert!(matches!(
            registry.handle("k"),
            Err(BatchError::HandleNotReady { .. })
        ));
    }

    #[test]
    fn wrap_replaces_and_releases_previous_handle() {
        let device = HeadlessDevice::new();
        let old = device.create_uploaded_texture("old").unwrap();
        let new = device.create_uploaded_texture("new").unwrap();
        let mut registry = BindlessTextureRegistry::new();

        let old_handle = registry.get_or_create(&device, "k", old).unwrap();
        registry.wrap(&device, "k", new).unwrap();
        let new_handle = registry.handle("k").unwrap();

        assert_ne!(old_handle, new_handle);
        assert!(!device.is_resident(old_handle));
        assert!(device.is_resident(new_handle));
    }

    #[test]
    fn release_makes_handles_non_resident() {
        let device = HeadlessDevice::new();
        let mut registry = BindlessTextureRegistry::new();
        let a = registry
            .get_or_create(&device, "a", device.create_uploaded_texture("a").unwrap())
            .unwrap();
        let b = registry
            .get_or_create(&device, "b", device.create_uploaded_texture("b").unwrap())
            .unwrap();

        assert!(registry.release(&device, "a"));
        assert!(!registry.release(&device, "a"));
        assert!(!device.is_resident(a));

        registry.release_all(&device);
        assert!(!device.is_resident(b));
        assert!(registry.is_empty());
    }
}
