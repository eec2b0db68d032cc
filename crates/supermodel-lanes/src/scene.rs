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

//! A scene-level container of supermodels, one per pipeline kind.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use supermodel_core::math::Mat4;
use supermodel_core::renderer::{GraphicsDevice, ShaderId, SupermodelSettings};
use supermodel_core::{Geometry, Material};

use crate::batcher::SupermodelBatcher;
use crate::bindless::BindlessTextureRegistry;
use crate::error::BatchError;

/// The pipeline a supermodel is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SupermodelKind {
    /// Opaque geometry that only moves through its model matrix.
    Static,
}

impl fmt::Display for SupermodelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupermodelKind::Static => f.write_str("static"),
        }
    }
}

/// Owns the supermodels of a scene and the bindless registry they share.
#[derive(Debug)]
pub struct SupermodelScene {
    settings: SupermodelSettings,
    registry: BindlessTextureRegistry,
    batchers: BTreeMap<SupermodelKind, SupermodelBatcher>,
    view: Mat4,
    projection: Mat4,
}

impl SupermodelScene {
    /// Creates an empty scene. Batchers are created on first use, each with
    /// `settings` and a label suffixed by its kind.
    pub fn new(settings: SupermodelSettings) -> Self {
        Self {
            settings,
            registry: BindlessTextureRegistry::new(),
            batchers: BTreeMap::new(),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }

    fn batcher_entry(
        &mut self,
        device: &dyn GraphicsDevice,
        kind: SupermodelKind,
    ) -> Result<&mut SupermodelBatcher, BatchError> {
        if !self.batchers.contains_key(&kind) {
            let settings = SupermodelSettings {
                label: format!("{} [{kind}]", self.settings.label),
                ..self.settings.clone()
            };
            let mut batcher = SupermodelBatcher::new(device, settings)?;
            batcher.set_camera(self.view, self.projection);
            log::debug!("SupermodelScene: Created {kind} supermodel");
            self.batchers.insert(kind, batcher);
        }
        self.batchers
            .get_mut(&kind)
            .ok_or_else(|| BatchError::InvalidState(format!("no {kind} supermodel")))
    }

    /// Assigns a `(geometry, material)` pair to the supermodel of `kind` and
    /// returns the geometry's index within it.
    pub fn add(
        &mut self,
        device: &dyn GraphicsDevice,
        kind: SupermodelKind,
        geometry: Arc<Geometry>,
        material: Arc<Material>,
    ) -> Result<usize, BatchError> {
        Ok(self.batcher_entry(device, kind)?.add(geometry, material))
    }

    /// Sets the camera of every supermodel, present and future.
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
        for batcher in self.batchers.values_mut() {
            batcher.set_camera(view, projection);
        }
    }

    /// The supermodel of `kind`, if anything was added to it.
    pub fn batcher(&self, kind: SupermodelKind) -> Option<&SupermodelBatcher> {
        self.batchers.get(&kind)
    }

    /// Mutable access to the supermodel of `kind`.
    pub fn batcher_mut(&mut self, kind: SupermodelKind) -> Option<&mut SupermodelBatcher> {
        self.batchers.get_mut(&kind)
    }

    /// The kinds that currently have a supermodel, in draw order.
    pub fn kinds(&self) -> impl Iterator<Item = SupermodelKind> + '_ {
        self.batchers.keys().copied()
    }

    /// The shared bindless registry.
    pub fn registry(&self) -> &BindlessTextureRegistry {
        &self.registry
    }

    /// Mutable access to the shared bindless registry.
    pub fn registry_mut(&mut self) -> &mut BindlessTextureRegistry {
        &mut self.registry
    }

    fn existing(&mut self, kind: SupermodelKind) -> Result<&mut SupermodelBatcher, BatchError> {
        self.batchers
            .get_mut(&kind)
            .ok_or_else(|| BatchError::InvalidState(format!("no {kind} supermodel")))
    }

    /// Binds the supermodel of `kind`, rebuilding it if needed.
    pub fn bind(
        &mut self,
        device: &dyn GraphicsDevice,
        kind: SupermodelKind,
        shader: ShaderId,
    ) -> Result<(), BatchError> {
        let Self {
            registry, batchers, ..
        } = self;
        let batcher = batchers
            .get_mut(&kind)
            .ok_or_else(|| BatchError::InvalidState(format!("no {kind} supermodel")))?;
        batcher.bind(device, registry, shader)
    }

    /// Draws the supermodel of `kind`.
    pub fn draw(
        &mut self,
        device: &dyn GraphicsDevice,
        kind: SupermodelKind,
        shader: ShaderId,
    ) -> Result<(), BatchError> {
        self.existing(kind)?.draw(device, shader)
    }

    /// Unbinds the supermodel of `kind`.
    pub fn unbind(
        &mut self,
        device: &dyn GraphicsDevice,
        kind: SupermodelKind,
        shader: ShaderId,
    ) -> Result<(), BatchError> {
        self.existing(kind)?.unbind(device, shader)
    }

    /// Destroys every supermodel and releases every bindless handle.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for batcher in self.batchers.values() {
            batcher.destroy(device);
        }
        self.batchers.clear();
        self.registry.release_all(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use supermodel_core::math::Vec3;
    use supermodel_core::TextureSlot;
    use supermodel_infra::HeadlessDevice;

    fn triangle() -> Arc<Geometry> {
        Arc::new(Geometry::new(
            "tri",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
        ))
    }

    #[test]
    fn batchers_are_created_per_kind_on_first_use() {
        let device = HeadlessDevice::new();
        let mut scene = SupermodelScene::new(SupermodelSettings::default());
        assert!(scene.batcher(SupermodelKind::Static).is_none());

        scene
            .add(&device, SupermodelKind::Static, triangle(), Arc::new(Material::new("m")))
            .unwrap();
        let batcher = scene.batcher(SupermodelKind::Static).unwrap();
        assert_eq!(batcher.settings().label, "supermodel [static]");
        assert_eq!(scene.kinds().collect::<Vec<_>>(), vec![SupermodelKind::Static]);
    }

    #[test]
    fn bind_on_unknown_kind_is_invalid() {
        let device = HeadlessDevice::new();
        let mut scene = SupermodelScene::new(SupermodelSettings::default());
        assert!(matches!(
            scene.bind(&device, SupermodelKind::Static, ShaderId(0)),
            Err(BatchError::InvalidState(_))
        ));
    }

    #[test]
    fn destroy_releases_handles_through_the_shared_registry() {
        let device = HeadlessDevice::new();
        let texture = device.create_uploaded_texture("albedo").unwrap();
        let material = Material::new("m").with_texture(TextureSlot::Diffuse, texture);
        let mut scene = SupermodelScene::new(SupermodelSettings::default());
        scene
            .add(&device, SupermodelKind::Static, triangle(), Arc::new(material))
            .unwrap();

        scene.bind(&device, SupermodelKind::Static, ShaderId(1)).unwrap();
        scene.draw(&device, SupermodelKind::Static, ShaderId(1)).unwrap();
        scene.unbind(&device, SupermodelKind::Static, ShaderId(1)).unwrap();
        let handle = scene.registry().handle("m_diffuse_bindless").unwrap();
        assert!(device.is_resident(handle));

        scene.destroy(&device);
        assert!(!device.is_resident(handle));
        assert_eq!(device.live_buffer_count(), 0);
    }
}
