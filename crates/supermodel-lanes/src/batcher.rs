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

//! Aggregation of many `(geometry, material)` pairs into one drawable supermodel.
//!
//! A rebuild runs the subdivider on every geometry and concatenates the
//! results into a handful of shared buffers:
//!
//! | buffer            | content                          | binding slot |
//! |-------------------|----------------------------------|--------------|
//! | materials         | one [`MaterialRecord`] per unique material | 1  |
//! | models            | one [`ModelRecord`] per submodel | 2            |
//! | dynamic models    | one [`DynamicModelRecord`] per geometry, refreshed every bind | 3 |
//! | vertices, indices | every geometry, back to back     | n/a          |
//! | commands          | one draw per submodel ([`IndirectCommandBuffer`]) | n/a |
//!
//! Indices stay local to their geometry. Each draw command carries the
//! geometry's first vertex as `base_vertex` instead.

use std::borrow::Cow;
use std::sync::Arc;

use ahash::AHashMap;
use supermodel_core::math::{Aabb, Mat4, Vec2, Vec3};
use supermodel_core::renderer::{
    BindingSlot, BufferDescriptor, BufferId, BufferUsage, DrawIndexedIndirect, DynamicModelRecord,
    GraphicsDevice, IndirectDraw, MaterialRecord, ModelRecord, ShaderId, SupermodelSettings,
    SupermodelVertex, UniformValue,
};
use supermodel_core::{Geometry, Material};

use crate::bindless::BindlessTextureRegistry;
use crate::command_buffer::IndirectCommandBuffer;
use crate::error::BatchError;
use crate::material::material_record;
use crate::subdivision::{SpatialSubdivider, SubdividedGeometry};

/// Lifecycle of the GPU-side supermodel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Content changed since the last rebuild. The next bind rebuilds.
    Dirty,
    /// The GPU buffers match the content.
    Ready,
    /// The last rebuild failed. GPU buffers are undefined until an explicit
    /// [`SupermodelBatcher::rebuild`] succeeds or content is added.
    Failed,
}

/// The GPU buffers owned by a batcher, apart from the command buffers.
#[derive(Debug, Clone, Copy)]
struct SupermodelBuffers {
    materials: BufferId,
    models: BufferId,
    dynamic_models: BufferId,
    vertices: BufferId,
    indices: BufferId,
}

impl SupermodelBuffers {
    fn new(device: &dyn GraphicsDevice, label: &str) -> Result<Self, BatchError> {
        let create = |name: &str, usage: BufferUsage| {
            device.create_buffer(&BufferDescriptor {
                label: Some(Cow::Owned(format!("{label} [{name}]"))),
                size: 0,
                usage: usage | BufferUsage::COPY_DST,
            })
        };
        Ok(Self {
            materials: create("materials", BufferUsage::STORAGE)?,
            models: create("models", BufferUsage::STORAGE)?,
            dynamic_models: create("dynamic models", BufferUsage::STORAGE | BufferUsage::MAP_WRITE)?,
            vertices: create("vertices", BufferUsage::VERTEX)?,
            indices: create("indices", BufferUsage::INDEX)?,
        })
    }

    fn all(&self) -> [BufferId; 5] {
        [
            self.materials,
            self.models,
            self.dynamic_models,
            self.vertices,
            self.indices,
        ]
    }
}

/// CPU-side result of a rebuild, before upload.
#[derive(Debug, Default)]
struct SupermodelData {
    material_records: Vec<MaterialRecord>,
    model_records: Vec<ModelRecord>,
    vertices: Vec<SupermodelVertex>,
    indices: Vec<u32>,
    commands: Vec<DrawIndexedIndirect>,
    subdivided: Vec<SubdividedGeometry>,
}

/// Merges `(geometry, material)` pairs into one supermodel drawn with a single
/// indirect multi-draw.
///
/// Geometry `i` is paired with material `i`. Adding either marks the batcher
/// dirty; the rebuild itself only runs on the next [`bind`](Self::bind) or on
/// an explicit [`rebuild`](Self::rebuild).
#[derive(Debug)]
pub struct SupermodelBatcher {
    settings: SupermodelSettings,
    subdivider: SpatialSubdivider,

    geometries: Vec<Arc<Geometry>>,
    materials: Vec<Arc<Material>>,
    model_matrices: Vec<Mat4>,
    view: Mat4,
    projection: Mat4,

    buffers: SupermodelBuffers,
    commands: IndirectCommandBuffer,

    subdivided: Vec<SubdividedGeometry>,
    model_records: Vec<ModelRecord>,
    material_records: Vec<MaterialRecord>,

    state: BatchState,
    bound: bool,
}

impl SupermodelBatcher {
    /// Creates an empty batcher and its (empty) GPU buffers.
    ///
    /// # Errors
    ///
    /// [`BatchError::Resource`] if a buffer cannot be created.
    pub fn new(device: &dyn GraphicsDevice, settings: SupermodelSettings) -> Result<Self, BatchError> {
        let buffers = SupermodelBuffers::new(device, &settings.label)?;
        let commands = IndirectCommandBuffer::new(device, &format!("{} [commands]", settings.label))?;
        Ok(Self {
            subdivider: SpatialSubdivider::new(settings.max_triangles_per_submodel as usize),
            settings,
            geometries: Vec::new(),
            materials: Vec::new(),
            model_matrices: Vec::new(),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            buffers,
            commands,
            subdivided: Vec::new(),
            model_records: Vec::new(),
            material_records: Vec::new(),
            state: BatchState::Dirty,
            bound: false,
        })
    }

    /// Appends a geometry with an identity transform and returns its index,
    /// which is also its `dynamic_model_id`.
    pub fn add_geometry(&mut self, geometry: Arc<Geometry>) -> usize {
        self.geometries.push(geometry);
        self.model_matrices.push(Mat4::IDENTITY);
        self.state = BatchState::Dirty;
        self.geometries.len() - 1
    }

    /// Appends the material of the geometry at the same position.
    pub fn add_material(&mut self, material: Arc<Material>) {
        self.materials.push(material);
        self.state = BatchState::Dirty;
    }

    /// Appends a geometry together with its material.
    pub fn add(&mut self, geometry: Arc<Geometry>, material: Arc<Material>) -> usize {
        self.add_material(material);
        self.add_geometry(geometry)
    }

    /// Sets the model-to-world transform of a geometry. It reaches the GPU on
    /// the next [`bind`](Self::bind), without a rebuild.
    pub fn set_model_matrix(&mut self, geometry: usize, matrix: Mat4) -> Result<(), BatchError> {
        let count = self.model_matrices.len();
        let slot = self.model_matrices.get_mut(geometry).ok_or_else(|| {
            BatchError::InvalidState(format!(
                "geometry index {geometry} out of range ({count} geometries)"
            ))
        })?;
        *slot = matrix;
        Ok(())
    }

    /// The transform of a geometry.
    pub fn model_matrix(&self, geometry: usize) -> Option<Mat4> {
        self.model_matrices.get(geometry).copied()
    }

    /// Sets the camera matrices uploaded by [`draw`](Self::draw).
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
    }

    /// Rebuilds the supermodel from scratch and uploads it.
    ///
    /// On success the state becomes [`BatchState::Ready`]. On failure it becomes
    /// [`BatchState::Failed`] and the GPU buffers must not be drawn.
    ///
    /// # Errors
    ///
    /// - [`BatchError::InvalidState`] if geometry and material counts differ.
    /// - [`BatchError::MalformedGeometry`] if a geometry cannot be subdivided.
    /// - [`BatchError::HandleNotReady`] if a material texture has no storage yet.
    /// - [`BatchError::GpuUploadFailure`] if the device rejects an upload.
    pub fn rebuild(
        &mut self,
        device: &dyn GraphicsDevice,
        registry: &mut BindlessTextureRegistry,
    ) -> Result<(), BatchError> {
        let result = self.try_rebuild(device, registry);
        self.state = match &result {
            Ok(()) => BatchState::Ready,
            Err(e) => {
                log::error!("Supermodel({}): Rebuild failed: {}", self.settings.label, e);
                BatchState::Failed
            }
        };
        result
    }

    fn try_rebuild(
        &mut self,
        device: &dyn GraphicsDevice,
        registry: &mut BindlessTextureRegistry,
    ) -> Result<(), BatchError> {
        self.subdivided.clear();
        self.model_records.clear();
        self.material_records.clear();

        if self.geometries.len() != self.materials.len() {
            return Err(BatchError::InvalidState(format!(
                "{} geometries but {} materials",
                self.geometries.len(),
                self.materials.len()
            )));
        }

        if self.geometries.is_empty() {
            log::warn!(
                "Supermodel({}): No geometry to batch, nothing will be drawn",
                self.settings.label
            );
            self.commands
                .clear_elements(device)
                .map_err(BatchError::upload("commands"))?;
            return Ok(());
        }

        log::info!(
            "Supermodel({}): Building from {} geometries",
            self.settings.label,
            self.geometries.len()
        );
        let data = self.assemble(device, registry)?;
        self.upload(device, &data)?;

        log::info!(
            "Supermodel({}): Finished with {} submodels, {} materials, {} vertices, {} indices",
            self.settings.label,
            data.commands.len(),
            data.material_records.len(),
            data.vertices.len(),
            data.indices.len()
        );

        self.subdivided = data.subdivided;
        self.model_records = data.model_records;
        self.material_records = data.material_records;
        Ok(())
    }

    /// Runs subdivision and builds every CPU-side array.
    fn assemble(
        &self,
        device: &dyn GraphicsDevice,
        registry: &mut BindlessTextureRegistry,
    ) -> Result<SupermodelData, BatchError> {
        let mut data = SupermodelData::default();
        let mut material_ids: AHashMap<&str, u32> = AHashMap::new();
        let mut unique_materials: Vec<&Material> = Vec::new();
        let geometry_count = self.geometries.len();

        for (geometry_index, (geometry, material)) in
            self.geometries.iter().zip(&self.materials).enumerate()
        {
            let material_id = *material_ids.entry(material.name.as_str()).or_insert_with(|| {
                unique_materials.push(material);
                (unique_materials.len() - 1) as u32
            });

            let bounds = Aabb::from_points(geometry.positions.iter().copied());
            let (tc_min, tc_extent) = geometry.tex_coord_range();
            let base_vertex = to_i32(data.vertices.len(), "vertex count")?;

            for submodel in self.subdivider.subdivide(geometry)? {
                let sub_bounds = submodel.bounding_box();
                data.model_records.push(ModelRecord {
                    b_min: bounds.min.to_array(),
                    material_id,
                    axis_lengths: bounds.size().abs().to_array(),
                    submodel_id: to_u32(data.model_records.len(), "submodel count")?,
                    submodel_b_min: sub_bounds.min.to_array(),
                    tc_min,
                    submodel_axis_lengths: sub_bounds.size().to_array(),
                    tc_extent,
                    _padding: [0.0; 3],
                    dynamic_model_id: to_u32(geometry_index, "geometry count")?,
                });
                data.commands.push(DrawIndexedIndirect::new(
                    to_u32(data.indices.len(), "index count")?,
                    to_u32(submodel.indices().len(), "index count")?,
                    base_vertex,
                ));
                data.indices.extend_from_slice(submodel.indices());
                data.subdivided.push(submodel);
            }

            append_vertices(&mut data.vertices, geometry, bounds, (tc_min, tc_extent));

            log::debug!(
                "Supermodel({}): Processed geometry [{}/{}] '{}'",
                self.settings.label,
                geometry_index + 1,
                geometry_count,
                geometry.name
            );
        }

        data.material_records = unique_materials
            .into_iter()
            .map(|material| material_record(device, registry, material))
            .collect::<Result<_, _>>()?;
        Ok(data)
    }

    fn upload(&mut self, device: &dyn GraphicsDevice, data: &SupermodelData) -> Result<(), BatchError> {
        let precision = self.settings.vertex_precision;
        let uploads: [(BufferId, &str, Cow<'_, [u8]>); 4] = [
            (
                self.buffers.materials,
                "materials",
                Cow::Borrowed(bytemuck::cast_slice(&data.material_records)),
            ),
            (
                self.buffers.models,
                "models",
                Cow::Borrowed(bytemuck::cast_slice(&data.model_records)),
            ),
            (
                self.buffers.vertices,
                "vertices",
                Cow::Owned(precision.encode(&data.vertices)),
            ),
            (
                self.buffers.indices,
                "indices",
                Cow::Borrowed(bytemuck::cast_slice(&data.indices)),
            ),
        ];

        for (buffer, name, bytes) in &uploads {
            upload_buffer(device, *buffer, bytes).map_err(BatchError::upload(name))?;
            log::debug!(
                "Supermodel({}): Uploaded {} ({} bytes)",
                self.settings.label,
                name,
                bytes.len()
            );
        }

        self.commands
            .clear_elements(device)
            .and_then(|()| self.commands.add_elements(device, &data.commands))
            .map_err(BatchError::upload("commands"))
    }

    /// Rewrites the per-geometry transforms into the dynamic model buffer.
    fn refresh_dynamic_models(&self, device: &dyn GraphicsDevice) -> Result<(), BatchError> {
        let records: Vec<DynamicModelRecord> =
            self.model_matrices.iter().copied().map(Into::into).collect();
        let bytes: &[u8] = bytemuck::cast_slice(&records);
        let buffer = self.buffers.dynamic_models;

        if device.buffer_size(buffer)? != bytes.len() as u64 {
            device.resize_buffer(buffer, bytes.len() as u64)?;
        }
        if !bytes.is_empty() {
            device.map_buffer_mut(buffer, &mut |mapped: &mut [u8]| mapped.copy_from_slice(bytes))?;
        }
        Ok(())
    }

    /// Prepares the supermodel for drawing with `shader`.
    ///
    /// Rebuilds first if the batcher is dirty, then refreshes the transforms and
    /// binds the material, model and dynamic model buffers.
    ///
    /// # Errors
    ///
    /// [`BatchError::InvalidState`] after a failed rebuild, plus any error of
    /// [`rebuild`](Self::rebuild).
    pub fn bind(
        &mut self,
        device: &dyn GraphicsDevice,
        registry: &mut BindlessTextureRegistry,
        shader: ShaderId,
    ) -> Result<(), BatchError> {
        match self.state {
            BatchState::Dirty => self.rebuild(device, registry)?,
            BatchState::Failed => {
                return Err(BatchError::InvalidState(format!(
                    "supermodel '{}' failed to build; call rebuild() first",
                    self.settings.label
                )))
            }
            BatchState::Ready => {}
        }

        self.refresh_dynamic_models(device)?;
        device.bind_shader(shader)?;
        device.bind_storage_buffer(BindingSlot::MATERIAL_DATA, self.buffers.materials)?;
        device.bind_storage_buffer(BindingSlot::MODEL_DATA, self.buffers.models)?;
        device.bind_storage_buffer(BindingSlot::DYNAMIC_MODEL_DATA, self.buffers.dynamic_models)?;
        self.bound = true;
        Ok(())
    }

    /// Uploads the camera uniforms and draws every submodel of the current
    /// front command buffer with one indirect multi-draw.
    ///
    /// # Errors
    ///
    /// [`BatchError::InvalidState`] unless the batcher is built and bound.
    pub fn draw(&self, device: &dyn GraphicsDevice, shader: ShaderId) -> Result<(), BatchError> {
        if self.state != BatchState::Ready {
            return Err(BatchError::InvalidState(format!(
                "supermodel '{}' is {:?}, not ready to draw",
                self.settings.label, self.state
            )));
        }
        if !self.bound {
            return Err(BatchError::InvalidState(format!(
                "supermodel '{}' drawn before bind",
                self.settings.label
            )));
        }

        device.set_uniform(shader, "view", UniformValue::Mat4(self.view.to_cols_array_2d()))?;
        device.set_uniform(
            shader,
            "view_normal",
            UniformValue::Mat4(self.view.normal_matrix().to_cols_array_2d()),
        )?;
        device.set_uniform(
            shader,
            "proj",
            UniformValue::Mat4(self.projection.to_cols_array_2d()),
        )?;

        if self.commands.is_empty() {
            return Ok(());
        }
        device.multi_draw_indexed_indirect(&IndirectDraw {
            vertex_buffer: self.buffers.vertices,
            vertex_precision: self.settings.vertex_precision,
            index_buffer: self.buffers.indices,
            indirect_buffer: self.commands.front_buffer(),
            draw_count: to_u32(self.commands.len(), "draw count")?,
        })?;
        Ok(())
    }

    /// Releases the storage slots and the shader.
    pub fn unbind(&mut self, device: &dyn GraphicsDevice, shader: ShaderId) -> Result<(), BatchError> {
        for slot in [
            BindingSlot::MATERIAL_DATA,
            BindingSlot::MODEL_DATA,
            BindingSlot::DYNAMIC_MODEL_DATA,
        ] {
            device.unbind_storage_buffer(slot)?;
        }
        device.unbind_shader(shader)?;
        self.bound = false;
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Whether the next bind will rebuild.
    pub fn is_dirty(&self) -> bool {
        self.state == BatchState::Dirty
    }

    /// Whether [`bind`](Self::bind) succeeded since the last [`unbind`](Self::unbind).
    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// The settings the batcher was created with.
    pub fn settings(&self) -> &SupermodelSettings {
        &self.settings
    }

    /// Number of geometries added.
    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Number of submodels of the last successful rebuild.
    pub fn submodel_count(&self) -> usize {
        self.model_records.len()
    }

    /// Submodels of the last successful rebuild, in submodel ID order.
    pub fn subdivided_geometries(&self) -> &[SubdividedGeometry] {
        &self.subdivided
    }

    /// Model records of the last successful rebuild.
    pub fn model_records(&self) -> &[ModelRecord] {
        &self.model_records
    }

    /// Deduplicated material records of the last successful rebuild.
    pub fn material_records(&self) -> &[MaterialRecord] {
        &self.material_records
    }

    /// The draw command buffers, for culling passes.
    pub fn command_buffer(&self) -> &IndirectCommandBuffer {
        &self.commands
    }

    /// Mutable access to the draw command buffers, to `reset` and `swap` them
    /// around culling passes.
    pub fn command_buffer_mut(&mut self) -> &mut IndirectCommandBuffer {
        &mut self.commands
    }

    /// The material record buffer (slot 1).
    pub fn material_buffer(&self) -> BufferId {
        self.buffers.materials
    }

    /// The model record buffer (slot 2).
    pub fn model_buffer(&self) -> BufferId {
        self.buffers.models
    }

    /// The per-geometry transform buffer (slot 3).
    pub fn dynamic_model_buffer(&self) -> BufferId {
        self.buffers.dynamic_models
    }

    /// The shared vertex buffer.
    pub fn vertex_buffer(&self) -> BufferId {
        self.buffers.vertices
    }

    /// The shared index buffer.
    pub fn index_buffer(&self) -> BufferId {
        self.buffers.indices
    }

    /// Destroys every GPU buffer owned by the batcher.
    pub fn destroy(&self, device: &dyn GraphicsDevice) {
        for buffer in self.buffers.all() {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!(
                    "Supermodel({}): Failed to destroy buffer: {:?}",
                    self.settings.label,
                    e
                );
            }
        }
        self.commands.destroy(device);
    }
}

/// Appends a geometry's vertices rescaled into its own bounds and texture range.
fn append_vertices(
    out: &mut Vec<SupermodelVertex>,
    geometry: &Geometry,
    bounds: Aabb,
    (tc_min, tc_extent): (f32, f32),
) {
    let extent = bounds.size();
    out.extend(geometry.positions.iter().enumerate().map(|(i, &position)| {
        let mut rescaled = position - bounds.min;
        for axis in 0..3 {
            if extent[axis] != 0.0 {
                rescaled[axis] /= extent[axis];
            }
        }

        let tex_coord = geometry.tex_coords.get(i).map_or(Vec2::ZERO, |&tc| {
            let shifted = tc - tc_min;
            if tc_extent != 0.0 {
                shifted / tc_extent
            } else {
                shifted
            }
        });

        SupermodelVertex {
            position: rescaled,
            normal: geometry.normals.get(i).copied().unwrap_or(Vec3::ZERO),
            tex_coord,
        }
    }));
}

fn upload_buffer(
    device: &dyn GraphicsDevice,
    buffer: BufferId,
    bytes: &[u8],
) -> Result<(), supermodel_core::renderer::ResourceError> {
    device.resize_buffer(buffer, bytes.len() as u64)?;
    if !bytes.is_empty() {
        device.write_buffer(buffer, 0, bytes)?;
    }
    Ok(())
}

fn to_u32(value: usize, what: &str) -> Result<u32, BatchError> {
    u32::try_from(value)
        .map_err(|_| BatchError::InvalidState(format!("{what} {value} exceeds u32 range")))
}

fn to_i32(value: usize, what: &str) -> Result<i32, BatchError> {
    i32::try_from(value)
        .map_err(|_| BatchError::InvalidState(format!("{what} {value} exceeds i32 range")))
}
