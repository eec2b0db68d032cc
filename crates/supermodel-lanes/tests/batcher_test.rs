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

//! Integration tests for building, binding and drawing supermodels on the
//! headless device.

use std::sync::Arc;

use supermodel_core::math::{Mat4, Vec2, Vec3};
use supermodel_core::renderer::{
    BindingSlot, BufferUsage, DrawIndexedIndirect, DynamicModelRecord, FullPrecisionVertex,
    GraphicsDevice, MaterialRecord, ModelRecord, ShaderId, SupermodelSettings, UniformValue,
    VertexPrecision,
};
use supermodel_core::{Geometry, Material, TextureSlot};
use supermodel_infra::HeadlessDevice;
use supermodel_lanes::{BatchError, BatchState, BindlessTextureRegistry, SupermodelBatcher};

const SHADER: ShaderId = ShaderId(7);

/// A row of `count` unit triangles along X, starting at `offset`.
fn row(name: &str, count: usize, offset: f32) -> Arc<Geometry> {
    let mut positions = Vec::new();
    let mut tex_coords = Vec::new();
    let mut indices = Vec::new();
    for i in 0..count {
        let x = offset + i as f32;
        let base = positions.len() as u32;
        positions.extend([
            Vec3::new(x, 0.0, 0.0),
            Vec3::new(x + 1.0, 0.0, 0.0),
            Vec3::new(x, 1.0, 1.0),
        ]);
        tex_coords.extend([Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)]);
        indices.extend([base, base + 1, base + 2]);
    }
    Arc::new(Geometry::new(name, positions, indices).with_tex_coords(tex_coords))
}

fn material(name: &str) -> Arc<Material> {
    Arc::new(Material::new(name).with_vec3("diffuse_color", Vec3::new(0.2, 0.4, 0.6)))
}

fn settings(max_triangles_per_submodel: u32) -> SupermodelSettings {
    SupermodelSettings {
        max_triangles_per_submodel,
        ..Default::default()
    }
}

#[test]
fn test_single_geometry_splits_into_four_draws() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(1000)).unwrap();
    batcher.add(row("big", 2500, 0.0), material("m"));

    batcher.bind(&device, &mut registry, SHADER).unwrap();
    batcher.draw(&device, SHADER).unwrap();

    let draws = device.recorded_draws();
    assert_eq!(draws.len(), 1);
    assert_eq!(draws[0].draw.draw_count, 4);
    assert_eq!(
        draws[0].commands,
        vec![
            DrawIndexedIndirect::new(0, 626 * 3, 0),
            DrawIndexedIndirect::new(1878, 625 * 3, 0),
            DrawIndexedIndirect::new(3753, 625 * 3, 0),
            DrawIndexedIndirect::new(5628, 624 * 3, 0),
        ]
    );
    let ids: Vec<u32> = batcher.model_records().iter().map(|r| r.submodel_id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
}

#[test]
fn test_shared_material_is_deduplicated() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(1000)).unwrap();
    batcher.add(row("a", 3, 0.0), material("shared"));
    batcher.add(row("b", 2, 10.0), material("shared"));
    batcher.rebuild(&device, &mut registry).unwrap();

    let materials: Vec<MaterialRecord> = device.read_records(batcher.material_buffer()).unwrap();
    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].k_diffuse, [0.2, 0.4, 0.6]);

    let models: Vec<ModelRecord> = device.read_records(batcher.model_buffer()).unwrap();
    assert_eq!(models.len(), 2);
    assert!(models.iter().all(|m| m.material_id == 0));
    assert_eq!(models[0].dynamic_model_id, 0);
    assert_eq!(models[1].dynamic_model_id, 1);
}

#[test]
fn test_materials_keep_first_seen_order() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(1000)).unwrap();
    batcher.add(row("a", 1, 0.0), material("stone"));
    batcher.add(row("b", 1, 0.0), material("wood"));
    batcher.add(row("c", 1, 0.0), material("stone"));
    batcher.rebuild(&device, &mut registry).unwrap();

    let ids: Vec<u32> = batcher.model_records().iter().map(|m| m.material_id).collect();
    assert_eq!(ids, vec![0, 1, 0]);
    assert_eq!(batcher.material_records().len(), 2);
}

#[test]
fn test_indices_stay_local_and_base_vertex_offsets() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(1000)).unwrap();
    let first = row("a", 3, 0.0);
    let second = row("b", 2, 5.0);
    batcher.add(first.clone(), material("m"));
    batcher.add(second.clone(), material("m"));
    batcher.rebuild(&device, &mut registry).unwrap();

    assert_eq!(
        batcher.command_buffer().commands(),
        &[
            DrawIndexedIndirect::new(0, 9, 0),
            DrawIndexedIndirect::new(9, 6, 9),
        ]
    );

    // Both halves of the index buffer reference their own geometry's vertices.
    let indices: Vec<u32> = device.read_records(batcher.index_buffer()).unwrap();
    assert_eq!(indices.len(), 15);
    assert!(indices[..9].iter().all(|&i| (i as usize) < first.positions.len()));
    assert!(indices[9..].iter().all(|&i| (i as usize) < second.positions.len()));
}

#[test]
fn test_model_records_carry_parent_and_submodel_bounds() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(6)).unwrap();
    let geometry = row("a", 6, 2.0);
    batcher.add(geometry.clone(), material("m"));
    batcher.rebuild(&device, &mut registry).unwrap();

    let records = batcher.model_records();
    assert_eq!(records.len(), 2);
    for (record, submodel) in records.iter().zip(batcher.subdivided_geometries()) {
        assert_eq!(record.parent_bounds(), geometry.bounding_box);
        assert_eq!(record.submodel_bounds(), submodel.bounding_box());
        // The texture range is the parent's, shared by every submodel.
        assert_eq!((record.tc_min, record.tc_extent), (0.0, 1.0));
    }
}

/// Triangle `i` sits at `x = i` and covers texture coordinates `[i, i + 1]`
/// on both axes, so every slice of the row has its own texture range.
fn staircase(count: usize) -> Arc<Geometry> {
    let mut positions = Vec::new();
    let mut tex_coords = Vec::new();
    let mut indices = Vec::new();
    for i in 0..count {
        let x = i as f32;
        let base = positions.len() as u32;
        positions.extend([
            Vec3::new(x, 0.0, 0.0),
            Vec3::new(x + 1.0, 0.0, 0.0),
            Vec3::new(x, 1.0, 0.0),
        ]);
        tex_coords.extend([
            Vec2::new(x, x),
            Vec2::new(x + 1.0, x),
            Vec2::new(x, x + 1.0),
        ]);
        indices.extend([base, base + 1, base + 2]);
    }
    Arc::new(Geometry::new("stairs", positions, indices).with_tex_coords(tex_coords))
}

#[test]
fn test_texcoords_use_the_parent_range_for_every_submodel() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(5)).unwrap();
    let geometry = staircase(8);
    batcher.add(geometry.clone(), material("m"));
    batcher.rebuild(&device, &mut registry).unwrap();

    // 8 -> (5, 3) -> ((3, 2), 3), largest X first.
    let submodels = batcher.subdivided_geometries();
    let sizes: Vec<usize> = submodels.iter().map(|s| s.triangle_count()).collect();
    assert_eq!(sizes, vec![3, 2, 3]);

    // The first submodel alone spans [5, 8].
    let own_min = submodels[0]
        .indices()
        .iter()
        .map(|&i| geometry.tex_coords[i as usize].min_element())
        .fold(f32::INFINITY, f32::min);
    assert_eq!(own_min, 5.0);

    let records: Vec<ModelRecord> = device.read_records(batcher.model_buffer()).unwrap();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert_eq!((record.tc_min, record.tc_extent), (0.0, 8.0));
    }

    // The last corner of the last triangle, (8, 7), maps through the parent range.
    let vertices: Vec<FullPrecisionVertex> =
        device.read_records(batcher.vertex_buffer()).unwrap();
    assert_eq!(vertices.len(), 24);
    assert_eq!(vertices[22].tex_coord, [1.0, 0.875]);
}

#[test]
fn test_unbind_releases_slots_and_shader() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(1000)).unwrap();
    batcher.add(row("a", 4, 0.0), material("m"));

    batcher.bind(&device, &mut registry, SHADER).unwrap();
    assert!(device.is_shader_bound(SHADER));
    assert_eq!(
        device.storage_binding(BindingSlot::MATERIAL_DATA),
        Some(batcher.material_buffer())
    );
    assert_eq!(
        device.storage_binding(BindingSlot::MODEL_DATA),
        Some(batcher.model_buffer())
    );
    assert_eq!(
        device.storage_binding(BindingSlot::DYNAMIC_MODEL_DATA),
        Some(batcher.dynamic_model_buffer())
    );

    batcher.unbind(&device, SHADER).unwrap();
    assert!(!batcher.is_bound());
    assert!(!device.is_shader_bound(SHADER));
    for slot in [
        BindingSlot::MATERIAL_DATA,
        BindingSlot::MODEL_DATA,
        BindingSlot::DYNAMIC_MODEL_DATA,
    ] {
        assert_eq!(device.storage_binding(slot), None);
    }
    assert!(matches!(
        batcher.draw(&device, SHADER),
        Err(BatchError::InvalidState(_))
    ));
}

#[test]
fn test_buffers_are_labelled_after_the_supermodel() {
    let device = HeadlessDevice::new();
    let batcher = SupermodelBatcher::new(
        &device,
        SupermodelSettings {
            label: "terrain".to_string(),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(
        device.buffer_label(batcher.vertex_buffer()).unwrap().as_deref(),
        Some("terrain [vertices]")
    );
    assert_eq!(
        device.buffer_label(batcher.command_buffer().original_buffer()).unwrap().as_deref(),
        Some("terrain [commands] [original]")
    );

    let usage = device.buffer_usage(batcher.dynamic_model_buffer()).unwrap();
    assert!(usage.contains(BufferUsage::STORAGE | BufferUsage::MAP_WRITE));
    let usage = device.buffer_usage(batcher.index_buffer()).unwrap();
    assert!(usage.contains(BufferUsage::INDEX | BufferUsage::COPY_DST));
    assert!(!usage.intersects(BufferUsage::VERTEX));
}

#[test]
fn test_rebuild_is_byte_identical() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let texture = device.create_uploaded_texture("albedo").unwrap();
    let mut batcher = SupermodelBatcher::new(&device, settings(16)).unwrap();
    batcher.add(
        row("a", 100, 0.0),
        Arc::new(Material::new("tex").with_texture(TextureSlot::Diffuse, texture)),
    );
    batcher.add(row("b", 40, -50.0), material("plain"));

    batcher.rebuild(&device, &mut registry).unwrap();
    let models = device.read_buffer(batcher.model_buffer()).unwrap();
    let materials = device.read_buffer(batcher.material_buffer()).unwrap();
    let vertices = device.read_buffer(batcher.vertex_buffer()).unwrap();

    batcher.rebuild(&device, &mut registry).unwrap();
    assert_eq!(device.read_buffer(batcher.model_buffer()).unwrap(), models);
    assert_eq!(device.read_buffer(batcher.material_buffer()).unwrap(), materials);
    assert_eq!(device.read_buffer(batcher.vertex_buffer()).unwrap(), vertices);
}

#[test]
fn test_upload_failure_blocks_drawing_until_rebuilt() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(1000)).unwrap();
    batcher.add(row("a", 3, 0.0), material("m"));

    device.fail_writes_after(Some(1)).unwrap();
    let err = batcher.rebuild(&device, &mut registry).unwrap_err();
    assert!(matches!(err, BatchError::GpuUploadFailure { ref buffer, .. } if buffer == "models"));
    assert_eq!(batcher.state(), BatchState::Failed);

    device.fail_writes_after(None).unwrap();
    assert!(matches!(
        batcher.bind(&device, &mut registry, SHADER),
        Err(BatchError::InvalidState(_))
    ));
    assert!(matches!(
        batcher.draw(&device, SHADER),
        Err(BatchError::InvalidState(_))
    ));

    batcher.rebuild(&device, &mut registry).unwrap();
    batcher.bind(&device, &mut registry, SHADER).unwrap();
    batcher.draw(&device, SHADER).unwrap();
    assert_eq!(device.recorded_draws().len(), 1);
}

#[test]
fn test_unready_texture_fails_rebuild_until_uploaded() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let texture = device.create_texture("late").unwrap();
    let mut batcher = SupermodelBatcher::new(&device, settings(1000)).unwrap();
    batcher.add(
        row("a", 1, 0.0),
        Arc::new(Material::new("m").with_texture(TextureSlot::NormalMap, texture)),
    );

    let err = batcher.rebuild(&device, &mut registry).unwrap_err();
    assert_eq!(
        err,
        BatchError::HandleNotReady {
            key: "m_normalmap_bindless".into()
        }
    );

    let handle = device.upload_texture(texture).unwrap();
    batcher.rebuild(&device, &mut registry).unwrap();
    assert_eq!(batcher.material_records()[0].tex_normal, handle);
    assert!(device.is_resident(handle));
}

#[test]
fn test_transforms_refresh_on_every_bind() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(1000)).unwrap();
    let a = batcher.add(row("a", 1, 0.0), material("m"));
    let b = batcher.add(row("b", 1, 0.0), material("m"));

    batcher.bind(&device, &mut registry, SHADER).unwrap();
    let identity: Vec<DynamicModelRecord> =
        device.read_records(batcher.dynamic_model_buffer()).unwrap();
    assert_eq!(identity, vec![DynamicModelRecord::from(Mat4::IDENTITY); 2]);
    batcher.unbind(&device, SHADER).unwrap();

    let moved = Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0));
    batcher.set_model_matrix(b, moved).unwrap();
    assert_eq!(batcher.state(), BatchState::Ready);
    batcher.bind(&device, &mut registry, SHADER).unwrap();

    let records: Vec<DynamicModelRecord> =
        device.read_records(batcher.dynamic_model_buffer()).unwrap();
    assert_eq!(records[a], DynamicModelRecord::from(Mat4::IDENTITY));
    assert_eq!(records[b], DynamicModelRecord::from(moved));
    assert_eq!(
        device.storage_binding(BindingSlot::DYNAMIC_MODEL_DATA),
        Some(batcher.dynamic_model_buffer())
    );
}

#[test]
fn test_draw_uploads_camera_uniforms() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(1000)).unwrap();
    batcher.add(row("a", 1, 0.0), material("m"));
    let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
    let projection = Mat4::from_scale(Vec3::new(2.0, 2.0, -1.0));
    batcher.set_camera(view, projection);

    batcher.bind(&device, &mut registry, SHADER).unwrap();
    batcher.draw(&device, SHADER).unwrap();

    assert_eq!(
        device.uniform(SHADER, "view"),
        Some(UniformValue::Mat4(view.to_cols_array_2d()))
    );
    assert_eq!(
        device.uniform(SHADER, "view_normal"),
        Some(UniformValue::Mat4(view.normal_matrix().to_cols_array_2d()))
    );
    assert_eq!(
        device.uniform(SHADER, "proj"),
        Some(UniformValue::Mat4(projection.to_cols_array_2d()))
    );
}

#[test]
fn test_draw_reads_the_culled_front_buffer() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(2)).unwrap();
    batcher.add(row("a", 4, 0.0), material("m"));
    batcher.bind(&device, &mut registry, SHADER).unwrap();

    let commands = batcher.command_buffer_mut();
    commands.reset();
    let mut culled: Vec<DrawIndexedIndirect> = commands.commands().to_vec();
    culled[0].instance_count = 0;
    device
        .write_buffer(commands.back_buffer(), 0, bytemuck::cast_slice(&culled))
        .unwrap();
    commands.swap();
    let front = commands.front_buffer();

    batcher.draw(&device, SHADER).unwrap();
    let draw = &device.recorded_draws()[0];
    assert_eq!(draw.draw.indirect_buffer, front);
    assert_eq!(draw.commands, culled);
}

#[test]
fn test_empty_batch_issues_no_draw() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, SupermodelSettings::default()).unwrap();

    batcher.rebuild(&device, &mut registry).unwrap();
    assert!(!batcher.is_dirty());
    batcher.bind(&device, &mut registry, SHADER).unwrap();
    batcher.draw(&device, SHADER).unwrap();
    assert!(device.recorded_draws().is_empty());
    assert_eq!(batcher.submodel_count(), 0);
}

#[test]
fn test_low_precision_halves_the_vertex_buffer() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(
        &device,
        SupermodelSettings {
            vertex_precision: VertexPrecision::Low,
            ..Default::default()
        },
    )
    .unwrap();
    batcher.add(row("a", 10, 0.0), material("m"));
    batcher.bind(&device, &mut registry, SHADER).unwrap();
    batcher.draw(&device, SHADER).unwrap();

    assert_eq!(device.buffer_size(batcher.vertex_buffer()).unwrap(), 30 * 16);
    assert_eq!(
        device.recorded_draws()[0].draw.vertex_precision,
        VertexPrecision::Low
    );
}

#[test]
fn test_invalid_budget_fails_the_rebuild() {
    let device = HeadlessDevice::new();
    let mut registry = BindlessTextureRegistry::new();
    let mut batcher = SupermodelBatcher::new(&device, settings(1)).unwrap();
    batcher.add(row("a", 3, 0.0), material("m"));
    assert!(matches!(
        batcher.rebuild(&device, &mut registry),
        Err(BatchError::MalformedGeometry { .. })
    ));
    assert_eq!(batcher.state(), BatchState::Failed);
}
