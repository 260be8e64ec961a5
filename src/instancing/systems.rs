// src/instancing/systems.rs

use std::time::Instant;

use bevy::prelude::*;
use bevy::render::view::NoFrustumCulling;

use super::batched::{BatchedMesh, GeometryId};
use super::builder::{build_aggregate, BuildError, RenderAggregate};
use super::components::{AggregateRoot, BatchSlots, BatchedSlot};
use super::resources::{
    ActiveAggregate, AggregateStats, ChangeEffect, DemoSettings, DisplayFlagsChanged, RebuildRequested,
    SettingsChange,
};
use super::sampler::TransformSampler;
use crate::setup::MainCamera;

pub fn request_initial_build(mut rebuild: EventWriter<RebuildRequested>) {
    rebuild.write(RebuildRequested);
}

/// Fold control requests into `DemoSettings` and fan out what they imply.
pub fn apply_settings_changes(
    mut changes: EventReader<SettingsChange>,
    mut settings: ResMut<DemoSettings>,
    mut rebuild: EventWriter<RebuildRequested>,
    mut flags: EventWriter<DisplayFlagsChanged>,
) {
    for change in changes.read() {
        match settings.apply(*change) {
            ChangeEffect::None => {}
            ChangeEffect::Rebuild => {
                debug!("{change:?} -> rebuild");
                rebuild.write(RebuildRequested);
            }
            ChangeEffect::DisplayFlags => {
                debug!("{change:?} -> display flags");
                flags.write(DisplayFlagsChanged);
            }
        }
    }
}

/// Replace the current aggregate. Several requests in one frame collapse into
/// a single rebuild with the latest settings.
pub fn rebuild_aggregate(
    mut commands: Commands,
    mut requests: EventReader<RebuildRequested>,
    settings: Res<DemoSettings>,
    mut sampler: ResMut<TransformSampler>,
    mut active: ResMut<ActiveAggregate>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if requests.is_empty() {
        return;
    }
    requests.clear();

    // 1) Old aggregate goes first, assets included.
    release_aggregate(&mut commands, &mut active, &mut meshes, &mut materials);

    // 2) Build on the CPU.
    let started = Instant::now();
    let aggregate = match build_aggregate(settings.method, settings.count, &mut sampler) {
        Ok(a) => a,
        Err(e) => {
            error!("Failed to build {} aggregate of {}: {e}", settings.method, settings.count);
            return;
        }
    };

    // 3) Hand it to the scene.
    let mut stats = AggregateStats {
        method: aggregate.method(),
        instance_count: aggregate.instance_count(),
        vertex_count: aggregate.vertex_count(),
        ..default()
    };
    let material = materials.add(StandardMaterial {
        base_color: Color::WHITE,
        perceptual_roughness: 0.6,
        ..default()
    });

    let spawned = match aggregate {
        RenderAggregate::Batched(mut batch) => {
            batch.sort_objects = settings.sort_objects;
            batch.per_object_frustum_culled = settings.per_object_frustum_culled;
            spawn_batched(&mut commands, batch, &material, &mut meshes)
        }
        RenderAggregate::Merged { mesh, .. } => {
            let handle = meshes.add(mesh);
            let entity = commands
                .spawn((
                    AggregateRoot,
                    Name::new("Merged aggregate"),
                    Mesh3d(handle.clone()),
                    MeshMaterial3d(material.clone()),
                    Transform::default(),
                ))
                .id();
            Ok((entity, vec![handle]))
        }
    };

    match spawned {
        Ok((entity, handles)) => {
            stats.mesh_count = handles.len();
            stats.build_time = started.elapsed();
            info!(
                "Built {} aggregate: {} instances, {} vertices, {} mesh(es) in {:.1?}",
                stats.method, stats.instance_count, stats.vertex_count, stats.mesh_count, stats.build_time
            );
            active.entity = Some(entity);
            active.meshes = handles;
            active.material = Some(material);
            active.stats = Some(stats);
        }
        Err(e) => {
            error!("Failed to spawn {} aggregate: {e}", stats.method);
            materials.remove(&material);
        }
    }
}

/// Despawn the aggregate hierarchy and drop its mesh/material assets right away
/// rather than waiting for handle refcounts.
pub fn release_aggregate(
    commands: &mut Commands,
    active: &mut ActiveAggregate,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
) {
    if let Some(entity) = active.entity.take() {
        if let Ok(mut ec) = commands.get_entity(entity) {
            ec.despawn();
        }
    }
    for handle in active.meshes.drain(..) {
        meshes.remove(&handle);
    }
    if let Some(material) = active.material.take() {
        materials.remove(&material);
    }
    active.stats = None;
}

/// One mesh asset per geometry; one slot entity per instance, all slots of a
/// geometry sharing that mesh and the material so they batch into one draw.
fn spawn_batched(
    commands: &mut Commands,
    batch: BatchedMesh,
    material: &Handle<StandardMaterial>,
    meshes: &mut Assets<Mesh>,
) -> Result<(Entity, Vec<Handle<Mesh>>), BuildError> {
    let handles: Vec<Handle<Mesh>> = (0..batch.geometry_count())
        .map(|g| batch.geometry_mesh(GeometryId(g as u32)).map(|m| meshes.add(m)))
        .collect::<Result<_, _>>()?;

    let root = commands
        .spawn((
            AggregateRoot,
            Name::new("Batched aggregate"),
            Transform::default(),
            Visibility::default(),
        ))
        .id();

    let mut by_geometry: Vec<Vec<Entity>> = batch
        .bucket_sizes()
        .into_iter()
        .map(Vec::with_capacity)
        .collect();
    for (_, inst) in batch.instances() {
        let g = inst.geometry.0 as usize;
        let slot = commands
            .spawn((
                BatchedSlot { geometry: inst.geometry },
                Mesh3d(handles[g].clone()),
                MeshMaterial3d(material.clone()),
                inst.transform,
                ChildOf(root),
            ))
            .id();
        by_geometry[g].push(slot);
    }

    debug!(
        "Batched capacity: {}/{} vertices, {}/{} indices",
        batch.vertices_used(),
        batch.max_vertices(),
        batch.indices_used(),
        batch.max_indices()
    );
    let whole_culled = batch.frustum_culled;
    let mut root_cmds = commands.entity(root);
    root_cmds.insert((batch, BatchSlots { by_geometry, ..default() }));
    if !whole_culled {
        root_cmds.insert(NoFrustumCulling);
    }
    Ok((root, handles))
}

/// Push the display flags onto every batched container in the scene.
pub fn push_display_flags(
    mut events: EventReader<DisplayFlagsChanged>,
    settings: Res<DemoSettings>,
    mut batches: Query<&mut BatchedMesh>,
) {
    if events.is_empty() {
        return;
    }
    events.clear();
    for mut batch in &mut batches {
        batch.sort_objects = settings.sort_objects;
        batch.per_object_frustum_culled = settings.per_object_frustum_culled;
    }
}

/// Per-instance culling is Bevy's own AABB test on each slot; turning it off
/// means tagging every slot with `NoFrustumCulling`.
pub fn sync_slot_culling(
    mut commands: Commands,
    mut roots: Query<(&BatchedMesh, &mut BatchSlots), Changed<BatchedMesh>>,
) {
    for (batch, mut slots) in &mut roots {
        let want = batch.per_object_frustum_culled;
        if slots.culling_applied == Some(want) {
            continue;
        }
        for &slot in slots.by_geometry.iter().flatten() {
            if want {
                commands.entity(slot).remove::<NoFrustumCulling>();
            } else {
                commands.entity(slot).insert(NoFrustumCulling);
            }
        }
        slots.culling_applied = Some(want);
    }
}

/// Reassign instance transforms to slots so that each geometry bucket is
/// submitted front-to-back. Runs when the camera or the container changes.
pub fn sort_batched_slots(
    camera: Query<Ref<GlobalTransform>, With<MainCamera>>,
    mut roots: Query<(Ref<BatchedMesh>, &mut BatchSlots)>,
    mut slots: Query<&mut Transform, With<BatchedSlot>>,
) {
    let Ok(cam) = camera.single() else { return; };
    let eye = cam.translation();

    for (batch, mut slot_set) in &mut roots {
        let dirty = cam.is_changed() || batch.is_changed();
        if !dirty || (!batch.sort_objects && !slot_set.sorted) {
            continue;
        }

        let order = batch.draw_order(Some(eye));
        for (bucket, entities) in order.iter().zip(&slot_set.by_geometry) {
            for (&id, &slot) in bucket.iter().zip(entities) {
                let (Ok(mut tf), Some(t)) = (slots.get_mut(slot), batch.transform_at(id)) else { continue; };
                tf.set_if_neq(t);
            }
        }
        slot_set.sorted = batch.sort_objects;
    }
}
