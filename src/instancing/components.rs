// src/instancing/components.rs

use bevy::prelude::*;

use super::batched::GeometryId;

/// Root entity of the generated aggregate. Exactly one exists at a time.
#[derive(Component)]
pub struct AggregateRoot;

/// Child of a batched aggregate that draws one instance.
#[derive(Component, Clone, Copy, Debug)]
pub struct BatchedSlot {
    pub geometry: GeometryId,
}

/// Slot entities of a batched aggregate, grouped by geometry
/// (outer index = `GeometryId.0`).
#[derive(Component, Default)]
pub struct BatchSlots {
    pub by_geometry: Vec<Vec<Entity>>,
    /// Value of `per_object_frustum_culled` last pushed onto the slots.
    pub culling_applied: Option<bool>,
    /// Whether slots currently hold a sorted order that must be undone.
    pub sorted: bool,
}
