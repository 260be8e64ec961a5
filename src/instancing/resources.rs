// src/instancing/resources.rs

use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::builder::MAX_INSTANCE_COUNT;
use super::method::Method;

/// Increment of the instance-count control.
pub const COUNT_STEP: i64 = 100;

/// Live parameters of the demo. Only `apply_settings_changes` mutates this;
/// everything else asks for a change with a `SettingsChange` event.
#[derive(Resource, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    pub count: usize,
    pub method: Method,
    /// Batched only.
    pub sort_objects: bool,
    /// Batched only.
    pub per_object_frustum_culled: bool,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            count: MAX_INSTANCE_COUNT,
            method: Method::Batched,
            sort_objects: true,
            per_object_frustum_culled: true,
        }
    }
}

impl DemoSettings {
    pub fn clamp_count(count: i64) -> usize {
        count.clamp(1, MAX_INSTANCE_COUNT as i64) as usize
    }

    /// Apply one change; returns what the scene has to do about it.
    pub fn apply(&mut self, change: SettingsChange) -> ChangeEffect {
        match change {
            SettingsChange::AdjustCount(delta) => {
                self.set_count(Self::clamp_count(self.count as i64 + delta))
            }
            SettingsChange::ToggleMethod => {
                self.method = self.method.toggled();
                ChangeEffect::Rebuild
            }
            SettingsChange::ToggleSortObjects => {
                self.sort_objects = !self.sort_objects;
                ChangeEffect::DisplayFlags
            }
            SettingsChange::TogglePerObjectFrustumCulled => {
                self.per_object_frustum_culled = !self.per_object_frustum_culled;
                ChangeEffect::DisplayFlags
            }
            SettingsChange::Regenerate => ChangeEffect::Rebuild,
        }
    }

    fn set_count(&mut self, count: usize) -> ChangeEffect {
        if count == self.count {
            return ChangeEffect::None;
        }
        self.count = count;
        ChangeEffect::Rebuild
    }
}

/// Requests coming from the control surface.
#[derive(Event, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsChange {
    AdjustCount(i64),
    ToggleMethod,
    ToggleSortObjects,
    TogglePerObjectFrustumCulled,
    /// Same parameters, new random layout.
    Regenerate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeEffect {
    None,
    Rebuild,
    DisplayFlags,
}

/// Throw away the current aggregate and build a new one from `DemoSettings`.
#[derive(Event, Clone, Copy, Debug, Default)]
pub struct RebuildRequested;

/// Push `DemoSettings` display flags onto every batched container.
#[derive(Event, Clone, Copy, Debug, Default)]
pub struct DisplayFlagsChanged;

/// Numbers shown in the stats overlay.
#[derive(Clone, Copy, Debug, Default)]
pub struct AggregateStats {
    pub method: Method,
    pub instance_count: usize,
    pub vertex_count: usize,
    /// Mesh assets the aggregate draws from.
    pub mesh_count: usize,
    pub build_time: Duration,
}

/// The one aggregate currently in the scene and the assets it owns.
#[derive(Resource, Default)]
pub struct ActiveAggregate {
    pub entity: Option<Entity>,
    pub meshes: Vec<Handle<Mesh>>,
    pub material: Option<Handle<StandardMaterial>>,
    pub stats: Option<AggregateStats>,
}
