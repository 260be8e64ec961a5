// src/instancing/plugin.rs
//! Instancing plugin wiring: settings, change events, rebuild and the
//! batched-container upkeep systems.

use bevy::prelude::*;

use super::resources::{ActiveAggregate, DemoSettings, DisplayFlagsChanged, RebuildRequested, SettingsChange};
use super::sampler::TransformSampler;
use super::systems::{
    apply_settings_changes, push_display_flags, rebuild_aggregate, request_initial_build, sort_batched_slots,
    sync_slot_culling,
};

/// Frame ordering: controls emit changes, changes turn into a rebuild,
/// then the batched container is brought in line with its flags.
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum InstancingSet {
    Input,
    Rebuild,
    Sync,
}

pub struct InstancingPlugin;

impl Plugin for InstancingPlugin {
    fn build(&self, app: &mut App) {
        app
            // keep values inserted by main from the config file
            .init_resource::<DemoSettings>()
            .init_resource::<TransformSampler>()
            .init_resource::<ActiveAggregate>()
            .add_event::<SettingsChange>()
            .add_event::<RebuildRequested>()
            .add_event::<DisplayFlagsChanged>()
            .configure_sets(
                Update,
                (InstancingSet::Input, InstancingSet::Rebuild, InstancingSet::Sync).chain(),
            )
            .add_systems(Startup, request_initial_build)
            .add_systems(
                Update,
                (apply_settings_changes, rebuild_aggregate)
                    .chain()
                    .in_set(InstancingSet::Rebuild),
            )
            .add_systems(
                Update,
                (push_display_flags, sync_slot_culling, sort_batched_slots)
                    .chain()
                    .in_set(InstancingSet::Sync),
            );
    }
}
