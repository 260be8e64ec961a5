use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use bevy::render::RenderPlugin;
use bevy::window::WindowResolution;

mod actions;
mod config;
mod input;
mod instancing;
mod setup;
mod ui;

use actions::ControlBindings;
use input::{camera_controller, control_input_system};
use instancing::sampler::TransformSampler;
use instancing::{InstancingPlugin, InstancingSet};
use ui::{spawn_overlay, update_control_panel, update_stats};

fn main() {
    // Config is read before the app exists: the backend choice feeds RenderPlugin.
    let (config, source) = config::load_from_args();

    App::new()
        .add_plugins(
            DefaultPlugins
                .set(RenderPlugin {
                    render_creation: config.wgpu_settings().into(),
                    ..default()
                })
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: format!("{} ({})", config.title, config.backend.label()),
                        resolution: WindowResolution::new(1280.0, 720.0),
                        ..default()
                    }),
                    ..default()
                }),
        )
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .insert_resource(ClearColor(Color::BLACK))
        // settings + sampler from the config, picked up by InstancingPlugin
        .insert_resource(config.settings)
        .insert_resource(TransformSampler::new(config.seed))
        .insert_resource(config)
        .insert_resource(source)
        .init_resource::<ControlBindings>()
        .add_plugins(InstancingPlugin)
        .add_systems(Startup, (config::log_config_source, setup::setup, spawn_overlay))
        .add_systems(
            Update,
            (
                control_input_system.in_set(InstancingSet::Input),
                camera_controller,
                update_control_panel.after(InstancingSet::Rebuild),
                update_stats.after(InstancingSet::Rebuild),
            ),
        )
        .run();
}
