use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy::ui::BackgroundColor;

use crate::actions::{ControlAction, ControlBindings};
use crate::config::DemoConfig;
use crate::instancing::builder::MAX_INSTANCE_COUNT;
use crate::instancing::{ActiveAggregate, DemoSettings, Method};

#[derive(Component)]
pub struct ControlPanelText;

#[derive(Component)]
pub struct StatsText;

fn panel_node(left: bool) -> (Node, BackgroundColor) {
    let mut node = Node {
        position_type: PositionType::Absolute,
        top: Val::Px(8.0),
        padding: UiRect::all(Val::Px(8.0)),
        flex_direction: FlexDirection::Column,
        ..default()
    };
    if left {
        node.left = Val::Px(8.0);
    } else {
        node.right = Val::Px(8.0);
    }
    (node, BackgroundColor(Color::linear_rgba(0.0, 0.0, 0.0, 0.6)))
}

pub fn spawn_overlay(mut commands: Commands) {
    let font = TextFont { font_size: 16.0, ..default() };

    // Stats, top left
    commands.spawn(panel_node(true)).with_children(|parent| {
        parent.spawn((Text::new(""), font.clone(), TextColor(Color::srgb(0.4, 1.0, 0.4)), StatsText));
    });

    // Controls, top right
    commands.spawn(panel_node(false)).with_children(|parent| {
        parent.spawn((Text::new(""), font, TextColor(Color::WHITE), ControlPanelText));
    });
}

fn key_label(bindings: &ControlBindings, action: ControlAction) -> String {
    match bindings.key_for(action) {
        Some(key) => format!("{key:?}").trim_start_matches("Key").to_string(),
        None => "-".to_string(),
    }
}

/// Both methods, the active one bracketed: `<BATCHED> MERGED`.
fn method_choices(active: Method) -> String {
    Method::ALL
        .iter()
        .map(|m| if *m == active { format!("<{m}>") } else { m.to_string() })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn control_panel_lines(settings: &DemoSettings, bindings: &ControlBindings) -> Vec<String> {
    let on_off = |b: bool| if b { "on" } else { "off" };
    vec![
        format!(
            "count        {:>7}  [{}/{}, Shift x100]  (1..{})",
            settings.count,
            key_label(bindings, ControlAction::CountUp),
            key_label(bindings, ControlAction::CountDown),
            MAX_INSTANCE_COUNT
        ),
        format!("method  {}  [{}]", method_choices(settings.method), key_label(bindings, ControlAction::ToggleMethod)),
        format!(
            "sortObjects  {:>7}  [{}]",
            on_off(settings.sort_objects),
            key_label(bindings, ControlAction::ToggleSortObjects)
        ),
        format!(
            "perObjectFrustumCulled {:>3}  [{}]",
            on_off(settings.per_object_frustum_culled),
            key_label(bindings, ControlAction::TogglePerObjectFrustumCulled)
        ),
        format!("regenerate          [{}]", key_label(bindings, ControlAction::Regenerate)),
    ]
}

pub fn update_control_panel(
    settings: Res<DemoSettings>,
    bindings: Res<ControlBindings>,
    mut q: Query<&mut Text, With<ControlPanelText>>,
) {
    if !settings.is_changed() {
        return;
    }
    for mut text in &mut q {
        **text = control_panel_lines(&settings, &bindings).join("\n");
    }
}

pub fn update_stats(
    diagnostics: Res<DiagnosticsStore>,
    active: Res<ActiveAggregate>,
    config: Res<DemoConfig>,
    mut q: Query<&mut Text, With<StatsText>>,
) {
    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|d| d.smoothed())
        .unwrap_or(0.0);
    let frame_ms = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FRAME_TIME)
        .and_then(|d| d.smoothed())
        .unwrap_or(0.0);

    let mut lines = vec![format!("{} | {:.0} fps | {:.2} ms", config.backend.label(), fps, frame_ms)];
    match active.stats {
        Some(s) => {
            lines.push(format!("{} x {}", s.method, s.instance_count));
            lines.push(format!("{} vertices in {} mesh(es)", s.vertex_count, s.mesh_count));
            lines.push(format!("built in {:.1?}", s.build_time));
        }
        None => lines.push("no aggregate".to_string()),
    }

    for mut text in &mut q {
        **text = lines.join("\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_shows_current_values_and_keys() {
        let settings = DemoSettings { count: 1200, method: Method::Merged, sort_objects: false, ..default() };
        let lines = control_panel_lines(&settings, &ControlBindings::default());
        assert!(lines[0].contains("1200"));
        assert!(lines[1].contains("BATCHED <MERGED>") && lines[1].contains("[M]"));
        assert!(lines[2].contains("off") && lines[2].contains("[S]"));
        assert!(lines[3].contains("on"));
    }
}
