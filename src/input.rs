use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::input::{keyboard::KeyCode, ButtonInput};
use bevy::prelude::*;

use crate::actions::ControlBindings;
use crate::instancing::SettingsChange;
use crate::setup::MainCamera;

pub const ROTATE_SPEED: f32 = 0.005; // radians per pixel dragged
pub const MIN_RADIUS: f32 = 2.0;
pub const MAX_RADIUS: f32 = 500.0;

#[derive(Component, Clone, Copy, Debug)]
pub struct CameraOrbit {
    pub focus: Vec3,
    pub radius: f32,
    pub yaw: f32,
    pub pitch: f32,
}

impl CameraOrbit {
    pub fn eye(&self) -> Vec3 {
        let xz_radius = self.radius * self.pitch.cos();
        self.focus
            + Vec3::new(
                xz_radius * self.yaw.cos(),
                self.radius * self.pitch.sin(),
                xz_radius * self.yaw.sin(),
            )
    }
}

/// Turn panel key presses into `SettingsChange` requests.
pub fn control_input_system(
    keys: Res<ButtonInput<KeyCode>>,
    bindings: Res<ControlBindings>,
    mut changes: EventWriter<SettingsChange>,
) {
    let fast = keys.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]);
    for key in keys.get_just_pressed() {
        if let Some(action) = bindings.action(*key) {
            changes.write(action.to_change(fast));
        }
    }
}

/// Orbit controls: left-drag rotates around the focus, wheel zooms.
pub fn camera_controller(
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut motion_evr: EventReader<MouseMotion>,
    mut scroll_evr: EventReader<MouseWheel>,
    mut query: Query<(&mut Transform, &mut CameraOrbit), With<MainCamera>>,
) {
    let Ok((mut tf, mut orbit)) = query.single_mut() else { return; };
    let before = *orbit;

    // 1) Zoom
    for ev in scroll_evr.read() {
        let amount = match ev.unit {
            MouseScrollUnit::Line => ev.y * 1.0,
            MouseScrollUnit::Pixel => ev.y * 0.02,
        };
        orbit.radius = (orbit.radius - amount).clamp(MIN_RADIUS, MAX_RADIUS);
    }

    // 2) Orbit
    if mouse_buttons.pressed(MouseButton::Left) {
        for ev in motion_evr.read() {
            orbit.yaw += ev.delta.x * ROTATE_SPEED;
            orbit.pitch += ev.delta.y * ROTATE_SPEED;
        }
    } else {
        motion_evr.clear();
    }

    orbit.pitch = orbit.pitch.clamp(
        -std::f32::consts::FRAC_PI_2 + 0.01,
        std::f32::consts::FRAC_PI_2 - 0.01,
    );

    // 3) Only touch the transform when something moved; sorting keys off it.
    if orbit.radius != before.radius || orbit.yaw != before.yaw || orbit.pitch != before.pitch {
        tf.translation = orbit.eye();
        tf.look_at(orbit.focus, Vec3::Y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_sits_on_the_orbit_sphere() {
        let orbit = CameraOrbit { focus: Vec3::ZERO, radius: 30.0, yaw: std::f32::consts::FRAC_PI_2, pitch: 0.0 };
        assert!(orbit.eye().abs_diff_eq(Vec3::new(0.0, 0.0, 30.0), 1e-4));

        let tilted = CameraOrbit { pitch: 0.7, yaw: 1.3, ..orbit };
        assert!((tilted.eye().length() - 30.0).abs() < 1e-3);
    }
}
