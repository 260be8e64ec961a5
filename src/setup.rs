use bevy::prelude::*;
use crate::config::DemoConfig;
use crate::input::CameraOrbit;

#[derive(Component)]
pub struct MainCamera;

pub fn setup(
    mut commands: Commands,
    config: Res<DemoConfig>,
) {
    // 1) Light
    commands.spawn((
        DirectionalLight {
            illuminance: 8_000.0,
            ..default()
        },
        Transform::from_xyz(4.0, 8.0, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    // 2) Camera: 75° fov, looking at the centre of the instance cube
    let orbit = CameraOrbit {
        focus: Vec3::ZERO,
        radius: config.camera_distance,
        yaw: std::f32::consts::FRAC_PI_2,
        pitch: 0.0,
    };
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: 75f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            ..default()
        }),
        Transform::from_translation(orbit.eye()).looking_at(orbit.focus, Vec3::Y),
        MainCamera,
        orbit,
    ));
}
