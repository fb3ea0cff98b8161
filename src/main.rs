use std::time::Duration;

use bevy::log::LogPlugin;
use bevy::prelude::*;
use verlet_core::{BodyDesc, EngineConfig};
use verlet_physics::{BodyLink, PhysicsWorld, VerletPhysicsPlugin};

/// How long the headless run lasts.
const RUN_FRAMES: u32 = 600;
const FRAME_TIME: Duration = Duration::from_micros(16_667);

fn main() {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins).add_plugins(LogPlugin::default());

    // Optional engine config as the first argument.
    let config = match std::env::args().nth(1) {
        Some(path) => match EngineConfig::load_json(&path) {
            Ok(config) => {
                info!("Loaded physics config from {}", path);
                config
            }
            Err(e) => {
                error!("Failed to load {}: {}; using defaults", path, e);
                EngineConfig::default()
            }
        },
        None => EngineConfig::default(),
    };

    app.add_plugins(VerletPhysicsPlugin { config })
        .add_systems(Startup, setup)
        .add_systems(Update, report_bodies);

    app.finish();
    app.cleanup();

    for _ in 0..RUN_FRAMES {
        app.update();
        std::thread::sleep(FRAME_TIME);
    }

    let physics = app.world().resource::<PhysicsWorld>();
    info!(
        "Finished: {} bodies, last step resolved {} pairs",
        physics.body_count(),
        physics.last_report().resolved_pairs
    );
}

fn setup(mut commands: Commands, mut physics: ResMut<PhysicsWorld>) {
    let mut spawn = |name: &str, desc: BodyDesc| match physics.add_body(desc) {
        Ok(handle) => {
            commands.spawn((Name::new(name.to_string()), Transform::default(), BodyLink(handle)));
            Some(handle)
        }
        Err(e) => {
            error!("Could not add {}: {}", name, e);
            None
        }
    };

    // Static platform
    spawn(
        "platform",
        BodyDesc {
            is_kinematic: true,
            use_gravity: false,
            color: [0.3, 0.5, 0.3],
            ..BodyDesc::cuboid(Vec3::new(0.0, -4.0, 0.0), Vec3::new(4.0, 0.5, 4.0))
        },
    );

    // A loose stack of crates, each slightly twisted
    for i in 0..4 {
        spawn(
            &format!("crate_{}", i),
            BodyDesc {
                rotation: Quat::from_rotation_y(0.2 * i as f32),
                mass: 2.0,
                color: [0.8, 0.2, 0.2],
                ..BodyDesc::cuboid(
                    Vec3::new(0.1 * i as f32, -2.5 + 1.2 * i as f32, 0.0),
                    Vec3::splat(0.5),
                )
            },
        );
    }

    // Two balls on a collision course
    let left = spawn(
        "ball_left",
        BodyDesc {
            color: [0.2, 0.4, 0.9],
            ..BodyDesc::ball(Vec3::new(-5.0, 6.0, 3.0), 0.6)
        },
    );
    spawn(
        "ball_right",
        BodyDesc {
            color: [0.9, 0.7, 0.2],
            ..BodyDesc::ball(Vec3::new(5.0, 6.0, 3.0), 0.6)
        },
    );
    if let Some(left) = left {
        physics.apply_force(left, Vec3::new(600.0, 0.0, 0.0));
    }
}

fn report_bodies(
    mut frame: Local<u32>,
    physics: Res<PhysicsWorld>,
    query: Query<(&Name, &Transform), With<BodyLink>>,
) {
    *frame += 1;
    if *frame % 60 != 0 {
        return;
    }

    for (name, transform) in query.iter() {
        info!("{:>10}: {:?}", name.as_str(), transform.translation);
    }
    let report = physics.last_report();
    info!(
        "frame {}: {} candidate leaves, {} tests, {} pairs resolved",
        *frame, report.candidate_leaves, report.narrow_phase_tests, report.resolved_pairs
    );
}
