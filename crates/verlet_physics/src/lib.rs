use bevy::prelude::*;
use verlet_core::{BodyHandle, EngineConfig};

/// Runs a [`verlet_core::World`] inside a Bevy app.
///
/// The world is stepped in `FixedUpdate` with the fixed timestep, and the
/// `Transform` of every entity carrying a [`BodyLink`] is copied from its body
/// in `Update`.
#[derive(Default)]
pub struct VerletPhysicsPlugin {
    pub config: EngineConfig,
}

impl Plugin for VerletPhysicsPlugin {
    fn build(&self, app: &mut App) {
        let world = match verlet_core::World::new(self.config.clone()) {
            Ok(world) => world,
            Err(e) => {
                error!("Invalid physics config ({}), falling back to defaults", e);
                verlet_core::World::default()
            }
        };
        info!(
            "Verlet physics: world_size {}, gravity {}, octree depth {}",
            world.config().world_size,
            world.config().gravity,
            world.config().octree_max_depth
        );

        app.insert_resource(PhysicsWorld(world))
            .add_systems(FixedUpdate, step_physics)
            .add_systems(Update, sync_transforms);
    }
}

/// The simulation, shared with the rest of the app.
#[derive(Resource, Deref, DerefMut)]
pub struct PhysicsWorld(pub verlet_core::World);

/// Links a Bevy entity to a physics body
#[derive(Component, Debug, Clone, Copy)]
pub struct BodyLink(pub BodyHandle);

fn step_physics(time: Res<Time<Fixed>>, mut physics: ResMut<PhysicsWorld>) {
    physics.step(time.delta_secs());
}

fn sync_transforms(physics: Res<PhysicsWorld>, mut query: Query<(&BodyLink, &mut Transform)>) {
    for (link, mut transform) in query.iter_mut() {
        if let Some(body) = physics.body(link.0) {
            transform.translation = body.center();
            transform.rotation = body.rotation();
        }
    }
}
