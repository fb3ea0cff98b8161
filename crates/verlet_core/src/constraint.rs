//! Distance constraints between particles of the same body.

use bevy::log::trace;

use crate::error::{PhysicsError, PhysicsResult};
use crate::particle::Particle;

/// Number of relaxation sweeps per step. One sweep visibly lets boxes sag,
/// two keep them rigid enough at interactive timesteps.
pub const CONSTRAINT_PASSES: usize = 2;

/// Below this length the direction between two particles is undefined.
const MIN_SEPARATION: f32 = 1e-6;

/// Keeps two particles at the distance they had when the constraint was made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    a: usize,
    b: usize,
    rest_length: f32,
}

impl Constraint {
    /// Connect particles `a` and `b` of `particles`, capturing their current
    /// distance as the rest length.
    pub fn new(particles: &[Particle], a: usize, b: usize) -> PhysicsResult<Self> {
        let rest_length = particles[a].position().distance(particles[b].position());
        if rest_length <= f32::EPSILON {
            return Err(PhysicsError::DegenerateConstraint { a, b });
        }
        Ok(Self { a, b, rest_length })
    }

    pub fn endpoints(&self) -> (usize, usize) {
        (self.a, self.b)
    }

    pub fn rest_length(&self) -> f32 {
        self.rest_length
    }

    /// Current distance between the endpoints.
    pub fn current_length(&self, particles: &[Particle]) -> f32 {
        particles[self.a]
            .position()
            .distance(particles[self.b].position())
    }

    /// Move both endpoints toward the rest length, each weighted by the
    /// other's share of the total mass.
    ///
    /// Coincident endpoints have no direction and are left alone.
    pub fn enforce(&self, particles: &mut [Particle]) {
        let pa = particles[self.a].position();
        let pb = particles[self.b].position();
        let d = pb - pa;
        let length = d.length();

        if length < MIN_SEPARATION {
            trace!(
                "constraint {}-{} skipped: endpoints coincide",
                self.a,
                self.b
            );
            return;
        }

        let dir = d / length;
        let delta = length - self.rest_length;
        let ma = particles[self.a].mass();
        let mb = particles[self.b].mass();
        let total = ma + mb;

        particles[self.a].set_position(pa + (mb / total) * delta * dir);
        particles[self.b].set_position(pb - (ma / total) * delta * dir);
    }
}

/// Run [`CONSTRAINT_PASSES`] sweeps over `constraints`.
pub fn relax(constraints: &[Constraint], particles: &mut [Particle]) {
    for _ in 0..CONSTRAINT_PASSES {
        for constraint in constraints {
            constraint.enforce(particles);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Vec3;

    fn particle(index: usize, position: Vec3, mass: f32) -> Particle {
        Particle::new(0, index, position, mass, 0.0, 100.0).unwrap()
    }

    #[test]
    fn test_rest_length_is_captured() {
        let particles = vec![
            particle(0, Vec3::ZERO, 1.0),
            particle(1, Vec3::new(3.0, 4.0, 0.0), 1.0),
        ];
        let c = Constraint::new(&particles, 0, 1).unwrap();
        assert_eq!(c.rest_length(), 5.0);
        assert_eq!(c.endpoints(), (0, 1));
    }

    #[test]
    fn test_zero_rest_length_is_rejected() {
        let particles = vec![
            particle(0, Vec3::ONE, 1.0),
            particle(1, Vec3::ONE, 1.0),
        ];
        assert_eq!(
            Constraint::new(&particles, 0, 1),
            Err(PhysicsError::DegenerateConstraint { a: 0, b: 1 })
        );
    }

    #[test]
    fn test_stretched_constraint_converges() {
        let mut particles = vec![
            particle(0, Vec3::ZERO, 1.0),
            particle(1, Vec3::new(1.0, 0.0, 0.0), 1.0),
        ];
        let c = Constraint::new(&particles, 0, 1).unwrap();
        particles[1].set_position(Vec3::new(1.6, 0.0, 0.0));

        let before = (c.current_length(&particles) - c.rest_length()).abs();
        relax(&[c], &mut particles);
        let after = (c.current_length(&particles) - c.rest_length()).abs();

        assert!(after < before, "error should shrink: {} -> {}", before, after);
        assert!(after < 1e-5, "two bodies, one constraint: exact, got {}", after);
    }

    #[test]
    fn test_compressed_constraint_pushes_apart() {
        let mut particles = vec![
            particle(0, Vec3::ZERO, 1.0),
            particle(1, Vec3::new(0.0, 2.0, 0.0), 1.0),
        ];
        let c = Constraint::new(&particles, 0, 1).unwrap();
        particles[1].set_position(Vec3::new(0.0, 1.0, 0.0));

        c.enforce(&mut particles);

        assert!(particles[0].position().y < 0.0);
        assert!(particles[1].position().y > 1.0);
        assert!((c.current_length(&particles) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_heavier_particle_moves_less() {
        let mut particles = vec![
            particle(0, Vec3::ZERO, 3.0),
            particle(1, Vec3::new(1.0, 0.0, 0.0), 1.0),
        ];
        let c = Constraint::new(&particles, 0, 1).unwrap();
        particles[1].set_position(Vec3::new(2.0, 0.0, 0.0));

        c.enforce(&mut particles);

        let moved_heavy = particles[0].position().x.abs();
        let moved_light = (particles[1].position().x - 2.0).abs();
        assert!(
            (moved_light - 3.0 * moved_heavy).abs() < 1e-5,
            "light should move 3x as far: heavy {}, light {}",
            moved_heavy,
            moved_light
        );
    }

    #[test]
    fn test_coincident_particles_do_not_produce_nan() {
        let mut particles = vec![
            particle(0, Vec3::ZERO, 1.0),
            particle(1, Vec3::X, 1.0),
        ];
        let c = Constraint::new(&particles, 0, 1).unwrap();
        particles[1].set_position(Vec3::ZERO);

        relax(&[c], &mut particles);

        assert_eq!(particles[0].position(), Vec3::ZERO);
        assert_eq!(particles[1].position(), Vec3::ZERO);
    }

    #[test]
    fn test_chain_moves_closer_without_overshoot() {
        let mut particles = vec![
            particle(0, Vec3::ZERO, 1.0),
            particle(1, Vec3::X, 1.0),
            particle(2, Vec3::new(2.0, 0.0, 0.0), 1.0),
        ];
        let constraints = [
            Constraint::new(&particles, 0, 1).unwrap(),
            Constraint::new(&particles, 1, 2).unwrap(),
        ];
        particles[2].set_position(Vec3::new(3.0, 0.0, 0.0));

        let total_error = |ps: &[Particle]| -> f32 {
            constraints
                .iter()
                .map(|c| (c.current_length(ps) - c.rest_length()).abs())
                .sum()
        };
        let before = total_error(&particles);
        relax(&constraints, &mut particles);
        let after = total_error(&particles);

        assert!(after < before, "error should shrink: {} -> {}", before, after);
        for c in &constraints {
            let stretch = c.current_length(&particles) - c.rest_length();
            assert!(stretch > -0.5, "overshoot past one step's delta: {}", stretch);
        }
    }
}
