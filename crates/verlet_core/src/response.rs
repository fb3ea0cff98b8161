//! Corrective particle displacements produced by the narrow phase.
//!
//! Responses are collected for the whole step before any is applied. When
//! several land on the same particle they are averaged; the accumulator only
//! keeps a sum and a count per particle, so the result does not depend on the
//! order in which pairs were resolved.

use std::collections::HashMap;

use bevy::math::Vec3;

use crate::body::BodyId;

/// Order-independent identity of a pair of bodies: larger id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(pub BodyId, pub BodyId);

impl PairKey {
    pub fn new(a: BodyId, b: BodyId) -> Self {
        PairKey(a.max(b), a.min(b))
    }
}

/// A particle, addressed by owning body and index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleKey {
    pub body: BodyId,
    pub particle: usize,
}

impl ParticleKey {
    pub fn new(body: BodyId, particle: usize) -> Self {
        Self { body, particle }
    }
}

/// Move one particle by `position_delta`, and its previous position by
/// `last_position_delta` when present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Response {
    pub key: ParticleKey,
    pub position_delta: Vec3,
    pub last_position_delta: Option<Vec3>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    position_sum: Vec3,
    position_count: u32,
    last_sum: Vec3,
    last_count: u32,
}

/// Per-step response accumulator.
#[derive(Debug, Clone, Default)]
pub struct ResponseSet {
    entries: HashMap<ParticleKey, Accumulator>,
    pushed: usize,
}

impl ResponseSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, response: Response) {
        let acc = self.entries.entry(response.key).or_default();
        acc.position_sum += response.position_delta;
        acc.position_count += 1;
        if let Some(delta) = response.last_position_delta {
            acc.last_sum += delta;
            acc.last_count += 1;
        }
        self.pushed += 1;
    }

    /// Number of distinct particles with a pending response.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of responses pushed since the last clear, before merging.
    pub fn pushed(&self) -> usize {
        self.pushed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pushed = 0;
    }

    /// One averaged response per particle.
    pub fn merged(&self) -> impl Iterator<Item = Response> + '_ {
        self.entries.iter().map(|(key, acc)| Response {
            key: *key,
            position_delta: acc.position_sum / acc.position_count as f32,
            last_position_delta: (acc.last_count > 0).then(|| acc.last_sum / acc.last_count as f32),
        })
    }
}
