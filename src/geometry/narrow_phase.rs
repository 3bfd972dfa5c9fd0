//! The narrow-phase: computes contact manifolds for the collider pairs
//! surviving the broad-phase, keeps per-pair state alive across timesteps
//! to warm-start the solver, and emits contact events.

use std::collections::{HashMap, HashSet};

use crate::dynamics::{CoefficientCombineRule, IntegrationParameters, JointSet, RigidBodySet};
use crate::geometry::contact_manifold::{build_manifold, ContactId, ManifoldPoint};
use crate::geometry::contact_pair::SolverFlags;
use crate::geometry::link_filter::filter_link_contact;
use crate::geometry::{
    ColliderHandle, ColliderPair, ColliderSet, ContactManifold, ContactPair, Epa, Gjk, Shape,
};
use crate::math::{Isometry, Point, Real};
use crate::pipeline::{EventHandler, PairFilterContext, PhysicsHooks, PhysicsHooksFlags};

/// A contact event emitted by the narrow-phase.
///
/// Events are buffered during the step and dispatched once the solver has
/// released its borrows of the world, so handlers observe a consistent
/// state and cannot reenter the stepping code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContactEvent {
    /// Two colliders started touching this step.
    Began(ColliderPair),
    /// Two colliders kept touching since the previous step.
    Persisted(ColliderPair),
    /// Two colliders stopped touching, or their pair was removed while
    /// touching.
    Ended(ColliderPair),
}

// The narrow-phase algorithm selected for a pair of shapes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PairAlgorithm {
    CircleCircle,
    GjkEpa,
}

// A type-filtered chain: the first entry whose filter accepts the shape
// pair wins. This is the seam allowing a shape pair class to be re-routed
// to a dedicated algorithm (curved shapes cannot go through clipping-only
// paths, so the general fallback is GJK + EPA).
struct AlgorithmChain {
    entries: Vec<(fn(&Shape, &Shape) -> bool, PairAlgorithm)>,
}

impl Default for AlgorithmChain {
    fn default() -> Self {
        fn both_circles(s1: &Shape, s2: &Shape) -> bool {
            matches!((s1, s2), (Shape::Circle(_), Shape::Circle(_)))
        }
        fn any(_: &Shape, _: &Shape) -> bool {
            true
        }

        Self {
            entries: vec![
                (both_circles, PairAlgorithm::CircleCircle),
                (any, PairAlgorithm::GjkEpa),
            ],
        }
    }
}

impl AlgorithmChain {
    fn select(&self, s1: &Shape, s2: &Shape) -> PairAlgorithm {
        for (filter, algorithm) in &self.entries {
            if filter(s1, s2) {
                return *algorithm;
            }
        }
        PairAlgorithm::GjkEpa
    }
}

/// The narrow-phase, owning the persistent contact state of every collider
/// pair.
pub struct NarrowPhase {
    pairs: HashMap<ColliderPair, ContactPair>,
    pairs_per_collider: HashMap<ColliderHandle, Vec<ColliderPair>>,
    chain: AlgorithmChain,
    events: Vec<ContactEvent>,
}

impl NarrowPhase {
    /// Creates a new empty narrow-phase.
    pub fn new() -> Self {
        Self {
            pairs: HashMap::new(),
            pairs_per_collider: HashMap::new(),
            chain: AlgorithmChain::default(),
            events: Vec::new(),
        }
    }

    /// The persistent state of the given collider pair, if it is active.
    pub fn contact_pair(&self, pair: ColliderPair) -> Option<&ContactPair> {
        self.pairs.get(&pair)
    }

    /// Iterates through all the active contact pairs.
    pub fn contact_pairs(&self) -> impl Iterator<Item = &ContactPair> {
        self.pairs.values()
    }

    pub(crate) fn contact_pairs_mut(&mut self) -> impl Iterator<Item = &mut ContactPair> {
        self.pairs.values_mut()
    }

    /// Iterates through the contact pairs involving the given collider.
    pub fn contacts_with(
        &self,
        collider: ColliderHandle,
    ) -> impl Iterator<Item = &ContactPair> + '_ {
        self.pairs_per_collider
            .get(&collider)
            .into_iter()
            .flatten()
            .filter_map(move |pair| self.pairs.get(pair))
    }

    /// Are these two colliders touching this step?
    pub fn is_in_contact(&self, collider1: ColliderHandle, collider2: ColliderHandle) -> bool {
        self.pairs
            .get(&ColliderPair::new(collider1, collider2))
            .map(|pair| pair.is_touching)
            .unwrap_or(false)
    }

    /// Synchronizes the set of active pairs with the candidates reported by
    /// the broad-phase: registers the new pairs and removes the vanished
    /// ones, emitting `Ended` events for pairs removed while touching.
    pub fn register_pairs(
        &mut self,
        broad_phase_pairs: &[ColliderPair],
        colliders: &ColliderSet,
    ) {
        let candidates: HashSet<ColliderPair> = broad_phase_pairs.iter().copied().collect();

        let events = &mut self.events;
        let pairs_per_collider = &mut self.pairs_per_collider;
        self.pairs.retain(|key, pair| {
            let keep = candidates.contains(key)
                && colliders.contains(key.collider1)
                && colliders.contains(key.collider2);
            if !keep {
                if pair.is_touching {
                    events.push(ContactEvent::Ended(*key));
                }
                for collider in &[key.collider1, key.collider2] {
                    if let Some(list) = pairs_per_collider.get_mut(collider) {
                        list.retain(|p| p != key);
                    }
                }
            }
            keep
        });

        for key in broad_phase_pairs {
            if self.pairs.contains_key(key) {
                continue;
            }
            let (c1, c2) = match (colliders.get(key.collider1), colliders.get(key.collider2)) {
                (Some(c1), Some(c2)) => (c1, c2),
                _ => continue,
            };
            if key.collider1 == key.collider2 {
                continue;
            }

            self.pairs
                .insert(*key, ContactPair::new(*key, c1.parent, c2.parent));
            self.pairs_per_collider
                .entry(key.collider1)
                .or_default()
                .push(*key);
            self.pairs_per_collider
                .entry(key.collider2)
                .or_default()
                .push(*key);
        }
    }

    /// Computes the contact manifold of every active pair, warm-starting
    /// new manifold points from the previous step's impulses and buffering
    /// begin/persist/end events.
    pub fn compute_contacts(
        &mut self,
        params: &IntegrationParameters,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        joints: &JointSet,
        hooks: &dyn PhysicsHooks,
    ) {
        let gjk = Gjk::new(params.gjk_max_iterations, params.gjk_distance_epsilon);
        let epa = Epa::new(params.epa_max_iterations, params.epa_distance_epsilon);

        for (key, pair) in self.pairs.iter_mut() {
            let (c1, c2) = match (colliders.get(key.collider1), colliders.get(key.collider2)) {
                (Some(c1), Some(c2)) => (c1, c2),
                // Vanished colliders are swept out by `register_pairs`.
                _ => continue,
            };
            let (rb1, rb2) = match (bodies.get(pair.body1), bodies.get(pair.body2)) {
                (Some(rb1), Some(rb2)) => (rb1, rb2),
                _ => continue,
            };

            let was_touching = pair.is_touching;
            let end_contact = |pair: &mut ContactPair, events: &mut Vec<ContactEvent>| {
                pair.manifold.clear();
                pair.is_touching = false;
                if was_touching {
                    events.push(ContactEvent::Ended(*key));
                }
            };

            // Default filtering: two non-dynamic bodies never collide, and
            // bodies joined by joints collide only if a joint allows it.
            if !rb1.is_dynamic() && !rb2.is_dynamic() {
                end_contact(pair, &mut self.events);
                continue;
            }
            if !c1.collision_groups.test(c2.collision_groups) {
                end_contact(pair, &mut self.events);
                continue;
            }
            if joints.is_joined(pair.body1, pair.body2)
                && !joints.joint_collision_allowed(pair.body1, pair.body2)
            {
                end_contact(pair, &mut self.events);
                continue;
            }

            // The contact-pair filter hook may veto the pair or adjust its
            // solver flags.
            pair.enabled = true;
            pair.solver_flags = SolverFlags::COMPUTE_IMPULSES;
            if hooks
                .active_hooks()
                .contains(PhysicsHooksFlags::FILTER_CONTACT_PAIR)
            {
                let context = PairFilterContext {
                    rigid_body1: rb1,
                    rigid_body2: rb2,
                    collider_handle1: key.collider1,
                    collider_handle2: key.collider2,
                    collider1: c1,
                    collider2: c2,
                };
                match hooks.filter_contact_pair(&context) {
                    Some(flags) => pair.solver_flags = flags,
                    None => {
                        pair.enabled = false;
                        end_contact(pair, &mut self.events);
                        continue;
                    }
                }
            }

            pair.is_sensor = c1.is_sensor() || c2.is_sensor();

            let new_manifold = compute_pair_manifold(
                &self.chain,
                &gjk,
                &epa,
                c1.shape(),
                &c1.position,
                c2.shape(),
                &c2.position,
            );

            match new_manifold {
                Some(mut manifold) => {
                    // Warm start: copy the impulses of the points whose
                    // feature pair survived from the previous step.
                    for point in &mut manifold.points {
                        if let Some(old) = pair
                            .manifold
                            .points
                            .iter()
                            .find(|old| old.id == point.id)
                        {
                            point.data = old.data;
                        }
                    }

                    pair.manifold = manifold;
                    pair.friction = CoefficientCombineRule::combine(
                        c1.friction,
                        c2.friction,
                        c1.friction_combine_rule,
                        c2.friction_combine_rule,
                    );
                    pair.restitution = CoefficientCombineRule::combine(
                        c1.restitution,
                        c2.restitution,
                        c1.restitution_combine_rule,
                        c2.restitution_combine_rule,
                    );
                    pair.restitution_velocity =
                        c1.restitution_velocity.min(c2.restitution_velocity);
                    pair.is_touching = true;

                    if was_touching {
                        self.events.push(ContactEvent::Persisted(*key));
                    } else {
                        self.events.push(ContactEvent::Began(*key));
                    }
                }
                None => end_contact(pair, &mut self.events),
            }
        }
    }

    /// Dispatches the buffered events of this step to the given handler, in
    /// emission order.
    pub fn flush_events(&mut self, handler: &dyn EventHandler) {
        for event in self.events.drain(..) {
            handler.handle_contact_event(event);
        }
    }

    /// Translates all the cached world-space contact data by the given
    /// shift. Depths, normals and impulses are unchanged.
    pub fn shift(&mut self, shift: &crate::math::Vector<Real>) {
        for pair in self.pairs.values_mut() {
            for point in &mut pair.manifold.points {
                point.point += *shift;
            }
        }
    }
}

impl Default for NarrowPhase {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_pair_manifold(
    chain: &AlgorithmChain,
    gjk: &Gjk,
    epa: &Epa,
    shape1: &Shape,
    pos1: &Isometry<Real>,
    shape2: &Shape,
    pos2: &Isometry<Real>,
) -> Option<ContactManifold> {
    let mut manifold = match chain.select(shape1, shape2) {
        PairAlgorithm::CircleCircle => circle_circle_manifold(shape1, pos1, shape2, pos2)?,
        PairAlgorithm::GjkEpa => {
            let simplex = gjk.intersect(shape1, pos1, shape2, pos2)?;
            let penetration = epa.penetration(shape1, pos1, shape2, pos2, &simplex);
            build_manifold(shape1, pos1, shape2, pos2, &penetration)?
        }
    };

    // Chain links are one-sided and their internal vertices must not
    // produce ejecting normals.
    if let Shape::Link(link) = shape1 {
        filter_link_contact(link, pos1, true, &mut manifold);
    }
    if let Shape::Link(link) = shape2 {
        filter_link_contact(link, pos2, false, &mut manifold);
    }
    if manifold.normal.norm_squared() < 1.0e-12 {
        return None;
    }

    Some(manifold)
}

fn circle_circle_manifold(
    shape1: &Shape,
    pos1: &Isometry<Real>,
    shape2: &Shape,
    pos2: &Isometry<Real>,
) -> Option<ContactManifold> {
    let (r1, r2) = match (shape1, shape2) {
        (Shape::Circle(c1), Shape::Circle(c2)) => (c1.radius, c2.radius),
        _ => return None,
    };

    let c1 = Point::from(pos1.translation.vector);
    let c2 = Point::from(pos2.translation.vector);
    let d = c2 - c1;
    let dist = d.norm();
    if dist > r1 + r2 {
        return None;
    }

    // Concentric circles have no meaningful normal: conservative no-contact.
    let normal = d.try_normalize(1.0e-9)?;
    let depth = r1 + r2 - dist;

    let mut manifold = ContactManifold {
        normal,
        points: Default::default(),
    };
    manifold.points.push(ManifoldPoint {
        id: ContactId {
            reference_edge: 0,
            incident_edge: 0,
            feature: ContactId::FEATURE_VERTEX,
            flipped: false,
        },
        point: c1 + normal * (r1 - depth / 2.0),
        depth,
        data: Default::default(),
    });

    Some(manifold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Circle;
    use approx::assert_relative_eq;

    #[test]
    fn circle_circle_fast_path_matches_closed_form() {
        let s1 = Shape::Circle(Circle::new(1.0));
        let s2 = Shape::Circle(Circle::new(1.0));
        let p1 = Isometry::translation(0.0, 0.0);
        let p2 = Isometry::translation(1.5, 0.0);

        let manifold = circle_circle_manifold(&s1, &p1, &s2, &p2).unwrap();
        assert_eq!(manifold.points.len(), 1);
        assert_relative_eq!(manifold.normal.x, 1.0);
        assert_relative_eq!(manifold.points[0].depth, 0.5);
        assert_relative_eq!(manifold.points[0].point.x, 0.75);
    }

    #[test]
    fn chain_selects_the_circle_fast_path() {
        let chain = AlgorithmChain::default();
        let circle = Shape::Circle(Circle::new(1.0));
        let square = Shape::Polygon(crate::geometry::Polygon::rectangle(1.0, 1.0));

        assert_eq!(chain.select(&circle, &circle), PairAlgorithm::CircleCircle);
        assert_eq!(chain.select(&circle, &square), PairAlgorithm::GjkEpa);
        assert_eq!(chain.select(&square, &square), PairAlgorithm::GjkEpa);
    }
}
