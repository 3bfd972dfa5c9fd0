//! Contact event ordering: one begin, persists while touching, exactly one
//! end after the last persist.

use impetus2d::dynamics::{IntegrationParameters, JointSet, RigidBodyBuilder, RigidBodySet};
use impetus2d::geometry::{
    Circle, ColliderBuilder, ColliderPair, ColliderSet, ContactEvent, NarrowPhase, Polygon, Shape,
};
use impetus2d::math::Vector;
use impetus2d::pipeline::{ChannelEventCollector, PhysicsPipeline};

fn broad_phase_pairs(colliders: &ColliderSet) -> Vec<ColliderPair> {
    let all: Vec<_> = colliders.iter().collect();
    let mut pairs = Vec::new();
    for (i, (h1, c1)) in all.iter().enumerate() {
        for (h2, c2) in &all[i + 1..] {
            let aabb1 = c1.compute_aabb().loosened(0.1);
            if aabb1.intersects(&c2.compute_aabb().loosened(0.1)) {
                pairs.push(ColliderPair::new(*h1, *h2));
            }
        }
    }
    pairs
}

#[test]
fn bounce_produces_begin_persist_end() {
    let params = IntegrationParameters::default();
    let mut pipeline = PhysicsPipeline::new();
    let mut bodies = RigidBodySet::new();
    let mut colliders = ColliderSet::new();
    let mut joints = JointSet::new();
    let mut narrow_phase = NarrowPhase::new();

    let (sender, receiver) = crossbeam::channel::unbounded();
    let events = ChannelEventCollector::new(sender);

    let ground = bodies.insert(RigidBodyBuilder::new_static().build());
    colliders.insert(
        ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(50.0, 0.5))).build(),
        ground,
        &mut bodies,
    );

    // A bouncy ball dropped on the ground: it touches, leaves, and
    // eventually comes to rest.
    let ball = bodies.insert(RigidBodyBuilder::new_dynamic().translation(0.0, 2.0).build());
    colliders.insert(
        ColliderBuilder::new(Shape::Circle(Circle::new(0.5)))
            .restitution(0.7)
            .restitution_velocity(0.5)
            .build(),
        ball,
        &mut bodies,
    );

    let gravity = Vector::new(0.0, -9.81);
    for _ in 0..300 {
        let pairs = broad_phase_pairs(&colliders);
        pipeline.step(
            &gravity,
            &params,
            &pairs,
            &mut bodies,
            &mut colliders,
            &mut joints,
            &mut narrow_phase,
            &(),
            &events,
        );
    }

    let events: Vec<ContactEvent> = receiver.try_iter().collect();
    assert!(!events.is_empty());

    // Per pair: Began first, then only Persisted until an Ended, then
    // possibly Began again.
    let mut touching = false;
    let mut began = 0;
    let mut ended = 0;
    for event in &events {
        match event {
            ContactEvent::Began(_) => {
                assert!(!touching, "begin while already touching");
                touching = true;
                began += 1;
            }
            ContactEvent::Persisted(_) => {
                assert!(touching, "persist without begin");
            }
            ContactEvent::Ended(_) => {
                assert!(touching, "end without begin");
                touching = false;
                ended += 1;
            }
        }
    }

    // The ball bounced at least once, and every end matches a begin.
    assert!(began >= 1);
    assert!(ended <= began);
    // The ball finally rests on the ground: last state is touching.
    assert!(touching);
}
