//! Continuous collision detection through the full pipeline: bullet bodies
//! must not tunnel through thin obstacles.

use impetus2d::dynamics::{IntegrationParameters, JointSet, RigidBodyBuilder, RigidBodySet};
use impetus2d::geometry::{
    Circle, ColliderBuilder, ColliderPair, ColliderSet, NarrowPhase, Polygon, Shape,
};
use impetus2d::math::Vector;
use impetus2d::pipeline::PhysicsPipeline;

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

fn shoot_at_wall(bullet_enabled: bool) -> f32 {
    let params = IntegrationParameters::default();
    let mut pipeline = PhysicsPipeline::new();
    let mut bodies = RigidBodySet::new();
    let mut colliders = ColliderSet::new();
    let mut joints = JointSet::new();
    let mut narrow_phase = NarrowPhase::new();

    let wall = bodies.insert(RigidBodyBuilder::new_static().translation(5.0, 0.0).build());
    colliders.insert(
        ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(0.05, 5.0))).build(),
        wall,
        &mut bodies,
    );

    // Crosses the whole wall thickness in a single step.
    let projectile = bodies.insert(
        RigidBodyBuilder::new_dynamic()
            .linvel(600.0, 0.0)
            .bullet(bullet_enabled)
            .build(),
    );
    colliders.insert(
        ColliderBuilder::new(Shape::Circle(Circle::new(0.1))).build(),
        projectile,
        &mut bodies,
    );

    let gravity = Vector::zeros();
    for _ in 0..3 {
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
            &(),
        );
    }

    bodies[projectile].position().translation.vector.x
}

#[test]
fn bullets_stop_at_thin_walls() {
    let x = shoot_at_wall(true);
    // The projectile must end up on the near side of the wall at x = 5.
    assert!(x < 5.0, "bullet tunneled to x = {}", x);
    // And it must have covered most of the distance to it.
    assert!(x > 3.0, "bullet stopped early at x = {}", x);
}

#[test]
fn shape_cast_finds_the_first_obstacle() {
    let params = IntegrationParameters::default();
    let pipeline = PhysicsPipeline::new();
    let mut bodies = RigidBodySet::new();
    let mut colliders = ColliderSet::new();

    let near = bodies.insert(RigidBodyBuilder::new_static().translation(3.0, 0.0).build());
    let near_collider = colliders.insert(
        ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(0.5, 2.0))).build(),
        near,
        &mut bodies,
    );
    let far = bodies.insert(RigidBodyBuilder::new_static().translation(8.0, 0.0).build());
    colliders.insert(
        ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(0.5, 2.0))).build(),
        far,
        &mut bodies,
    );

    let probe = Shape::Circle(Circle::new(0.5));
    let (hit, toi) = pipeline
        .cast_shape(
            &params,
            &colliders,
            &probe,
            &impetus2d::math::Isometry::identity(),
            &Vector::new(10.0, 0.0),
            0.0,
        )
        .expect("the sweep hits a wall");

    assert_eq!(hit, near_collider);
    // Gap of 2.0 closed at speed 10 per unit time.
    assert!((toi - 0.2).abs() < 1.0e-3);
}

#[test]
fn non_bullets_tunnel_for_reference() {
    // The discrete step alone misses the wall entirely: this is exactly
    // the failure mode the bullet flag exists for.
    let x = shoot_at_wall(false);
    assert!(x > 5.5);
}
