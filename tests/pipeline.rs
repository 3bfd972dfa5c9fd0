//! Pipeline-level scenarios: stepping worlds with gravity, contacts,
//! joints, sleeping, and world shifting.

use approx::assert_relative_eq;
use impetus2d::dynamics::{
    DistanceJoint, IntegrationParameters, JointSet, RigidBodyBuilder, RigidBodyHandle,
    RigidBodySet,
};
use impetus2d::geometry::{
    Circle, ColliderBuilder, ColliderPair, ColliderSet, NarrowPhase, Polygon, Shape,
};
use impetus2d::math::{Point, Real, Vector};
use impetus2d::pipeline::{shift_world, PhysicsPipeline};

// The broad-phase is an external collaborator: tests use a brute-force
// sweep over loosened bounds.
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

struct TestWorld {
    pipeline: PhysicsPipeline,
    params: IntegrationParameters,
    gravity: Vector<Real>,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    joints: JointSet,
    narrow_phase: NarrowPhase,
}

impl TestWorld {
    fn new(gravity: Vector<Real>) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            params: IntegrationParameters::default(),
            gravity,
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            joints: JointSet::new(),
            narrow_phase: NarrowPhase::new(),
        }
    }

    fn step(&mut self) {
        let pairs = broad_phase_pairs(&self.colliders);
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &pairs,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.joints,
            &mut self.narrow_phase,
            &(),
            &(),
        );
    }

    fn add_ground(&mut self) -> RigidBodyHandle {
        let ground = self.bodies.insert(RigidBodyBuilder::new_static().build());
        self.colliders.insert(
            ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(50.0, 0.5))).build(),
            ground,
            &mut self.bodies,
        );
        ground
    }

    fn add_cube(&mut self, x: Real, y: Real) -> RigidBodyHandle {
        let cube = self
            .bodies
            .insert(RigidBodyBuilder::new_dynamic().translation(x, y).build());
        self.colliders.insert(
            ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(0.5, 0.5))).build(),
            cube,
            &mut self.bodies,
        );
        cube
    }
}

#[test]
fn free_fall_integrates_gravity() {
    let mut world = TestWorld::new(Vector::new(0.0, -9.81));
    let ball = world.bodies.insert(RigidBodyBuilder::new_dynamic().build());
    world.colliders.insert(
        ColliderBuilder::new(Shape::Circle(Circle::new(0.5))).build(),
        ball,
        &mut world.bodies,
    );

    for _ in 0..60 {
        world.step();
    }

    let rb = &world.bodies[ball];
    assert_relative_eq!(rb.linvel().y, -9.81, epsilon = 0.01);
    // Semi-implicit Euler: sum of v_k * dt for k = 1..=60.
    let expected = -9.81 * (1.0 / 3600.0) * (60.0 * 61.0 / 2.0);
    assert_relative_eq!(rb.position().translation.vector.y, expected, epsilon = 0.05);
}

#[test]
fn resting_contact_does_not_sink() {
    let mut world = TestWorld::new(Vector::new(0.0, -9.81));
    world.add_ground();
    // Dropped from slightly above the ground surface.
    let cube = world.add_cube(0.0, 1.2);

    for _ in 0..120 {
        world.step();
    }

    let rb = &world.bodies[cube];
    // Resting on the ground: the cube's bottom face at most a bit below
    // the ground top at y = 0.5.
    let bottom = rb.position().translation.vector.y - 0.5;
    assert!(bottom > 0.5 - 3.0 * world.params.allowed_linear_error - 0.01);
    assert!(bottom < 0.55);
    assert!(rb.linvel().norm() < 0.05);
}

#[test]
fn restitution_applies_above_the_velocity_threshold() {
    let mut world = TestWorld::new(Vector::zeros());

    let wall = world.bodies.insert(RigidBodyBuilder::new_static().build());
    world.colliders.insert(
        ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(0.5, 5.0))).build(),
        wall,
        &mut world.bodies,
    );

    // Slightly overlapping the wall face at x = 0.5, incoming fast.
    let ball = world.bodies.insert(
        RigidBodyBuilder::new_dynamic()
            .translation(0.99, 0.0)
            .linvel(-2.0, 0.0)
            .build(),
    );
    world.colliders.insert(
        ColliderBuilder::new(Shape::Circle(Circle::new(0.5)))
            .restitution(0.5)
            .restitution_velocity(1.0)
            .friction(0.0)
            .build(),
        ball,
        &mut world.bodies,
    );

    world.step();

    // Closing speed 2 exceeds the threshold 1: the ball bounces back with
    // half its speed.
    assert_relative_eq!(world.bodies[ball].linvel().x, 1.0, epsilon = 0.05);
}

#[test]
fn slow_impacts_do_not_bounce() {
    let mut world = TestWorld::new(Vector::zeros());

    let wall = world.bodies.insert(RigidBodyBuilder::new_static().build());
    world.colliders.insert(
        ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(0.5, 5.0))).build(),
        wall,
        &mut world.bodies,
    );

    let ball = world.bodies.insert(
        RigidBodyBuilder::new_dynamic()
            .translation(0.99, 0.0)
            .linvel(-0.5, 0.0)
            .build(),
    );
    world.colliders.insert(
        ColliderBuilder::new(Shape::Circle(Circle::new(0.5)))
            .restitution(0.9)
            .restitution_velocity(1.0)
            .friction(0.0)
            .build(),
        ball,
        &mut world.bodies,
    );

    world.step();

    // Closing speed 0.5 is below the threshold: the contact only stops the
    // ball.
    assert!(world.bodies[ball].linvel().x.abs() < 0.05);
}

#[test]
fn friction_impulse_stays_in_the_cone() {
    let mut world = TestWorld::new(Vector::new(0.0, -9.81));
    world.add_ground();

    let cube = world
        .bodies
        .insert(
            RigidBodyBuilder::new_dynamic()
                .translation(0.0, 1.0)
                .linvel(3.0, 0.0)
                .build(),
        );
    let cube_collider = world.colliders.insert(
        ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(0.5, 0.5)))
            .friction(0.4)
            .build(),
        cube,
        &mut world.bodies,
    );

    for _ in 0..30 {
        world.step();
    }

    // Sliding friction decelerates the cube without exceeding the cone.
    let mut saw_contact = false;
    for pair in world.narrow_phase.contacts_with(cube_collider) {
        if !pair.is_touching {
            continue;
        }
        saw_contact = true;
        for point in &pair.manifold.points {
            assert!(point.data.impulse >= 0.0);
            assert!(
                point.data.tangent_impulse.abs() <= pair.friction * point.data.impulse + 1.0e-4
            );
        }
    }
    assert!(saw_contact);
    assert!(world.bodies[cube].linvel().x < 3.0);
}

#[test]
fn warm_start_keeps_identifiers_across_steps() {
    let mut world = TestWorld::new(Vector::new(0.0, -9.81));
    world.add_ground();
    world.add_cube(0.0, 1.0);

    for _ in 0..10 {
        world.step();
    }

    let ids_before: Vec<Vec<_>> = world
        .narrow_phase
        .contact_pairs()
        .map(|pair| pair.manifold.points.iter().map(|p| p.id).collect())
        .collect();

    world.step();

    let ids_after: Vec<Vec<_>> = world
        .narrow_phase
        .contact_pairs()
        .map(|pair| pair.manifold.points.iter().map(|p| p.id).collect())
        .collect();

    assert_eq!(ids_before, ids_after);
}

#[test]
fn stacked_cubes_fall_asleep_and_wake_as_an_island() {
    let mut world = TestWorld::new(Vector::new(0.0, -9.81));
    // Islands are connected components for this test.
    world.params.min_island_size = 1;
    world.add_ground();
    let bottom = world.add_cube(0.0, 1.01);
    let top = world.add_cube(0.0, 2.02);

    // Let the stack settle and doze off.
    for _ in 0..240 {
        world.step();
    }
    assert!(world.bodies[bottom].is_sleeping());
    assert!(world.bodies[top].is_sleeping());
    assert_eq!(*world.bodies[bottom].linvel(), Vector::zeros());

    // Poking one body wakes its whole island.
    world
        .bodies
        .get_mut(bottom)
        .unwrap()
        .apply_impulse(Vector::new(1.5, 0.0));
    world.step();

    assert!(!world.bodies[bottom].is_sleeping());
    assert!(!world.bodies[top].is_sleeping());
}

#[test]
fn joined_bodies_follow_each_other() {
    let mut world = TestWorld::new(Vector::zeros());

    let anchor = world.bodies.insert(RigidBodyBuilder::new_static().build());
    let bob = world.bodies.insert(
        RigidBodyBuilder::new_dynamic()
            .translation(2.0, 0.0)
            .linvel(0.0, 1.0)
            .build(),
    );
    world.colliders.insert(
        ColliderBuilder::new(Shape::Circle(Circle::new(0.2))).build(),
        bob,
        &mut world.bodies,
    );

    world.joints.insert(
        Box::new(DistanceJoint::new(
            anchor,
            bob,
            Point::origin(),
            Point::origin(),
            2.0,
        )),
        &mut world.bodies,
    );

    for _ in 0..120 {
        world.step();
    }

    // The bob stays on the circle of radius 2 around the anchor.
    let distance = world.bodies[bob].position().translation.vector.norm();
    assert_relative_eq!(distance, 2.0, epsilon = 0.05);
}

#[test]
fn shifting_the_world_preserves_velocities_and_contacts() {
    let mut world = TestWorld::new(Vector::new(0.0, -9.81));
    world.add_ground();
    let cube = world.add_cube(0.0, 1.0);

    for _ in 0..30 {
        world.step();
    }

    let pos_before = *world.bodies[cube].position();
    let vel_before = *world.bodies[cube].linvel();
    let normals_before: Vec<_> = world
        .narrow_phase
        .contact_pairs()
        .map(|pair| pair.manifold.normal)
        .collect();

    let shift = Vector::new(100.0, -25.0);
    shift_world(
        &shift,
        &mut world.bodies,
        &mut world.colliders,
        &mut world.joints,
        &mut world.narrow_phase,
    );

    let pos_after = *world.bodies[cube].position();
    assert_relative_eq!(
        pos_after.translation.vector.x,
        pos_before.translation.vector.x + shift.x,
        epsilon = 1.0e-5
    );
    assert_relative_eq!(
        pos_after.translation.vector.y,
        pos_before.translation.vector.y + shift.y,
        epsilon = 1.0e-5
    );
    assert_eq!(*world.bodies[cube].linvel(), vel_before);

    let normals_after: Vec<_> = world
        .narrow_phase
        .contact_pairs()
        .map(|pair| pair.manifold.normal)
        .collect();
    assert_eq!(normals_before, normals_after);

    // The world keeps simulating normally after the shift.
    for _ in 0..30 {
        world.step();
    }
    assert!(world.bodies[cube].position().translation.vector.y > -26.0);
}

#[test]
fn sensors_report_contacts_without_impulses() {
    let mut world = TestWorld::new(Vector::new(0.0, -9.81));

    // A sensor plate where the ground would be.
    let plate = world.bodies.insert(RigidBodyBuilder::new_static().build());
    let plate_collider = world.colliders.insert(
        ColliderBuilder::new(Shape::Polygon(Polygon::rectangle(50.0, 0.5)))
            .sensor(true)
            .build(),
        plate,
        &mut world.bodies,
    );

    let ball = world.bodies.insert(RigidBodyBuilder::new_dynamic().translation(0.0, 2.0).build());
    world.colliders.insert(
        ColliderBuilder::new(Shape::Circle(Circle::new(0.5))).build(),
        ball,
        &mut world.bodies,
    );

    let mut touched = false;
    for _ in 0..120 {
        world.step();
        touched |= world
            .narrow_phase
            .contacts_with(plate_collider)
            .any(|pair| pair.is_touching);
    }

    // The sensor noticed the ball, and the ball fell straight through.
    assert!(touched);
    assert!(world.bodies[ball].position().translation.vector.y < -2.0);
}

#[test]
fn removing_a_body_removes_its_contacts() {
    let mut world = TestWorld::new(Vector::new(0.0, -9.81));
    world.add_ground();
    let cube = world.add_cube(0.0, 1.0);

    for _ in 0..30 {
        world.step();
    }
    assert!(world.narrow_phase.contact_pairs().any(|p| p.is_touching));

    world
        .bodies
        .remove(cube, &mut world.colliders, &mut world.joints);
    world.step();

    assert!(!world.narrow_phase.contact_pairs().any(|p| p.is_touching));
}
