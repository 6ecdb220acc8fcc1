//! Collision handling against rigid colliders.
//!
//! Grid nodes and particles share the same velocity projection: a collider
//! reports signed distance, outward normal, its own velocity, and a friction
//! coefficient; any kinematic state inside a collider has its velocity
//! projected to a sticking or sliding contact.

use glam::DVec3;

/// A rigid body the snow can collide with.
///
/// Implementations must be cheap to query per grid node per tick.
pub trait Collider: Send + Sync {
    /// Signed distance from `position` to the collider surface; negative
    /// inside.
    fn signed_distance_at(&self, position: DVec3) -> f64;

    /// Unit outward surface normal relevant to `position`.
    fn outward_normal_at(&self, position: DVec3) -> DVec3;

    /// Collider velocity at `position`.
    fn velocity_at(&self, position: DVec3) -> DVec3;

    /// Coulomb friction coefficient.
    fn friction(&self) -> f64;
}

/// An infinite half-space bounded by a plane.
#[derive(Clone, Copy, Debug)]
pub struct HalfSpace {
    origin: DVec3,
    normal: DVec3,
    velocity: DVec3,
    friction: f64,
}

impl HalfSpace {
    /// A static half-space through `origin` with unit outward `normal`.
    pub fn new(origin: DVec3, normal: DVec3, friction: f64) -> Self {
        Self {
            origin,
            normal: normal.normalize(),
            velocity: DVec3::ZERO,
            friction,
        }
    }

    /// The reference scene floor: z = 0.1, normal up, fully rough.
    pub fn reference_floor() -> Self {
        Self::new(DVec3::new(0.0, 0.0, 0.1), DVec3::Z, 1.0)
    }
}

impl Collider for HalfSpace {
    fn signed_distance_at(&self, position: DVec3) -> f64 {
        (position - self.origin).dot(self.normal)
    }

    fn outward_normal_at(&self, _position: DVec3) -> DVec3 {
        self.normal
    }

    fn velocity_at(&self, _position: DVec3) -> DVec3 {
        self.velocity
    }

    fn friction(&self) -> f64 {
        self.friction
    }
}

/// A ridge formed by two half-space faces meeting at an apex line.
///
/// The solid region lies below both faces; the reported normal is the one
/// of the nearer face.
#[derive(Clone, Copy, Debug)]
pub struct Wedge {
    apex: DVec3,
    left_normal: DVec3,
    right_normal: DVec3,
    friction: f64,
}

impl Wedge {
    /// A static wedge with apex line through `apex` and the two outward
    /// face normals.
    pub fn new(apex: DVec3, left_normal: DVec3, right_normal: DVec3, friction: f64) -> Self {
        Self {
            apex,
            left_normal: left_normal.normalize(),
            right_normal: right_normal.normalize(),
            friction,
        }
    }

    fn face_distances(&self, position: DVec3) -> (f64, f64) {
        let rel = position - self.apex;
        (rel.dot(self.left_normal), rel.dot(self.right_normal))
    }
}

impl Collider for Wedge {
    fn signed_distance_at(&self, position: DVec3) -> f64 {
        let (left, right) = self.face_distances(position);
        left.max(right)
    }

    fn outward_normal_at(&self, position: DVec3) -> DVec3 {
        let (left, right) = self.face_distances(position);
        if left >= right {
            self.left_normal
        } else {
            self.right_normal
        }
    }

    fn velocity_at(&self, _position: DVec3) -> DVec3 {
        DVec3::ZERO
    }

    fn friction(&self) -> f64 {
        self.friction
    }
}

/// Projects `velocity_star` against every collider containing `position`.
///
/// Contacts with separating relative velocity are left alone. Otherwise the
/// tangential speed decides between a sticking contact (velocity matches
/// the collider) and a sliding one with Coulomb friction.
pub fn collide(
    mut velocity_star: DVec3,
    position: DVec3,
    colliders: &[Box<dyn Collider>],
) -> DVec3 {
    for collider in colliders {
        if collider.signed_distance_at(position) > 0.0 {
            continue;
        }

        let v_co = collider.velocity_at(position);
        let normal = collider.outward_normal_at(position);
        let v_rel = velocity_star - v_co;

        let v_n = v_rel.dot(normal);
        if v_n >= 0.0 {
            // Already separating.
            continue;
        }

        let v_t = v_rel - normal * v_n;
        let mu = collider.friction();
        let v_rel = if v_t.length() <= -mu * v_n {
            DVec3::ZERO
        } else {
            v_t + v_t.normalize() * (mu * v_n)
        };

        velocity_star = v_rel + v_co;
    }
    velocity_star
}
