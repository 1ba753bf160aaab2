//! Minimal 2D physics substrate for the slink simulation.
//!
//! Owns rigid bodies (circles and static rectangles), pairwise pin/spring
//! constraints for segment chains, collision-group filtering, convex-region
//! queries, and per-step contact reporting. Every body carries an opaque
//! payload tag so callers can recover what a body belongs to without the
//! physics layer knowing anything about agents or particles.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use thiserror::Error;

new_key_type! {
    /// Stable generational handle for physics bodies.
    pub struct BodyId;
}

/// Errors emitted by the physics world.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhysicsError {
    #[error("unknown body handle")]
    UnknownBody,
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Plain 2D vector with the operations the simulation needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit "forward" vector for a heading angle. By convention forward at
    /// angle zero points along +Y, matching the creature rendering frame.
    #[must_use]
    pub fn forward(angle: f32) -> Self {
        Self::new(-angle.sin(), angle.cos())
    }

    #[must_use]
    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    #[must_use]
    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product; sign tells which side `other`
    /// falls on relative to `self`.
    #[must_use]
    pub fn cross(self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Counter-clockwise rotation by `angle` radians.
    #[must_use]
    pub fn rotate(self, angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    #[must_use]
    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            self.scale(1.0 / len)
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Matter.js-style collision filter.
///
/// Two bodies sharing the same non-zero group always collide when the group
/// is positive and never collide when it is negative; otherwise category and
/// mask must accept each other in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub group: i32,
    pub category: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            group: 0,
            category: 1,
            mask: u32::MAX,
        }
    }
}

impl CollisionFilter {
    #[must_use]
    pub fn can_collide(self, other: Self) -> bool {
        if self.group != 0 && self.group == other.group {
            return self.group > 0;
        }
        (self.category & other.mask) != 0 && (other.category & self.mask) != 0
    }
}

/// Collision shape of a body. Rectangles are axis-aligned and static-only
/// (walls); everything that moves is a circle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle { radius: f32 },
    Rect { half_width: f32, half_height: f32 },
}

impl Shape {
    #[must_use]
    pub fn circle(radius: f32) -> Self {
        Self::Circle { radius }
    }

    #[must_use]
    pub fn rect(width: f32, height: f32) -> Self {
        Self::Rect {
            half_width: width * 0.5,
            half_height: height * 0.5,
        }
    }
}

/// A rigid body carrying an opaque payload tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body<T> {
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub angular_velocity: f32,
    pub shape: Shape,
    /// Proportional velocity loss applied each step, in [0, 1).
    pub friction_air: f32,
    pub is_static: bool,
    pub filter: CollisionFilter,
    pub tag: T,
    force: Vec2,
    torque: f32,
}

impl<T> Body<T> {
    #[must_use]
    pub fn circle(position: Vec2, radius: f32, filter: CollisionFilter, tag: T) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            angle: 0.0,
            angular_velocity: 0.0,
            shape: Shape::circle(radius),
            friction_air: 0.1,
            is_static: false,
            filter,
            tag,
            force: Vec2::ZERO,
            torque: 0.0,
        }
    }

    #[must_use]
    pub fn static_rect(
        position: Vec2,
        width: f32,
        height: f32,
        filter: CollisionFilter,
        tag: T,
    ) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            angle: 0.0,
            angular_velocity: 0.0,
            shape: Shape::rect(width, height),
            friction_air: 0.0,
            is_static: true,
            filter,
            tag,
            force: Vec2::ZERO,
            torque: 0.0,
        }
    }

    #[must_use]
    pub fn with_friction(mut self, friction_air: f32) -> Self {
        self.friction_air = friction_air;
        self
    }

    /// Circle radius, or zero for rectangles.
    #[must_use]
    pub fn radius(&self) -> f32 {
        match self.shape {
            Shape::Circle { radius } => radius,
            Shape::Rect { .. } => 0.0,
        }
    }
}

/// Distance constraint between local anchor points on two bodies.
///
/// A segment link is a pin (rest length zero, opposing anchors) plus a spring
/// (longer rest length) holding the chain straight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub point_a: Vec2,
    pub point_b: Vec2,
    pub length: f32,
    pub stiffness: f32,
}

/// One contact reported after a step: the pair of touching bodies and the
/// contact normal pointing from `body_a` toward `body_b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub normal: Vec2,
}

const CONSTRAINT_ITERATIONS: usize = 4;

/// The physics world: single owner of all physical/collision truth.
#[derive(Debug)]
pub struct World<T> {
    bodies: SlotMap<BodyId, Body<T>>,
    constraints: Vec<Constraint>,
    contacts: Vec<Contact>,
    next_group: i32,
}

impl<T> Default for World<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> World<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bodies: SlotMap::with_key(),
            constraints: Vec::new(),
            contacts: Vec::new(),
            next_group: 0,
        }
    }

    /// Allocate a fresh non-colliding group id (always negative, so members
    /// of the same chain pass through each other).
    pub fn next_group(&mut self) -> i32 {
        self.next_group -= 1;
        self.next_group
    }

    pub fn insert_body(&mut self, body: Body<T>) -> BodyId {
        self.bodies.insert(body)
    }

    /// Remove a body along with every constraint referencing it.
    pub fn remove_body(&mut self, id: BodyId) -> Option<Body<T>> {
        let removed = self.bodies.remove(id)?;
        self.constraints
            .retain(|c| c.body_a != id && c.body_b != id);
        Some(removed)
    }

    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body<T>> {
        self.bodies.get(id)
    }

    #[must_use]
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body<T>> {
        self.bodies.get_mut(id)
    }

    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn iter_bodies(&self) -> impl Iterator<Item = (BodyId, &Body<T>)> {
        self.bodies.iter()
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Link two chain segments with the pin + spring pair that keeps a chain
    /// connected and roughly straight.
    pub fn link_segments(
        &mut self,
        parent: BodyId,
        child: BodyId,
        offset: f32,
        stiffness: f32,
    ) -> Result<(), PhysicsError> {
        if !self.bodies.contains_key(parent) || !self.bodies.contains_key(child) {
            return Err(PhysicsError::UnknownBody);
        }
        self.add_constraint(Constraint {
            body_a: parent,
            body_b: child,
            point_a: Vec2::new(0.0, -offset),
            point_b: Vec2::new(0.0, offset),
            length: 0.0,
            stiffness,
        });
        // Nominal length is offset * 4; pushing slightly longer keeps the
        // chain from folding onto itself.
        self.add_constraint(Constraint {
            body_a: parent,
            body_b: child,
            point_a: Vec2::new(0.0, offset),
            point_b: Vec2::new(0.0, -offset),
            length: offset * 5.0,
            stiffness,
        });
        Ok(())
    }

    pub fn apply_force(&mut self, id: BodyId, force: Vec2) -> Result<(), PhysicsError> {
        let body = self.bodies.get_mut(id).ok_or(PhysicsError::UnknownBody)?;
        body.force = body.force + force;
        Ok(())
    }

    pub fn apply_torque(&mut self, id: BodyId, torque: f32) -> Result<(), PhysicsError> {
        let body = self.bodies.get_mut(id).ok_or(PhysicsError::UnknownBody)?;
        body.torque += torque;
        Ok(())
    }

    /// Scale a circle body's effective radius by `factor`.
    pub fn scale_radius(&mut self, id: BodyId, factor: f32) -> Result<(), PhysicsError> {
        let body = self.bodies.get_mut(id).ok_or(PhysicsError::UnknownBody)?;
        match &mut body.shape {
            Shape::Circle { radius } => {
                *radius *= factor;
                Ok(())
            }
            Shape::Rect { .. } => Err(PhysicsError::InvalidConfig(
                "cannot scale radius of a rectangle",
            )),
        }
    }

    /// Advance the world by one fixed step: integrate, relax constraints,
    /// then detect and record contacts.
    pub fn step(&mut self, dt: f32) {
        self.integrate(dt);
        for _ in 0..CONSTRAINT_ITERATIONS {
            self.solve_constraints();
        }
        self.detect_contacts();
    }

    /// Drain the contacts recorded by the most recent step.
    pub fn drain_contacts(&mut self) -> Vec<Contact> {
        std::mem::take(&mut self.contacts)
    }

    fn integrate(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            if body.is_static {
                body.force = Vec2::ZERO;
                body.torque = 0.0;
                continue;
            }
            body.velocity = body.velocity + body.force.scale(dt);
            body.velocity = body.velocity.scale(1.0 - body.friction_air);
            body.position = body.position + body.velocity.scale(dt);
            body.angular_velocity += body.torque * dt;
            body.angular_velocity *= 1.0 - body.friction_air;
            body.angle += body.angular_velocity * dt;
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    fn solve_constraints(&mut self) {
        for i in 0..self.constraints.len() {
            let constraint = self.constraints[i].clone();
            let Some(body_a) = self.bodies.get(constraint.body_a) else {
                continue;
            };
            let Some(body_b) = self.bodies.get(constraint.body_b) else {
                continue;
            };
            let anchor_a = body_a.position + constraint.point_a.rotate(body_a.angle);
            let anchor_b = body_b.position + constraint.point_b.rotate(body_b.angle);
            let delta = anchor_b - anchor_a;
            let current = delta.length();
            if current <= f32::EPSILON && constraint.length <= f32::EPSILON {
                continue;
            }
            let direction = if current <= f32::EPSILON {
                Vec2::new(0.0, 1.0)
            } else {
                delta.scale(1.0 / current)
            };
            let error = current - constraint.length;
            let correction = direction.scale(error * constraint.stiffness * 0.5);
            let a_static = body_a.is_static;
            let b_static = body_b.is_static;
            if a_static && b_static {
                continue;
            }
            if !a_static {
                let share = if b_static { 2.0 } else { 1.0 };
                let body = &mut self.bodies[constraint.body_a];
                body.position = body.position + correction.scale(share);
            }
            if !b_static {
                let share = if a_static { 2.0 } else { 1.0 };
                let body = &mut self.bodies[constraint.body_b];
                body.position = body.position - correction.scale(share);
            }
        }
    }

    fn detect_contacts(&mut self) {
        self.contacts.clear();
        let ids: Vec<BodyId> = self.bodies.keys().collect();
        for (i, &id_a) in ids.iter().enumerate() {
            for &id_b in &ids[i + 1..] {
                let (Some(a), Some(b)) = (self.bodies.get(id_a), self.bodies.get(id_b)) else {
                    continue;
                };
                if a.is_static && b.is_static {
                    continue;
                }
                if !a.filter.can_collide(b.filter) {
                    continue;
                }
                if let Some((normal, overlap)) = collide(a, b) {
                    self.contacts.push(Contact {
                        body_a: id_a,
                        body_b: id_b,
                        normal,
                    });
                    self.separate(id_a, id_b, normal, overlap);
                }
            }
        }
    }

    fn separate(&mut self, id_a: BodyId, id_b: BodyId, normal: Vec2, overlap: f32) {
        if overlap <= 0.0 {
            return;
        }
        let a_static = self.bodies[id_a].is_static;
        let b_static = self.bodies[id_b].is_static;
        if !a_static {
            let share = if b_static { 1.0 } else { 0.5 };
            let body = &mut self.bodies[id_a];
            body.position = body.position - normal.scale(overlap * share);
        }
        if !b_static {
            let share = if a_static { 1.0 } else { 0.5 };
            let body = &mut self.bodies[id_b];
            body.position = body.position + normal.scale(overlap * share);
        }
    }

    /// All bodies intersecting a convex polygon, filtered by `filter` with
    /// the usual group/mask semantics. Vertices must be in order (either
    /// winding); the polygon is in world space.
    #[must_use]
    pub fn query_polygon(&self, polygon: &[Vec2], filter: CollisionFilter) -> Vec<BodyId> {
        let mut hits = Vec::new();
        if polygon.len() < 3 {
            return hits;
        }
        for (id, body) in &self.bodies {
            if !filter.can_collide(body.filter) {
                continue;
            }
            let overlapping = match body.shape {
                Shape::Circle { radius } => polygon_circle_overlap(polygon, body.position, radius),
                Shape::Rect {
                    half_width,
                    half_height,
                } => {
                    let corners = rect_corners(body.position, half_width, half_height);
                    polygons_overlap(polygon, &corners)
                }
            };
            if overlapping {
                hits.push(id);
            }
        }
        hits
    }

    /// All bodies whose shape contains `point`, filtered by `filter`.
    #[must_use]
    pub fn query_point(&self, point: Vec2, filter: CollisionFilter) -> Vec<BodyId> {
        let mut hits = Vec::new();
        for (id, body) in &self.bodies {
            if !filter.can_collide(body.filter) {
                continue;
            }
            let inside = match body.shape {
                Shape::Circle { radius } => (point - body.position).length_sq() <= radius * radius,
                Shape::Rect {
                    half_width,
                    half_height,
                } => {
                    (point.x - body.position.x).abs() <= half_width
                        && (point.y - body.position.y).abs() <= half_height
                }
            };
            if inside {
                hits.push(id);
            }
        }
        hits
    }
}

/// Narrow-phase test; returns the contact normal (a toward b) and overlap
/// depth when the two bodies intersect.
fn collide<T>(a: &Body<T>, b: &Body<T>) -> Option<(Vec2, f32)> {
    match (a.shape, b.shape) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            let delta = b.position - a.position;
            let dist_sq = delta.length_sq();
            let reach = ra + rb;
            if dist_sq >= reach * reach {
                return None;
            }
            let dist = dist_sq.sqrt();
            let normal = if dist <= f32::EPSILON {
                Vec2::new(0.0, 1.0)
            } else {
                delta.scale(1.0 / dist)
            };
            Some((normal, reach - dist))
        }
        (Shape::Circle { radius }, Shape::Rect { half_width, half_height }) => {
            circle_rect(a.position, radius, b.position, half_width, half_height)
        }
        (Shape::Rect { half_width, half_height }, Shape::Circle { radius }) => {
            circle_rect(b.position, radius, a.position, half_width, half_height)
                .map(|(normal, overlap)| (-normal, overlap))
        }
        (Shape::Rect { .. }, Shape::Rect { .. }) => None,
    }
}

fn circle_rect(
    center: Vec2,
    radius: f32,
    rect_pos: Vec2,
    half_width: f32,
    half_height: f32,
) -> Option<(Vec2, f32)> {
    let closest = Vec2::new(
        center.x.clamp(rect_pos.x - half_width, rect_pos.x + half_width),
        center.y.clamp(rect_pos.y - half_height, rect_pos.y + half_height),
    );
    let delta = closest - center;
    let dist_sq = delta.length_sq();
    if dist_sq >= radius * radius {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist <= f32::EPSILON {
        (rect_pos - center).normalized()
    } else {
        delta.scale(1.0 / dist)
    };
    Some((normal, radius - dist))
}

fn rect_corners(position: Vec2, half_width: f32, half_height: f32) -> [Vec2; 4] {
    [
        Vec2::new(position.x - half_width, position.y - half_height),
        Vec2::new(position.x + half_width, position.y - half_height),
        Vec2::new(position.x + half_width, position.y + half_height),
        Vec2::new(position.x - half_width, position.y + half_height),
    ]
}

fn project(polygon: &[Vec2], axis: Vec2) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &vertex in polygon {
        let value = vertex.dot(axis);
        min = min.min(value);
        max = max.max(value);
    }
    (min, max)
}

fn separated_on_axes(a: &[Vec2], b: &[Vec2]) -> bool {
    for i in 0..a.len() {
        let edge = a[(i + 1) % a.len()] - a[i];
        let axis = Vec2::new(-edge.y, edge.x);
        if axis.length_sq() <= f32::EPSILON {
            continue;
        }
        let (min_a, max_a) = project(a, axis);
        let (min_b, max_b) = project(b, axis);
        if max_a < min_b || max_b < min_a {
            return true;
        }
    }
    false
}

/// Separating-axis overlap test for two convex polygons.
#[must_use]
pub fn polygons_overlap(a: &[Vec2], b: &[Vec2]) -> bool {
    !separated_on_axes(a, b) && !separated_on_axes(b, a)
}

/// Convex polygon vs. circle overlap test.
#[must_use]
pub fn polygon_circle_overlap(polygon: &[Vec2], center: Vec2, radius: f32) -> bool {
    if point_in_polygon(polygon, center) {
        return true;
    }
    for i in 0..polygon.len() {
        let start = polygon[i];
        let end = polygon[(i + 1) % polygon.len()];
        if point_segment_distance_sq(center, start, end) <= radius * radius {
            return true;
        }
    }
    false
}

fn point_in_polygon(polygon: &[Vec2], point: Vec2) -> bool {
    // Works for convex polygons of either winding: every cross product must
    // carry the same sign.
    let mut sign = 0.0f32;
    for i in 0..polygon.len() {
        let edge = polygon[(i + 1) % polygon.len()] - polygon[i];
        let to_point = point - polygon[i];
        let cross = edge.cross(to_point);
        if cross.abs() <= f32::EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

fn point_segment_distance_sq(point: Vec2, start: Vec2, end: Vec2) -> f32 {
    let edge = end - start;
    let len_sq = edge.length_sq();
    if len_sq <= f32::EPSILON {
        return (point - start).length_sq();
    }
    let t = ((point - start).dot(edge) / len_sq).clamp(0.0, 1.0);
    let closest = start + edge.scale(t);
    (point - closest).length_sq()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_filter() -> CollisionFilter {
        CollisionFilter::default()
    }

    #[test]
    fn filter_group_semantics_match_matter() {
        let negative_a = CollisionFilter {
            group: -1,
            ..CollisionFilter::default()
        };
        let negative_b = negative_a;
        assert!(!negative_a.can_collide(negative_b));

        let positive = CollisionFilter {
            group: 3,
            category: 0,
            mask: 0,
        };
        assert!(positive.can_collide(positive));

        let food = CollisionFilter {
            group: 0,
            category: 0b00001,
            mask: 0b10000,
        };
        let snake = CollisionFilter {
            group: -2,
            category: 0b10000,
            mask: 0b11111,
        };
        assert!(food.can_collide(snake));
        let wall_only = CollisionFilter {
            group: 0,
            category: 0b00100,
            mask: 0b00100,
        };
        assert!(!food.can_collide(wall_only));
    }

    #[test]
    fn chain_links_stay_connected_under_force() {
        let mut world: World<u32> = World::new();
        let group = world.next_group();
        let filter = CollisionFilter {
            group,
            ..CollisionFilter::default()
        };
        let head = world.insert_body(Body::circle(Vec2::ZERO, 5.0, filter, 0));
        let mut prev = head;
        for i in 1..6u32 {
            let seg = world.insert_body(Body::circle(Vec2::new(0.0, -8.0 * i as f32), 5.0, filter, i));
            world.link_segments(prev, seg, 1.5, 1.0).expect("link");
            prev = seg;
        }
        for _ in 0..50 {
            world.apply_force(head, Vec2::new(0.3, 0.0)).expect("force");
            world.step(1.0);
        }
        let head_pos = world.body(head).unwrap().position;
        assert!(head_pos.x > 1.0, "head should have moved under force");
        // Constraints keep every neighbor within a bounded distance.
        let positions: Vec<Vec2> = world.iter_bodies().map(|(_, b)| b.position).collect();
        for pair in positions.windows(2) {
            assert!((pair[1] - pair[0]).length() < 30.0);
        }
    }

    #[test]
    fn overlapping_circles_emit_contact_with_normal() {
        let mut world: World<&'static str> = World::new();
        let a = world.insert_body(Body::circle(Vec2::ZERO, 4.0, plain_filter(), "a"));
        let b = world.insert_body(Body::circle(Vec2::new(5.0, 0.0), 4.0, plain_filter(), "b"));
        world.step(1.0);
        let contacts = world.drain_contacts();
        assert_eq!(contacts.len(), 1);
        let contact = contacts[0];
        let pair = [contact.body_a, contact.body_b];
        assert!(pair.contains(&a));
        assert!(pair.contains(&b));
        assert!(contact.normal.x.abs() > 0.9);
        assert!(world.drain_contacts().is_empty(), "drain consumes contacts");
    }

    #[test]
    fn same_negative_group_never_collides() {
        let mut world: World<u8> = World::new();
        let group = world.next_group();
        let filter = CollisionFilter {
            group,
            ..CollisionFilter::default()
        };
        world.insert_body(Body::circle(Vec2::ZERO, 4.0, filter, 0));
        world.insert_body(Body::circle(Vec2::new(1.0, 0.0), 4.0, filter, 1));
        world.step(1.0);
        assert!(world.drain_contacts().is_empty());
    }

    #[test]
    fn polygon_query_respects_reach_and_filter() {
        let mut world: World<u8> = World::new();
        let inside = world.insert_body(Body::circle(Vec2::new(0.0, 30.0), 3.0, plain_filter(), 0));
        let outside = world.insert_body(Body::circle(Vec2::new(0.0, 90.0), 3.0, plain_filter(), 1));
        let wedge = [
            Vec2::ZERO,
            Vec2::new(-20.0, 50.0),
            Vec2::new(0.0, 50.0),
            Vec2::new(20.0, 50.0),
        ];
        let hits = world.query_polygon(&wedge, plain_filter());
        assert!(hits.contains(&inside));
        assert!(!hits.contains(&outside));

        let masked = CollisionFilter {
            group: 0,
            category: 0b10,
            mask: 0b10,
        };
        assert!(world.query_polygon(&wedge, masked).is_empty());
    }

    #[test]
    fn point_query_hits_circle_and_rect() {
        let mut world: World<u8> = World::new();
        let circle = world.insert_body(Body::circle(Vec2::new(10.0, 10.0), 5.0, plain_filter(), 0));
        let rect = world.insert_body(Body::static_rect(
            Vec2::new(-20.0, 0.0),
            10.0,
            4.0,
            plain_filter(),
            1,
        ));
        assert_eq!(world.query_point(Vec2::new(12.0, 11.0), plain_filter()), vec![circle]);
        assert_eq!(world.query_point(Vec2::new(-17.0, 1.0), plain_filter()), vec![rect]);
        assert!(world.query_point(Vec2::new(100.0, 100.0), plain_filter()).is_empty());
    }

    #[test]
    fn remove_body_drops_dependent_constraints() {
        let mut world: World<u8> = World::new();
        let a = world.insert_body(Body::circle(Vec2::ZERO, 5.0, plain_filter(), 0));
        let b = world.insert_body(Body::circle(Vec2::new(0.0, -8.0), 5.0, plain_filter(), 1));
        world.link_segments(a, b, 1.5, 1.0).expect("link");
        assert!(world.remove_body(b).is_some());
        assert_eq!(world.body_count(), 1);
        // Stepping after removal must not touch the dangling constraint.
        world.step(1.0);
    }

    #[test]
    fn scale_radius_only_applies_to_circles() {
        let mut world: World<u8> = World::new();
        let circle = world.insert_body(Body::circle(Vec2::ZERO, 10.0, plain_filter(), 0));
        let rect = world.insert_body(Body::static_rect(Vec2::ZERO, 4.0, 4.0, plain_filter(), 1));
        world.scale_radius(circle, 0.5).expect("scale");
        assert!((world.body(circle).unwrap().radius() - 5.0).abs() < f32::EPSILON);
        assert!(world.scale_radius(rect, 0.5).is_err());
    }
}
