//! Region quadtree for per-tick range queries
//!
//! Rebuilt from scratch every tick over the live enemy set; there is no
//! incremental update. Points are tested against node bounds with a half-open
//! interval `[center - half, center + half)` on both axes, so a point on a shared
//! edge belongs to exactly one child.

use glam::Vec2;

/// Deepest subdivision level; below it nodes just grow (coincident points)
const MAX_DEPTH: u32 = 12;

/// Axis-aligned box given by center and half extents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub x: f32,
    pub y: f32,
    pub half_width: f32,
    pub half_height: f32,
}

impl Boundary {
    pub fn new(x: f32, y: f32, half_width: f32, half_height: f32) -> Self {
        Self {
            x,
            y,
            half_width,
            half_height,
        }
    }

    /// Square box around a point
    pub fn around(center: Vec2, half: f32) -> Self {
        Self::new(center.x, center.y, half, half)
    }

    /// Half-open containment test
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x - self.half_width
            && p.x < self.x + self.half_width
            && p.y >= self.y - self.half_height
            && p.y < self.y + self.half_height
    }

    /// Bounding-box overlap test
    pub fn intersects(&self, other: &Boundary) -> bool {
        !(other.x - other.half_width > self.x + self.half_width
            || other.x + other.half_width < self.x - self.half_width
            || other.y - other.half_height > self.y + self.half_height
            || other.y + other.half_height < self.y - self.half_height)
    }

    /// Smallest box (with slack) whose half-open interval covers every position
    pub fn covering(positions: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut iter = positions.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        let center = (min + max) * 0.5;
        // Slack keeps the max corner strictly inside the open edge
        let half = ((max - min) * 0.5).max(Vec2::splat(1.0)) + Vec2::splat(1.0);
        Some(Self::new(center.x, center.y, half.x, half.y))
    }

    fn quadrant(&self, east: bool, south: bool) -> Self {
        let hw = self.half_width / 2.0;
        let hh = self.half_height / 2.0;
        let x = if east { self.x + hw } else { self.x - hw };
        let y = if south { self.y + hh } else { self.y - hh };
        Self::new(x, y, hw, hh)
    }
}

/// A stored point and its payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadPoint<T> {
    pub pos: Vec2,
    pub data: T,
}

/// Quadtree node. Points stay in the node that accepted them; overflow goes to
/// children once the node subdivides.
#[derive(Debug, Clone)]
pub struct QuadTree<T> {
    boundary: Boundary,
    capacity: usize,
    depth: u32,
    points: Vec<QuadPoint<T>>,
    children: Option<Box<[QuadTree<T>; 4]>>,
}

impl<T: Copy> QuadTree<T> {
    pub fn new(boundary: Boundary, capacity: usize) -> Self {
        Self::with_depth(boundary, capacity.max(1), 0)
    }

    fn with_depth(boundary: Boundary, capacity: usize, depth: u32) -> Self {
        Self {
            boundary,
            capacity,
            depth,
            points: Vec::with_capacity(capacity),
            children: None,
        }
    }

    /// Insert a point. Returns false if it lies outside this tree's boundary.
    pub fn insert(&mut self, pos: Vec2, data: T) -> bool {
        if !self.boundary.contains(pos) {
            return false;
        }

        if self.points.len() < self.capacity || self.depth >= MAX_DEPTH {
            self.points.push(QuadPoint { pos, data });
            return true;
        }

        if self.children.is_none() {
            self.subdivide();
        }

        if let Some(children) = self.children.as_mut() {
            if children.iter_mut().any(|child| child.insert(pos, data)) {
                return true;
            }
        }
        // Rounding at a quadrant seam; keep it here rather than lose it
        self.points.push(QuadPoint { pos, data });
        true
    }

    fn subdivide(&mut self) {
        let b = self.boundary;
        let depth = self.depth + 1;
        let cap = self.capacity;
        self.children = Some(Box::new([
            QuadTree::with_depth(b.quadrant(false, false), cap, depth),
            QuadTree::with_depth(b.quadrant(true, false), cap, depth),
            QuadTree::with_depth(b.quadrant(false, true), cap, depth),
            QuadTree::with_depth(b.quadrant(true, true), cap, depth),
        ]));
    }

    /// Every point inside `range` (half-open test)
    pub fn query(&self, range: &Boundary) -> Vec<QuadPoint<T>> {
        let mut found = Vec::new();
        self.query_into(range, &mut found);
        found
    }

    /// Like [`QuadTree::query`], appending into a caller-owned buffer
    pub fn query_into(&self, range: &Boundary, found: &mut Vec<QuadPoint<T>>) {
        if !self.boundary.intersects(range) {
            return;
        }
        found.extend(self.points.iter().filter(|p| range.contains(p.pos)).copied());
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_into(range, found);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
            + self
                .children
                .as_ref()
                .map(|c| c.iter().map(QuadTree::len).sum())
                .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a tree over `(position, payload)` pairs, sized to cover all of them
pub fn build_index<T: Copy>(
    items: impl IntoIterator<Item = (Vec2, T)> + Clone,
    capacity: usize,
) -> Option<QuadTree<T>> {
    let boundary = Boundary::covering(items.clone().into_iter().map(|(pos, _)| pos))?;
    let mut tree = QuadTree::new(boundary, capacity);
    for (pos, data) in items {
        if !tree.insert(pos, data) {
            log::warn!("quadtree rejected point at ({}, {})", pos.x, pos.y);
        }
    }
    Some(tree)
}
