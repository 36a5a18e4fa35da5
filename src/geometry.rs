//! Geometry primitives: points, minimum bounding rectangles, and the
//! tagged `SpatialObject` variant with its derived centroid/MBR.
//!
//! This module is intentionally small and stable. It still has to get the
//! per-variant centroid math exactly right, since every other component
//! trusts `SpatialObject::centroid`/`mbr` to agree with the geometry.

use crate::error::{Error, Result};

/// A 2-D point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_sq(other).sqrt()
    }

    pub(crate) fn to_le_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..8].copy_from_slice(&self.x.to_le_bytes());
        out[8..16].copy_from_slice(&self.y.to_le_bytes());
        out
    }

    pub(crate) fn from_le_bytes(bytes: &[u8]) -> Self {
        let x = f64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let y = f64::from_le_bytes(bytes[8..16].try_into().unwrap());
        Self { x, y }
    }
}

/// An axis-aligned minimum bounding rectangle.
///
/// Empty iff `min_x > max_x || min_y > max_y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mbr {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Mbr {
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The canonical empty MBR: `min > max` on both axes, the union
    /// identity element.
    pub const fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub const fn from_point(p: Point) -> Self {
        Self::new(p.x, p.y, p.x, p.y)
    }

    /// The MBR-union of `self` and `other`. An empty operand is absorbed.
    pub fn union(&self, other: &Mbr) -> Mbr {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Mbr::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// The MBR grown (if necessary) to also contain `p`.
    pub fn expand(&self, p: Point) -> Mbr {
        self.union(&Mbr::from_point(p))
    }

    pub fn intersects(&self, other: &Mbr) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn contains_point(&self, p: Point) -> bool {
        !self.is_empty()
            && p.x >= self.min_x
            && p.x <= self.max_x
            && p.y >= self.min_y
            && p.y <= self.max_y
    }

    /// True when `other` lies entirely inside `self` (closed rectangles).
    pub fn contains(&self, other: &Mbr) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn area(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            (self.max_x - self.min_x) * (self.max_y - self.min_y)
        }
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    pub fn center(&self) -> Point {
        Point::new((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    /// Inflate each dimension by `frac` of its size, with a floor of
    /// `min_abs` so that degenerate (zero-extent) rectangles still expand.
    /// Used by the quadtree's `find_adjacent_to_region`.
    pub fn inflated(&self, frac: f64, min_abs: f64) -> Mbr {
        if self.is_empty() {
            return *self;
        }
        let dx = (self.width() * frac).max(min_abs);
        let dy = (self.height() * frac).max(min_abs);
        Mbr::new(
            self.min_x - dx,
            self.min_y - dy,
            self.max_x + dx,
            self.max_y + dy,
        )
    }

    pub(crate) fn to_le_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[0..8].copy_from_slice(&self.min_x.to_le_bytes());
        out[8..16].copy_from_slice(&self.min_y.to_le_bytes());
        out[16..24].copy_from_slice(&self.max_x.to_le_bytes());
        out[24..32].copy_from_slice(&self.max_y.to_le_bytes());
        out
    }

    pub(crate) fn from_le_bytes(bytes: &[u8]) -> Self {
        let min_x = f64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let min_y = f64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let max_x = f64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let max_y = f64::from_le_bytes(bytes[24..32].try_into().unwrap());
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }
}

/// The three geometry shapes this crate understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    LineString(Vec<Point>),
    /// `exterior` is the outer ring; `holes` are interior rings, preserved
    /// in the geometry but ignored for centroid computation.
    Polygon {
        exterior: Vec<Point>,
        holes: Vec<Vec<Point>>,
    },
}

/// Tag mirroring `Geometry`'s variant, useful where only the kind (not the
/// payload) matters, e.g. serialized page records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ObjectType {
    Point = 0,
    LineString = 1,
    Polygon = 2,
}

impl ObjectType {
    pub fn from_u32(v: u32) -> Result<Self> {
        match v {
            0 => Ok(ObjectType::Point),
            1 => Ok(ObjectType::LineString),
            2 => Ok(ObjectType::Polygon),
            _ => Err(Error::Corrupt("unknown object type tag")),
        }
    }
}

impl Geometry {
    pub fn object_type(&self) -> ObjectType {
        match self {
            Geometry::Point(_) => ObjectType::Point,
            Geometry::LineString(_) => ObjectType::LineString,
            Geometry::Polygon { .. } => ObjectType::Polygon,
        }
    }

    /// True when the geometry carries no vertices at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(_) => false,
            Geometry::LineString(pts) => pts.is_empty(),
            Geometry::Polygon { exterior, .. } => exterior.is_empty(),
        }
    }

    /// Centroid: the point itself for a `Point`, the length-weighted
    /// midpoint average for a `LineString`, and the signed-area centroid
    /// for a `Polygon`.
    pub fn centroid(&self) -> Point {
        match self {
            Geometry::Point(p) => *p,
            Geometry::LineString(pts) => linestring_centroid(pts),
            Geometry::Polygon { exterior, .. } => polygon_centroid(exterior),
        }
    }

    /// MBR-union of all vertices across exterior and holes.
    pub fn mbr(&self) -> Mbr {
        match self {
            Geometry::Point(p) => Mbr::from_point(*p),
            Geometry::LineString(pts) => mbr_of_points(pts),
            Geometry::Polygon { exterior, holes } => {
                let mut mbr = mbr_of_points(exterior);
                for hole in holes {
                    mbr = mbr.union(&mbr_of_points(hole));
                }
                mbr
            }
        }
    }

    /// Exterior-ring area with hole areas subtracted; `0.0` for points and
    /// linestrings.
    pub fn area(&self) -> f64 {
        match self {
            Geometry::Point(_) | Geometry::LineString(_) => 0.0,
            Geometry::Polygon { exterior, holes } => {
                let mut a = polygon_signed_area(exterior).abs();
                for hole in holes {
                    a -= polygon_signed_area(hole).abs();
                }
                a.max(0.0)
            }
        }
    }
}

fn mbr_of_points(pts: &[Point]) -> Mbr {
    pts.iter().fold(Mbr::empty(), |acc, p| acc.expand(*p))
}

fn linestring_centroid(pts: &[Point]) -> Point {
    if pts.is_empty() {
        return Point::new(0.0, 0.0);
    }
    if pts.len() == 1 {
        return pts[0];
    }

    let mut total_len = 0.0;
    let mut wx = 0.0;
    let mut wy = 0.0;
    for w in pts.windows(2) {
        let (a, b) = (w[0], w[1]);
        let len = a.distance(&b);
        let mid = Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
        wx += mid.x * len;
        wy += mid.y * len;
        total_len += len;
    }

    if total_len == 0.0 {
        // Degenerate zero-length line: fall back to the first vertex.
        pts[0]
    } else {
        Point::new(wx / total_len, wy / total_len)
    }
}

/// Twice the signed area of the ring via the shoelace formula (positive for
/// counter-clockwise winding).
fn polygon_signed_area_x2(ring: &[Point]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum
}

fn polygon_signed_area(ring: &[Point]) -> f64 {
    polygon_signed_area_x2(ring) / 2.0
}

fn polygon_centroid(ring: &[Point]) -> Point {
    if ring.is_empty() {
        return Point::new(0.0, 0.0);
    }
    let a2 = polygon_signed_area_x2(ring);
    if a2.abs() < 1e-12 {
        // Zero-area (degenerate) polygon: fall back to vertex average.
        let n = ring.len() as f64;
        let sx: f64 = ring.iter().map(|p| p.x).sum();
        let sy: f64 = ring.iter().map(|p| p.y).sum();
        return Point::new(sx / n, sy / n);
    }

    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        let cross = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * cross;
        cy += (a.y + b.y) * cross;
    }
    let factor = 1.0 / (3.0 * a2);
    Point::new(cx * factor, cy * factor)
}

/// A spatial object: an id, a geometry payload, and derived fields that
/// must always agree with it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialObject {
    pub id: u64,
    pub geometry: Geometry,
    pub centroid: Point,
    pub mbr: Mbr,
}

impl SpatialObject {
    /// Construct an object, computing derived fields from `geometry`.
    /// Fails with `Error::Invalid` if the geometry is empty.
    pub fn new(id: u64, geometry: Geometry) -> Result<Self> {
        if geometry.is_empty() {
            return Err(Error::Invalid("geometry has no vertices"));
        }
        let centroid = geometry.centroid();
        let mbr = geometry.mbr();
        Ok(Self {
            id,
            geometry,
            centroid,
            mbr,
        })
    }

    pub fn object_type(&self) -> ObjectType {
        self.geometry.object_type()
    }

    pub fn area(&self) -> f64 {
        self.geometry.area()
    }

    /// Recompute `centroid`/`mbr` from the current `geometry`. Callers that
    /// mutate `geometry` in place must call this to restore the invariant.
    pub fn recompute_derived(&mut self) {
        self.centroid = self.geometry.centroid();
        self.mbr = self.geometry.mbr();
    }
}
